//! # Function Value Synthesizer
//!
//! Produces one synthetic cell for a select function. Values are seeded by a
//! stable hash of the interaction under inspection, the row's group value and
//! a coarse ten-minute time slice, then jittered by the injected RNG, so a
//! dashboard refresh within the same slice stays in the same neighbourhood.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::bucket;
use crate::hash::stable_hash;
use crate::request::{Filter, SelectField, SelectFunction};

/// Seconds per coarse time slice used in seeds.
const SLICE_SECS: i64 = 600;

/// Half-width of the P50 band around the base latency, 15% of its range.
const P50_SPREAD: f64 = 45.0;

const EVENT_NAMES: [&str; 4] = ["device.crash", "device.anr", "non_fatal", "app.jank.frozen"];

/// Per-cell context: the bucket label for time-series rows, the group value
/// for grouped rows, neither for aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthContext<'a> {
    pub timestamp: Option<&'a str>,
    pub group_value: Option<&'a str>,
}

impl<'a> SynthContext<'a> {
    pub fn at(timestamp: &'a str) -> Self {
        Self {
            timestamp: Some(timestamp),
            group_value: None,
        }
    }

    pub fn group(group_value: &'a str) -> Self {
        Self {
            timestamp: None,
            group_value: Some(group_value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Synthesizer {
    interaction: String,
    slice: i64,
    now: DateTime<Utc>,
}

impl Synthesizer {
    pub fn new(filters: &[Filter], now: DateTime<Utc>) -> Self {
        let interaction = filters
            .iter()
            .find(|f| f.field == "InteractionName" || f.field == "SpanName")
            .and_then(Filter::first_value)
            .unwrap_or("default")
            .to_string();
        Self {
            interaction,
            slice: now.timestamp().div_euclid(SLICE_SECS),
            now,
        }
    }

    pub fn interaction(&self) -> &str {
        &self.interaction
    }

    fn hash(&self, seed: &str, group: Option<&str>) -> u64 {
        stable_hash(&format!("{}{}{}", seed, group.unwrap_or(""), self.slice))
    }

    /// `min + hash % range` with ±15% jitter, clamped to `[min, max]`.
    pub fn count<R: Rng>(&self, rng: &mut R, min: u64, max: u64, seed: &str, group: Option<&str>) -> u64 {
        let range = max.saturating_sub(min);
        if range == 0 {
            return min;
        }
        let base = min + self.hash(seed, group) % range;
        let jitter = ((rng.gen::<f64>() - 0.5) * range as f64 * 0.3) as i64;
        let value = (base as i64).saturating_add(jitter);
        value.clamp(min as i64, max as i64) as u64
    }

    fn interaction_count<R: Rng>(&self, rng: &mut R, min: u64, max: u64, group: Option<&str>) -> String {
        self.count(rng, min, max, &self.interaction, group).to_string()
    }

    /// Apdex in `[0.5, 1.0]`, centred on 0.80-0.95.
    pub fn apdex<R: Rng>(&self, rng: &mut R, group: Option<&str>) -> f64 {
        let base = 0.8 + (self.hash(&self.interaction, group) % 15) as f64 / 100.0;
        let variance = (rng.gen::<f64>() - 0.5) * 0.08;
        (base + variance).clamp(0.5, 1.0)
    }

    /// Latency percentile in milliseconds. All three share one hash-derived
    /// base per row, which keeps P50 <= P95 <= P99.
    pub fn latency<R: Rng>(&self, rng: &mut R, function: SelectFunction, group: Option<&str>) -> u64 {
        let base = 100.0 + (self.hash(&self.interaction, group) % 300) as f64;
        let r: f64 = rng.gen();
        let value = match function {
            SelectFunction::DurationP95 => base * (1.8 + r * 0.6),
            SelectFunction::DurationP99 => base * (2.5 + r * 1.0),
            _ => (base + (r - 0.5) * 2.0 * P50_SPREAD).max(1.0),
        };
        value.floor() as u64
    }

    pub fn synthesize<R: Rng>(&self, rng: &mut R, field: &SelectField, ctx: SynthContext<'_>) -> String {
        let group = ctx.group_value;
        match field.function {
            SelectFunction::Col => group.unwrap_or("unknown").to_string(),
            SelectFunction::TimeBucket => ctx
                .timestamp
                .map(str::to_string)
                .unwrap_or_else(|| bucket::label(&self.now)),
            SelectFunction::Apdex => format!("{:.4}", self.apdex(rng, group)),
            SelectFunction::InteractionSuccessCount => self.interaction_count(rng, 80, 150, group),
            SelectFunction::InteractionErrorCount => self.interaction_count(rng, 10, 50, group),
            SelectFunction::InteractionErrorDistinctUsers => self.interaction_count(rng, 5, 30, group),
            SelectFunction::FrozenFrame => self.interaction_count(rng, 5, 25, group),
            SelectFunction::Anr => self.interaction_count(rng, 3, 15, group),
            SelectFunction::Crash => self.interaction_count(rng, 2, 12, group),
            SelectFunction::UserCategoryExcellent => self.interaction_count(rng, 20, 50, group),
            SelectFunction::UserCategoryGood => self.interaction_count(rng, 50, 100, group),
            SelectFunction::UserCategoryAverage => self.interaction_count(rng, 0, 20, group),
            SelectFunction::UserCategoryPoor => self.interaction_count(rng, 10, 40, group),
            SelectFunction::DurationP50 | SelectFunction::DurationP95 | SelectFunction::DurationP99 => {
                self.latency(rng, field.function, group).to_string()
            }
            SelectFunction::Net0 => self.interaction_count(rng, 0, 2, group),
            SelectFunction::Net2xx => self.interaction_count(rng, 80, 140, group),
            SelectFunction::Net3xx => self.interaction_count(rng, 0, 5, group),
            SelectFunction::Net4xx => self.interaction_count(rng, 2, 15, group),
            SelectFunction::Net5xx => self.interaction_count(rng, 0, 8, group),
            SelectFunction::Custom => self.custom(rng, field.expression(), group),
        }
    }

    /// Known expression fragments are matched in order; anything else gets
    /// the default count range.
    fn custom<R: Rng>(&self, rng: &mut R, expr: &str, group: Option<&str>) -> String {
        let has = |fragment: &str| expr.contains(fragment);

        // Durations are nanosecond totals over roughly a hundred sessions.
        if has("sumIf(Duration") && has("screen_session") {
            return self.interaction_count(rng, 3_000_000_000_000, 18_000_000_000_000, group);
        }
        if has("sumIf(Duration") && has("screen_load") {
            return self.interaction_count(rng, 30_000_000_000, 300_000_000_000, group);
        }
        if has("countIf") && (has("screen_session") || has("screen_load")) {
            return self.interaction_count(rng, 80, 120, group);
        }
        if has("COUNT()") {
            if let Some(value) = group {
                return if value.contains("Screen") {
                    self.interaction_count(rng, 80, 120, group)
                } else {
                    self.interaction_count(rng, 200, 400, group)
                };
            }
        }
        if has("uniqCombinedIf") && has("device.crash") {
            if has("UserId") {
                return self.count(rng, 80, 240, "crash_users", group).to_string();
            }
            if has("SessionId") {
                return self.count(rng, 125, 500, "crash_sessions", group).to_string();
            }
        }
        if !has("If") {
            if has("uniqCombined(UserId)") {
                return self.count(rng, 8_000, 12_000, "all_users", group).to_string();
            }
            if has("uniqCombined(SessionId)") {
                return self.count(rng, 25_000, 50_000, "all_sessions", group).to_string();
            }
        }
        if has("countIf") && has("StatusCode") {
            return self.interaction_count(rng, 0, 5, group);
        }
        if has("toJSONString") {
            return serde_json::json!({
                "pulse.type": "interaction",
                "interaction.name": self.interaction,
                "screen.name": group.unwrap_or("HomeScreen"),
            })
            .to_string();
        }
        if has("arrayStringConcat") || has("groupArray") {
            let n = rng.gen_range(1..=EVENT_NAMES.len());
            let picked: Vec<&str> = EVENT_NAMES.choose_multiple(rng, n).copied().collect();
            return picked.join(",");
        }
        self.interaction_count(rng, 1_000, 5_000, group)
    }
}
