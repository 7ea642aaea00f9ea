//! # Individual Records
//!
//! Session-timeline listings (every row pinned to one trace) and
//! session-replay listings (independent sessions).

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use super::Rows;
use crate::bucket::iso;
use crate::classify::timeline_trace_id;
use crate::generation::Generation;
use crate::hash::stable_hash;
use crate::synth::SynthContext;

const TIMELINE_SPANS: usize = 20;
const DEFAULT_REPLAYS: usize = 10;

const DEVICES: [&str; 7] = [
    "iPhone 14 Pro",
    "iPhone 13",
    "Samsung Galaxy S23",
    "Google Pixel 7",
    "OnePlus 11",
    "Xiaomi 13",
    "Oppo Find X5",
];

const IOS_VERSIONS: [&str; 2] = ["iOS 17.0", "iOS 16.5"];
const ANDROID_VERSIONS: [&str; 2] = ["Android 13", "Android 14"];

const STATES: [&str; 8] = ["MH", "KA", "DL", "TN", "UP", "WB", "GJ", "RJ"];

const SPAN_NAMES: [&str; 20] = [
    "AppStart",
    "ScreenView",
    "NetworkRequest",
    "UserInteraction",
    "DatabaseQuery",
    "API Call",
    "ImageLoad",
    "Render",
    "Navigation",
    "Authentication",
    "DataFetch",
    "CacheRead",
    "FileUpload",
    "PaymentProcessing",
    "SearchQuery",
    "NotificationSend",
    "LocationUpdate",
    "AnalyticsTrack",
    "BackgroundSync",
    "PushNotification",
];

// Each chain lists an event followed by the lower-priority events that may
// stack under it: crash > ANR > non-fatal > frozen frame.
const EVENT_CHAINS: [(f64, &[&str]); 6] = [
    (0.2, &["device.crash", "device.anr", "non_fatal", "app.jank.frozen"]),
    (0.4, &["device.anr", "non_fatal", "app.jank.frozen"]),
    (0.6, &["non_fatal", "app.jank.frozen"]),
    (0.8, &["app.jank.frozen"]),
    (0.9, &["device.anr", "app.jank.frozen"]),
    (1.0, &["non_fatal", "app.jank.frozen"]),
];

fn event_names<R: Rng>(rng: &mut R, stacked: bool) -> Vec<&'static str> {
    let roll: f64 = rng.gen();
    let chain = EVENT_CHAINS
        .iter()
        .find(|(upper, _)| roll < *upper)
        .map(|(_, chain)| *chain)
        .unwrap_or(EVENT_CHAINS[EVENT_CHAINS.len() - 1].1);
    if stacked {
        chain.to_vec()
    } else {
        chain[..1].to_vec()
    }
}

#[derive(Debug, Clone, Copy)]
struct Device {
    model: &'static str,
    os_version: &'static str,
    state: &'static str,
}

impl Device {
    fn pick(index: u64, os_index: u64, state_index: u64) -> Self {
        let model = DEVICES[(index % DEVICES.len() as u64) as usize];
        let versions: &[&str] = if model.contains("iPhone") {
            &IOS_VERSIONS
        } else {
            &ANDROID_VERSIONS
        };
        Self {
            model,
            os_version: versions[(os_index % versions.len() as u64) as usize],
            state: STATES[(state_index % STATES.len() as u64) as usize],
        }
    }

    fn os_type(&self) -> &'static str {
        if self.model.contains("iPhone") {
            "iOS"
        } else {
            "Android"
        }
    }

    fn manufacturer(&self) -> &'static str {
        ["Apple", "Samsung", "Google", "OnePlus", "Xiaomi", "Oppo"]
            .into_iter()
            .zip(["iPhone", "Samsung", "Pixel", "OnePlus", "Xiaomi", "Oppo"])
            .find(|(_, marker)| self.model.contains(marker))
            .map(|(maker, _)| maker)
            .unwrap_or("")
    }

    fn user_id(&self, n: u64) -> String {
        let version = self.os_version.replace(['.', ' '], "_");
        format!("user_{}_{}_{}", n, self.os_type(), version)
    }
}

struct Record {
    trace_id: String,
    span_id: String,
    session_id: String,
    timestamp: String,
    events: Vec<&'static str>,
    device: Device,
    user_id: String,
    duration_ns: u64,
    span_name: &'static str,
}

impl Record {
    fn cell(&self, alias: &str) -> Option<String> {
        let events = self.events.join(",");
        let has = |marker: &str| events.contains(marker);
        let cell = match alias.to_ascii_lowercase().as_str() {
            "event_names" => events.clone(),
            "event_timestamps" => vec![self.timestamp.as_str(); self.events.len()].join(","),
            "interaction_timestamp" | "timestamp" => self.timestamp.clone(),
            "traceid" => self.trace_id.clone(),
            "spanid" => self.span_id.clone(),
            "sessionid" => self.session_id.clone(),
            "device" => self.device.model.to_string(),
            "duration" => self.duration_ns.to_string(),
            "userid" => self.user_id.clone(),
            "manufacturer" => self.device.manufacturer().to_string(),
            "os_name" => match self.device.os_type() {
                "iOS" => "ios".to_string(),
                _ => "androidfull".to_string(),
            },
            "os_type" => self.device.os_type().to_string(),
            "os_version" => self
                .device
                .os_version
                .split(' ')
                .nth(1)
                .unwrap_or("14")
                .to_string(),
            "os_description" => String::new(),
            "state" => self.device.state.to_string(),
            "country" => "IN".to_string(),
            "frozen_frame" => flag(has("frozen"), "1.0", "0.0"),
            "anr" => flag(has("anr"), "1", "0"),
            "crash" => flag(has("crash"), "1", "0"),
            "spanname" => self.span_name.to_string(),
            "error" => (has("crash") || has("anr")).to_string(),
            "error_type" => {
                if has("crash") {
                    "crash".to_string()
                } else {
                    flag(has("anr"), "anr", "")
                }
            }
            "error_message" => {
                if has("crash") {
                    "Application crashed".to_string()
                } else {
                    flag(has("anr"), "Application not responding", "")
                }
            }
            _ => return None,
        };
        Some(cell)
    }
}

fn flag(on: bool, yes: &str, no: &str) -> String {
    let text = if on { yes } else { no };
    text.to_string()
}

fn emit(g: &mut Generation<'_>, records: &[Record]) -> Rows {
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        rows.push(g.fill_row(SynthContext::at(&record.timestamp), |alias| record.cell(alias)));
    }
    rows
}

fn offset(start: DateTime<Utc>, span: Duration, fraction: f64) -> DateTime<Utc> {
    let millis = (span.num_milliseconds() as f64 * fraction) as i64;
    start + Duration::milliseconds(millis)
}

fn unique_span_id(g: &mut Generation<'_>, taken: &mut Vec<String>) -> String {
    loop {
        let id = g.hex(16);
        if !taken.contains(&id) {
            taken.push(id.clone());
            return id;
        }
    }
}

// =============================================================================
// Session timeline
// =============================================================================

/// Every row carries the filtered trace id; device, OS, state and user are
/// derived from a hash of it so repeated calls describe the same session.
pub fn session_timeline(g: &mut Generation<'_>) -> Rows {
    let Some(trace_id) = timeline_trace_id(g.request).map(str::to_string) else {
        tracing::warn!("session timeline without a trace id");
        return Vec::new();
    };
    let seed = stable_hash(&trace_id);
    let device = Device::pick(seed, seed >> 8, seed >> 16);
    let user_id = device.user_id(seed % 10_000);
    let n = TIMELINE_SPANS.min(g.max_records);
    let (start, end) = g.window_or(Duration::days(7));
    let span = end - start;

    let mut taken = Vec::with_capacity(n);
    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let fraction = if n > 1 { i as f64 / (n - 1) as f64 } else { 0.0 };
        // Span type by index: loads, network, quick operations, mixed.
        let duration_ms: u64 = match i % 4 {
            0 => g.rng.gen_range(500..3_000),
            1 => g.rng.gen_range(100..1_500),
            2 => g.rng.gen_range(10..200),
            _ => g.rng.gen_range(50..2_000),
        };
        records.push(Record {
            trace_id: trace_id.clone(),
            span_id: unique_span_id(g, &mut taken),
            session_id: format!("session{}", i + 1),
            timestamp: iso(&offset(start, span, fraction)),
            events: event_names(&mut g.rng, true),
            device,
            user_id: user_id.clone(),
            duration_ns: duration_ms * 1_000_000,
            span_name: SPAN_NAMES[((seed as usize) + i) % SPAN_NAMES.len()],
        });
    }
    tracing::debug!("session timeline for `{}` on {}", trace_id, device.model);
    emit(g, &records)
}

// =============================================================================
// Session replays
// =============================================================================

pub fn session_replays(g: &mut Generation<'_>) -> Rows {
    let n = g
        .request
        .effective_limit()
        .map(|l| l.min(g.max_records))
        .unwrap_or(DEFAULT_REPLAYS);
    let (start, end) = g.window_or(Duration::days(7));
    let span = end - start;

    let mut taken = Vec::with_capacity(n);
    let mut records = Vec::with_capacity(n);
    for i in 0..n {
        let device = Device::pick(g.rng.gen(), g.rng.gen(), g.rng.gen());
        let stacked = g.rng.gen_bool(0.4);
        let fraction: f64 = g.rng.gen();
        let user = g.rng.gen_range(0..10_000);
        let duration_ms: u64 = g.rng.gen_range(1_000..201_000);
        records.push(Record {
            trace_id: format!("traceid{}", i + 1),
            span_id: unique_span_id(g, &mut taken),
            session_id: format!("session{}", i + 1),
            timestamp: iso(&offset(start, span, fraction)),
            events: event_names(&mut g.rng, stacked),
            user_id: device.user_id(user),
            device,
            duration_ns: duration_ms * 1_000_000,
            span_name: SPAN_NAMES[i % SPAN_NAMES.len()],
        });
    }
    emit(g, &records)
}
