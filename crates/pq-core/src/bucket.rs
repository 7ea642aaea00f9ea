//! # Time Buckets
//!
//! Expands a time range and a `"<N><unit>"` granularity into ordered bucket
//! labels. The end of the range is inclusive.

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fmt;
use std::str::FromStr;

/// Label format shared by every time-bucketed response, e.g. `2025-07-07T05:04Z`.
pub const LABEL_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    pub amount: u32,
    pub unit: BucketUnit,
}

impl Default for BucketSpec {
    fn default() -> Self {
        Self {
            amount: 1,
            unit: BucketUnit::Minute,
        }
    }
}

impl FromStr for BucketSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let split = raw
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in bucket `{}`", raw))?;
        let (number, unit) = raw.split_at(split);
        let amount: u32 = if number.is_empty() {
            1
        } else {
            number
                .parse()
                .map_err(|_| format!("invalid amount in bucket `{}`", raw))?
        };
        if amount == 0 {
            return Err(format!("zero-width bucket `{}`", raw));
        }
        // `M` is months, `m` is minutes.
        let unit = match unit {
            "s" => BucketUnit::Second,
            "m" => BucketUnit::Minute,
            "h" => BucketUnit::Hour,
            "d" => BucketUnit::Day,
            "w" => BucketUnit::Week,
            "M" => BucketUnit::Month,
            other => return Err(format!("unknown bucket unit `{}`", other)),
        };
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for BucketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            BucketUnit::Second => "s",
            BucketUnit::Minute => "m",
            BucketUnit::Hour => "h",
            BucketUnit::Day => "d",
            BucketUnit::Week => "w",
            BucketUnit::Month => "M",
        };
        write!(f, "{}{}", self.amount, unit)
    }
}

impl BucketSpec {
    /// Parses `raw`, falling back to one minute with a warning.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        match raw {
            None => Self::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; using 1m buckets", e);
                Self::default()
            }),
        }
    }

    fn advance(&self, t: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let n = i64::from(self.amount);
        match self.unit {
            BucketUnit::Second => t.checked_add_signed(Duration::seconds(n)),
            BucketUnit::Minute => t.checked_add_signed(Duration::minutes(n)),
            BucketUnit::Hour => t.checked_add_signed(Duration::hours(n)),
            BucketUnit::Day => t.checked_add_signed(Duration::days(n)),
            BucketUnit::Week => t.checked_add_signed(Duration::weeks(n)),
            BucketUnit::Month => t.checked_add_months(Months::new(self.amount)),
        }
    }
}

pub fn label(t: &DateTime<Utc>) -> String {
    t.format(LABEL_FORMAT).to_string()
}

/// ISO-8601 with millisecond precision, used for record timestamps.
pub fn iso(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Bucket labels from `start` through `end` inclusive, at most `cap` of them.
pub fn buckets(start: DateTime<Utc>, end: DateTime<Utc>, spec: BucketSpec, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = Some(start);
    while let Some(t) = current {
        if t > end {
            break;
        }
        if out.len() >= cap {
            tracing::warn!("bucket expansion capped at {} ({} buckets)", cap, spec);
            break;
        }
        out.push(label(&t));
        current = spec.advance(t);
    }
    out
}

/// RFC 3339 first, then the naive layouts the dashboard sends (read as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%MZ",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for layout in NAIVE {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
