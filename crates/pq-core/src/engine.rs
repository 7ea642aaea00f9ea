//! # Query Engine
//!
//! Validates a request, classifies it, runs the matching builder and
//! assembles the response. The engine keeps no state between calls apart
//! from its options: with a fixed `seed` and `now`, the same request always
//! produces the same table.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::assemble::assemble;
use crate::bucket::parse_timestamp;
use crate::builders;
use crate::classify::classify;
use crate::error::{QueryError, Result};
use crate::generation::Generation;
use crate::request::{QueryRequest, QueryResponse};

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Fixed PRNG seed; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Answer `spanfreq` orderings with a top-N-by-quality ranking.
    #[serde(default = "default_rank_by_quality")]
    pub rank_by_quality: bool,
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Pinned reference clock, for tests.
    #[serde(skip)]
    pub now: Option<DateTime<Utc>>,
}

fn default_rank_by_quality() -> bool {
    true
}

fn default_max_buckets() -> usize {
    10_000
}

fn default_max_records() -> usize {
    1_000
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seed: None,
            rank_by_quality: default_rank_by_quality(),
            max_buckets: default_max_buckets(),
            max_records: default_max_records(),
            now: None,
        }
    }
}

impl EngineOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Default::default()
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Engine {
    options: EngineOptions,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn execute_json(&self, body: &[u8]) -> Result<QueryResponse> {
        let request = QueryRequest::from_json(body)?;
        self.execute(&request)
    }

    pub fn execute(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let window = validate(request)?;
        let kind = classify(request);
        let now = self.options.now.unwrap_or_else(Utc::now);
        let rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut generation = Generation::new(request, now, rng, window);
        generation.max_buckets = self.options.max_buckets;
        generation.max_records = self.options.max_records;

        let rows = builders::build(kind, &mut generation);
        let fields = request.aliases();
        let generated = rows.len();
        let rows = assemble(
            &fields,
            rows,
            &request.order_by,
            request.effective_limit(),
            self.options.rank_by_quality,
        );
        tracing::debug!(
            "{} query: {} rows generated, {} returned",
            kind,
            generated,
            rows.len()
        );
        Ok(QueryResponse { fields, rows })
    }
}

/// Rejects duplicate aliases and unparseable time bounds; returns the
/// parsed window when the request carries one.
fn validate(request: &QueryRequest) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
    let mut seen = HashSet::new();
    for field in &request.select {
        if !seen.insert(field.alias.as_str()) {
            return Err(QueryError::DuplicateAlias(field.alias.clone()));
        }
    }

    let Some(range) = &request.time_range else {
        return Ok(None);
    };
    let bound = |name: &'static str, raw: &str| {
        parse_timestamp(raw).ok_or_else(|| QueryError::InvalidTimestamp {
            bound: name,
            value: raw.to_string(),
        })
    };
    let start = bound("start", &range.start)?;
    let end = bound("end", &range.end)?;
    if end < start {
        tracing::warn!("inverted time range {} .. {}", range.start, range.end);
    }
    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::QueryKind;

    fn pinned() -> Engine {
        Engine::new(EngineOptions {
            now: parse_timestamp("2025-07-07T06:00:00Z"),
            ..EngineOptions::seeded(42)
        })
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let body = br#"{"dataType": "TRACES", "select": [
            {"function": "CRASH", "alias": "x"},
            {"function": "ANR", "alias": "x"}
        ]}"#;
        assert!(matches!(
            pinned().execute_json(body),
            Err(QueryError::DuplicateAlias(alias)) if alias == "x"
        ));
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let body = br#"{"dataType": "TRACES",
            "timeRange": {"start": "yesterday", "end": "2025-07-07T06:00:00Z"},
            "select": [{"function": "CRASH", "alias": "x"}]}"#;
        assert!(matches!(
            pinned().execute_json(body),
            Err(QueryError::InvalidTimestamp { bound: "start", .. })
        ));
    }

    #[test]
    fn test_seeded_engine_is_reproducible() {
        let body = br#"{"dataType": "TRACES",
            "select": [
                {"function": "COL", "param": {"field": "Platform"}, "alias": "platform"},
                {"function": "APDEX", "alias": "apdex"},
                {"function": "DURATION_P95", "alias": "p95"}
            ],
            "groupBy": ["platform"]}"#;
        let engine = pinned();
        assert_eq!(engine.execute_json(body).unwrap(), engine.execute_json(body).unwrap());
    }

    #[test]
    fn test_series_defaults_to_last_hour() {
        let body = br#"{"dataType": "TRACES", "select": [
            {"function": "INTERACTION_SUCCESS_COUNT", "alias": "ok"},
            {"function": "TIME_BUCKET", "alias": "t"}
        ], "limit": 0}"#;
        let response = pinned().execute_json(body).unwrap();
        assert_eq!(response.fields, vec!["ok", "t"]);
        assert_eq!(response.rows.len(), 61);
    }
    #[test]
    fn test_session_timeline_with_raw_predicate() {
        let body = br#"{"dataType": "TRACES",
            "timeRange": {"start": "2025-07-07T05:00:00Z", "end": "2025-07-07T06:00:00Z"},
            "select": [
                {"function": "COL", "param": {"field": "TraceId"}, "alias": "traceid"},
                {"function": "COL", "param": {"field": "SpanId"}, "alias": "spanid"},
                {"function": "COL", "param": {"field": "ParentSpanId"}, "alias": "parentspanid"},
                {"function": "COL", "param": {"field": "SpanName"}, "alias": "spanname"},
                {"function": "COL", "param": {"field": "Timestamp"}, "alias": "timestamp"}
            ],
            "filters": [
                {"field": "SessionId", "operator": "EQ", "value": ["session-9"]},
                {"field": "",
                 "operator": "ADDITIONAL",
                 "value": ["SpanAttributes['pulse.interaction.ids'] LIKE '%ix-1%' OR TraceId = 'ix-1'"]}
            ]}"#;
        let request = QueryRequest::from_json(body).unwrap();
        assert_eq!(classify(&request), QueryKind::SessionSignals);

        let response = pinned().execute(&request).unwrap();
        assert_eq!(response.fields.len(), 5);
        assert!(!response.rows.is_empty());
        assert!(response.values("spanid").iter().all(|id| id.len() == 16));
    }
}
