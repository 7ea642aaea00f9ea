//! # Network Builders
//!
//! Per-API metrics (list and pinned detail), error breakdown by status code
//! and failures by network provider.

use rand::Rng;

use super::{scale, Rows};
use crate::classify::{HTTP_METHOD_FIELD, HTTP_URL_FIELD};
use crate::generation::Generation;
use crate::hash::stable_hash;
use crate::request::{Filter, FilterOperator, QueryRequest};
use crate::synth::SynthContext;

const API_CATALOGUE: [(&str, &str); 18] = [
    ("GET", "/api/v1/contests/live"),
    ("GET", "/api/v1/contests/upcoming"),
    ("POST", "/api/v1/contests/join"),
    ("GET", "/api/v1/teams/my-teams"),
    ("POST", "/api/v1/teams/create"),
    ("PUT", "/api/v1/teams/update"),
    ("GET", "/api/v1/players/list"),
    ("GET", "/api/v1/players/stats"),
    ("GET", "/api/v1/matches/live-score"),
    ("GET", "/api/v1/matches/schedule"),
    ("GET", "/api/v1/user/profile"),
    ("GET", "/api/v1/user/wallet"),
    ("POST", "/api/v1/wallet/deposit"),
    ("POST", "/api/v1/wallet/withdraw"),
    ("GET", "/api/v1/leaderboard/global"),
    ("GET", "/api/v1/leaderboard/contest"),
    ("GET", "/api/v1/notifications/list"),
    ("POST", "/api/v1/auth/refresh"),
];

const PROVIDERS: [&str; 5] = ["Jio", "Airtel", "Vi (Vodafone Idea)", "BSNL", "Aircel"];

/// Status codes in descending frequency, with their error-type labels.
const CLIENT_ERRORS: [(u16, u64, &[&str]); 6] = [
    (404, 850, &["not_found", "resource_not_found", "endpoint_not_found"]),
    (401, 620, &["unauthorized", "authentication_failed", "invalid_credentials"]),
    (403, 480, &["forbidden", "access_denied", "permission_denied"]),
    (400, 320, &["bad_request", "validation_error", "invalid_request"]),
    (422, 180, &["validation_error", "unprocessable_entity", "invalid_payload"]),
    (429, 95, &["rate_limit_exceeded", "too_many_requests", "throttled"]),
];

const SERVER_ERRORS: [(u16, u64, &[&str]); 5] = [
    (500, 420, &["internal_server_error", "server_error", "application_error"]),
    (502, 280, &["bad_gateway", "gateway_error", "upstream_error"]),
    (503, 195, &["service_unavailable", "unavailable", "maintenance"]),
    (504, 120, &["gateway_timeout", "timeout", "upstream_timeout"]),
    (507, 65, &["insufficient_storage", "storage_error"]),
];

const ERROR_TYPE_SHARES: [f64; 3] = [0.5, 0.3, 0.2];

const FAILURE_ALIASES: [&str; 3] = ["conn_error", "4xx", "5xx"];

fn pulse_type_values<'r>(request: &'r QueryRequest, operators: &[FilterOperator]) -> Vec<&'r str> {
    request
        .filters
        .iter()
        .find(|f| f.field == "PulseType" && operators.contains(&f.operator))
        .map(|f| f.value.iter().map(String::as_str).collect())
        .unwrap_or_default()
}

// =============================================================================
// API metrics
// =============================================================================

struct ApiMetrics {
    method: String,
    url: String,
    total: u64,
    success: u64,
    response_ms: u64,
    sessions: u64,
    p50: u64,
    p95: u64,
    p99: u64,
}

impl ApiMetrics {
    /// Every metric for one API is derived once so the row stays coherent.
    /// GET carries more volume and less latency than writes.
    fn derive(g: &mut Generation<'_>, method: &str, url: &str) -> Self {
        let seed = format!("{}{}", method, url);
        let is_get = method == "GET";
        let total = if is_get {
            g.count(5_000, 80_000, &seed)
        } else {
            g.count(1_000, 25_000, &seed)
        };
        let response_ms = if is_get {
            g.count(80, 400, &seed)
        } else {
            g.count(150, 800, &seed)
        };
        let fraction = |salt: &str, modulo: u64| (stable_hash(&format!("{}{}", seed, salt)) % modulo) as f64;

        let success_rate = 0.96 + fraction("", 35) / 1000.0;
        let session_rate = 0.15 + fraction("session", 25) / 100.0;
        Self {
            method: method.to_string(),
            url: url.to_string(),
            total,
            success: scale(total, success_rate),
            response_ms,
            sessions: scale(total, session_rate).max(1),
            p50: scale(response_ms, 0.5 + fraction("p50", 20) / 100.0),
            p95: scale(response_ms, 1.8 + fraction("p95", 70) / 100.0),
            p99: scale(response_ms, 2.5 + fraction("p99", 200) / 100.0),
        }
    }

    fn cell(&self, alias: &str, screen: &str) -> Option<String> {
        let cell = match alias {
            "method" => self.method.clone(),
            "url" => self.url.clone(),
            "total_requests" => self.total.to_string(),
            "success_requests" => self.success.to_string(),
            "response_time" => (self.response_ms * 1_000_000).to_string(),
            "all_sessions" => self.sessions.to_string(),
            "p50" => self.p50.to_string(),
            "p95" => self.p95.to_string(),
            "p99" => self.p99.to_string(),
            "status_code" => "200".to_string(),
            "screen_name" => screen.to_string(),
            _ => return None,
        };
        Some(cell)
    }
}

/// One row per catalogued API, or exactly the pinned method and URL when
/// `pinned` is set.
pub fn api_metrics(g: &mut Generation<'_>, pinned: bool) -> Rows {
    let request = g.request;
    let mut apis: Vec<(String, String)> = API_CATALOGUE
        .iter()
        .map(|(m, u)| (m.to_string(), u.to_string()))
        .collect();

    if pinned {
        let method = request
            .filter_value(HTTP_METHOD_FIELD, FilterOperator::Eq)
            .unwrap_or_default();
        let url = request
            .filter_value(HTTP_URL_FIELD, FilterOperator::Eq)
            .unwrap_or_default();
        apis.retain(|(m, u)| m == method && u == url);
        if apis.is_empty() && !method.is_empty() && !url.is_empty() {
            apis.push((method.to_string(), url.to_string()));
        }
    }

    let screen = request
        .filters
        .iter()
        .find(|f| f.field.contains("screen") && f.operator == FilterOperator::Eq)
        .and_then(Filter::first_value)
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(apis.len());
    for (method, url) in &apis {
        let metrics = ApiMetrics::derive(g, method, url);
        rows.push(g.fill_row(SynthContext::default(), |alias| metrics.cell(alias, screen)));
    }
    rows
}

// =============================================================================
// Error breakdown
// =============================================================================

/// Counts fall with status-code rank. Grouped by error type, the first
/// three labels take 50%, 30% and 20%.
pub fn error_breakdown(g: &mut Generation<'_>) -> Rows {
    let request = g.request;
    let values = pulse_type_values(request, &[FilterOperator::Like]);
    let client = values.iter().any(|v| v.contains("network.4"));
    let server = values.iter().any(|v| v.contains("network.5"));
    let by_type = request.groups_by("error_type");

    // Without a `network.4`/`network.5` filter both families are emitted
    // instead of an empty breakdown.
    let mut families: Vec<&[(u16, u64, &[&str])]> = Vec::new();
    if client || !server {
        families.push(&CLIENT_ERRORS);
    }
    if server || !client {
        families.push(&SERVER_ERRORS);
    }

    let mut rows = Vec::new();
    for family in families {
        for (status, base, types) in family {
            let labels: &[&str] = if by_type { *types } else { &types[..1] };
            for (j, error_type) in labels.iter().enumerate() {
                let share = if by_type {
                    ERROR_TYPE_SHARES.get(j).copied().unwrap_or(0.1)
                } else {
                    1.0
                };
                let expected = *base as f64 * share;
                let count = (expected + (g.rng.gen::<f64>() * expected * 0.3).floor()).round() as u64;
                rows.push(g.fill_row(SynthContext::default(), |alias| match alias {
                    "error_count" => Some(count.to_string()),
                    "status_code" => Some(status.to_string()),
                    "error_type" => Some(error_type.to_string()),
                    _ => None,
                }));
            }
        }
    }
    rows
}

// =============================================================================
// Provider breakdown
// =============================================================================

/// Rank-based base counts with ±25% variance; providers with no failures
/// are dropped.
pub fn issues_by_provider(g: &mut Generation<'_>) -> Rows {
    let request = g.request;
    let values = pulse_type_values(request, &[FilterOperator::Eq, FilterOperator::Like]);
    let bases: [u64; 5] = if values.iter().any(|v| *v == "network.0") {
        [15, 18, 35, 42, 28]
    } else if values.iter().any(|v| v.contains("network.4")) {
        [120, 145, 280, 320, 195]
    } else if values.iter().any(|v| v.contains("network.5")) {
        [45, 55, 95, 120, 75]
    } else {
        [50; 5]
    };
    let failure_column = request
        .select
        .iter()
        .position(|s| FAILURE_ALIASES.contains(&s.alias.as_str()));

    let mut rows = Vec::with_capacity(PROVIDERS.len());
    for (provider, base) in PROVIDERS.iter().zip(bases) {
        let spread = base as i64 / 4;
        let variance = if spread > 0 {
            g.rng.gen_range(-spread..spread)
        } else {
            0
        };
        let count = (base as i64 + variance).max(0);
        let row = g.fill_row(SynthContext::default(), |alias| {
            if FAILURE_ALIASES.contains(&alias) {
                Some(count.to_string())
            } else if alias == "network_provider" {
                Some(provider.to_string())
            } else {
                None
            }
        });
        let keep = failure_column
            .and_then(|idx| row[idx].parse::<f64>().ok())
            .map_or(true, |n| n > 0.0);
        if keep {
            rows.push(row);
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(body: &str, f: fn(&mut Generation<'_>) -> Rows) -> Rows {
        let req = QueryRequest::from_json(body.as_bytes()).unwrap();
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(21), None);
        f(&mut g)
    }

    const LIST: &str = r#"{"dataType": "TRACES",
        "select": [
            {"function": "COL", "param": {"field": "SpanAttributes['http.method']"}, "alias": "method"},
            {"function": "COL", "param": {"field": "SpanAttributes['http.url']"}, "alias": "url"},
            {"function": "CUSTOM", "param": {"expression": "count()"}, "alias": "total_requests"},
            {"function": "CUSTOM", "param": {"expression": "countIf(StatusCode = 'OK')"}, "alias": "success_requests"},
            {"function": "DURATION_P50", "alias": "p50"},
            {"function": "DURATION_P95", "alias": "p95"},
            {"function": "DURATION_P99", "alias": "p99"}
        ],
        "filters": [
            {"field": "PulseType", "operator": "LIKE", "value": ["%network%"]},
            {"field": "SpanAttributes['http.method']", "operator": "EQ", "value": ["PATCH"]},
            {"field": "SpanAttributes['http.url']", "operator": "EQ", "value": ["/api/v2/custom"]}
        ],
        "groupBy": ["method", "url"]}"#;

    #[test]
    fn test_api_list_is_coherent() {
        let rows = run(LIST, |g| api_metrics(g, false));
        assert_eq!(rows.len(), 18);
        for row in &rows {
            let n: Vec<u64> = row[2..].iter().map(|c| c.parse().unwrap()).collect();
            assert!(n[1] <= n[0], "success <= total");
            assert!(n[2] <= n[3] && n[3] <= n[4], "p50 <= p95 <= p99");
        }
    }

    #[test]
    fn test_pinned_api_outside_catalogue() {
        let rows = run(LIST, |g| api_metrics(g, true));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "PATCH");
        assert_eq!(rows[0][1], "/api/v2/custom");
    }

    #[test]
    fn test_error_breakdown_by_type() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "StatusCode"}, "alias": "status_code"},
                    {"function": "COL", "param": {"field": "ErrorType"}, "alias": "error_type"},
                    {"function": "CUSTOM", "param": {"expression": "count()"}, "alias": "error_count"}
                ],
                "filters": [{"field": "PulseType", "operator": "LIKE", "value": ["network.5%"]}],
                "groupBy": ["status_code", "error_type"]}"#,
            error_breakdown,
        );
        assert_eq!(rows.len(), 14);
        assert!(rows.iter().all(|r| r[0].starts_with('5')));
        assert_eq!(rows[0][1], "internal_server_error");
    }

    #[test]
    fn test_error_breakdown_without_family_filter_covers_both() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "StatusCode"}, "alias": "status_code"}],
                "filters": [{"field": "PulseType", "operator": "LIKE", "value": ["%network%"]}],
                "groupBy": ["status_code"]}"#,
            error_breakdown,
        );
        assert_eq!(rows.len(), 11);
    }

    #[test]
    fn test_provider_counts_within_variance() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "NetworkProvider"}, "alias": "network_provider"},
                    {"function": "NET_4XX", "alias": "4xx"}
                ],
                "filters": [{"field": "PulseType", "operator": "LIKE", "value": ["network.4%"]}],
                "groupBy": ["network_provider"]}"#,
            issues_by_provider,
        );
        assert_eq!(rows.len(), 5);
        let jio: u64 = rows[0][1].parse().unwrap();
        assert_eq!(rows[0][0], "Jio");
        assert!((90..=150).contains(&jio));
    }
}
