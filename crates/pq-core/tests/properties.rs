use pq_core::bucket::parse_timestamp;
use pq_core::{classify, Engine, EngineOptions, QueryKind, QueryRequest, QueryResponse};

fn engine(seed: u64) -> Engine {
    Engine::new(EngineOptions {
        now: parse_timestamp("2025-07-07T06:00:00Z"),
        ..EngineOptions::seeded(seed)
    })
}

fn request(body: &str) -> QueryRequest {
    QueryRequest::from_json(body.as_bytes()).unwrap()
}

fn run(body: &str) -> QueryResponse {
    engine(7).execute(&request(body)).unwrap()
}

const SHAPES: &[&str] = &[
    r#"{"dataType": "TRACES",
        "timeRange": {"start": "2025-07-07T05:00:00Z", "end": "2025-07-07T06:00:00Z"},
        "select": [
            {"function": "TIME_BUCKET", "param": {"bucket": "5m"}, "alias": "t1"},
            {"function": "DURATION_P50", "alias": "p50"},
            {"function": "DURATION_P95", "alias": "p95"},
            {"function": "DURATION_P99", "alias": "p99"}
        ],
        "groupBy": ["t1"]}"#,
    r#"{"dataType": "TRACES",
        "select": [
            {"function": "COL", "param": {"field": "SpanName"}, "alias": "name"},
            {"function": "APDEX", "alias": "apdex"},
            {"function": "DURATION_P50", "alias": "p50"},
            {"function": "DURATION_P95", "alias": "p95"},
            {"function": "DURATION_P99", "alias": "p99"}
        ],
        "groupBy": ["name"],
        "limit": 3}"#,
    r#"{"dataType": "EXCEPTIONS",
        "select": [
            {"function": "COL", "param": {"field": "GroupId"}, "alias": "group_id"},
            {"function": "CRASH", "alias": "crashes"}
        ],
        "groupBy": ["group_id"]}"#,
    r#"{"dataType": "TRACES",
        "filters": [{"field": "SessionId", "operator": "EQ", "value": ["s-1"]}],
        "select": [
            {"function": "COL", "param": {"field": "TraceId"}, "alias": "traceid"},
            {"function": "COL", "param": {"field": "Timestamp"}, "alias": "timestamp"}
        ]}"#,
    r#"{"dataType": "TRACES",
        "select": [
            {"function": "COL", "param": {"field": "TraceId"}, "alias": "traceid"},
            {"function": "COL", "param": {"field": "SpanId"}, "alias": "spanid"},
            {"function": "CUSTOM", "param": {"expression": "groupArray(EventName)"}, "alias": "event_names"}
        ],
        "limit": 5}"#,
];

#[test]
fn test_rows_match_select_width() {
    for body in SHAPES {
        let req = request(body);
        let response = engine(1).execute(&req).unwrap();
        assert_eq!(response.fields.len(), req.select.len());
        assert!(
            response.rows.iter().all(|row| row.len() == req.select.len()),
            "ragged rows for {}",
            classify(&req)
        );
    }
}

#[test]
fn test_five_minute_buckets_are_inclusive() {
    let response = run(SHAPES[0]);
    assert_eq!(response.rows.len(), 13);
    assert_eq!(response.rows[0][0], "2025-07-07T05:00Z");
    assert_eq!(response.rows[12][0], "2025-07-07T06:00Z");
}

#[test]
fn test_percentiles_are_ordered() {
    for seed in 0..20 {
        for body in &SHAPES[..2] {
            let response = engine(seed).execute(&request(body)).unwrap();
            let p50 = response.column("p50").unwrap();
            let p95 = response.column("p95").unwrap();
            let p99 = response.column("p99").unwrap();
            for row in &response.rows {
                let read = |idx: usize| row[idx].parse::<f64>().unwrap();
                assert!(read(p50) <= read(p95), "p50 > p95 in {:?}", row);
                assert!(read(p95) <= read(p99), "p95 > p99 in {:?}", row);
            }
        }
    }
}

#[test]
fn test_grouped_limit_caps_rows() {
    let response = run(SHAPES[1]);
    assert!(response.rows.len() <= 3);
    assert!(!response.rows.is_empty());
}

#[test]
fn test_timeline_pins_trace_id() {
    let body = r#"{"dataType": "TRACES",
        "filters": [{"field": "TraceId", "operator": "EQ", "value": ["trace-abc"]}],
        "select": [
            {"function": "COL", "param": {"field": "TraceId"}, "alias": "traceid"},
            {"function": "COL", "param": {"field": "SpanId"}, "alias": "spanid"},
            {"function": "COL", "param": {"field": "Timestamp"}, "alias": "timestamp"}
        ]}"#;
    assert_eq!(classify(&request(body)), QueryKind::SessionTimeline);
    let response = run(body);
    assert!(!response.rows.is_empty());
    assert!(response.values("traceid").iter().all(|v| *v == "trace-abc"));
}

#[test]
fn test_session_start_users_by_platform() {
    let body = r#"{"dataType": "LOGS",
        "groupBy": ["platform"],
        "filters": [{"field": "PulseType", "operator": "EQ", "value": ["session_start"]}],
        "select": [
            {"function": "COL", "param": {"field": "Platform"}, "alias": "platform"},
            {"function": "CUSTOM", "param": {"expression": "uniqCombined(UserId)"}, "alias": "user_count"}
        ]}"#;
    let response = run(body);
    assert_eq!(response.fields, vec!["platform", "user_count"]);
    let platforms: Vec<&str> = response.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(platforms, vec!["Android", "iOS"]);
    assert!(response.rows.iter().all(|r| r[1].parse::<u64>().is_ok()));
}

#[test]
fn test_group_stack_traces_share_trace_text() {
    let body = r#"{"dataType": "EXCEPTIONS",
        "filters": [{"field": "GroupId", "operator": "EQ", "value": ["g1"]}],
        "select": [
            {"function": "COL", "param": {"field": "TraceId"}, "alias": "trace_id"},
            {"function": "COL", "param": {"field": "SpanId"}, "alias": "span_id"},
            {"function": "COL", "param": {"field": "ExceptionStackTrace"}, "alias": "stacktrace"}
        ]}"#;
    assert_eq!(classify(&request(body)), QueryKind::StackTraces);
    let response = run(body);
    let traces = response.values("stacktrace");
    assert!(!traces.is_empty());
    assert!(traces.iter().all(|t| !t.is_empty() && *t == traces[0]));
}

#[test]
fn test_classification_is_idempotent() {
    for body in SHAPES {
        let req = request(body);
        assert_eq!(classify(&req), classify(&req));
    }
}

#[test]
fn test_same_seed_same_table() {
    for body in SHAPES {
        let req = request(body);
        assert_eq!(engine(99).execute(&req).unwrap(), engine(99).execute(&req).unwrap());
    }
}
