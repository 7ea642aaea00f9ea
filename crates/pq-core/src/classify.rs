//! # Query Shape Classifier
//!
//! Picks the response shape from the request's structure alone: select
//! aliases, group-by fields, filters, data type and limit. Specific
//! exception, detail and network shapes are tested before the generic
//! time-series and grouped ones.

use serde::Serialize;
use std::fmt;

use crate::request::{DataType, FilterOperator, QueryRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    StackTraces,
    ScreenBreakdown,
    IssueSummary,
    ExceptionTimestamps,
    ExceptionsList,
    SpanDetails,
    LogDetails,
    SessionSignals,
    TimeSeries,
    NetworkErrorBreakdown,
    NetworkDetail,
    NetworkList,
    NetworkIssuesByProvider,
    Grouped,
    SessionTimeline,
    SessionReplays,
    Aggregate,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::StackTraces => "stack_traces",
            QueryKind::ScreenBreakdown => "screen_breakdown",
            QueryKind::IssueSummary => "issue_summary",
            QueryKind::ExceptionTimestamps => "exception_timestamps",
            QueryKind::ExceptionsList => "exceptions_list",
            QueryKind::SpanDetails => "span_details",
            QueryKind::LogDetails => "log_details",
            QueryKind::SessionSignals => "session_signals",
            QueryKind::TimeSeries => "time_series",
            QueryKind::NetworkErrorBreakdown => "network_error_breakdown",
            QueryKind::NetworkDetail => "network_detail",
            QueryKind::NetworkList => "network_list",
            QueryKind::NetworkIssuesByProvider => "network_issues_by_provider",
            QueryKind::Grouped => "grouped",
            QueryKind::SessionTimeline => "session_timeline",
            QueryKind::SessionReplays => "session_replays",
            QueryKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const HTTP_METHOD_FIELD: &str = "SpanAttributes['http.method']";
pub const HTTP_URL_FIELD: &str = "SpanAttributes['http.url']";

// =============================================================================
// Classification
// =============================================================================

pub fn classify(request: &QueryRequest) -> QueryKind {
    if let Some(kind) = exception_shape(request) {
        return kind;
    }
    if let Some(kind) = detail_shape(request) {
        return kind;
    }
    if request.has_time_bucket() {
        return QueryKind::TimeSeries;
    }
    if request.is_grouped() {
        return grouped_shape(request);
    }
    if let Some(kind) = record_shape(request) {
        return kind;
    }
    QueryKind::Aggregate
}

fn exception_shape(request: &QueryRequest) -> Option<QueryKind> {
    if request.filter("GroupId", FilterOperator::Eq).is_some() {
        let has_ids = request.has_alias("trace_id") || request.has_alias("span_id");
        if has_ids && request.has_alias("stacktrace") {
            return Some(QueryKind::StackTraces);
        }
        if request.groups_by("screen_name") {
            return Some(QueryKind::ScreenBreakdown);
        }
        if request.groups_by("ExceptionMessage") || request.groups_by("error_message") {
            return Some(QueryKind::IssueSummary);
        }
    }
    if request.data_type == DataType::Exceptions && request.groups_by("group_id") {
        if request.has_alias("first_seen") && request.has_alias("last_seen") {
            return Some(QueryKind::ExceptionTimestamps);
        }
        return Some(QueryKind::ExceptionsList);
    }
    None
}

fn detail_shape(request: &QueryRequest) -> Option<QueryKind> {
    let trace = request.filter("TraceId", FilterOperator::Eq).is_some();
    let single_json = request.uses_expression("toJSONString") && request.limit == Some(1);

    if trace && single_json && request.filter("SpanId", FilterOperator::Eq).is_some() {
        return Some(QueryKind::SpanDetails);
    }
    if trace && single_json && request.data_type == DataType::Logs {
        return Some(QueryKind::LogDetails);
    }
    let session = request.filter("SessionId", FilterOperator::Eq).is_some();
    if session && !request.is_grouped() && !request.has_time_bucket() {
        return Some(QueryKind::SessionSignals);
    }
    None
}

fn grouped_shape(request: &QueryRequest) -> QueryKind {
    let network = request.filters.iter().any(|f| {
        f.field == "PulseType"
            && f.operator == FilterOperator::Like
            && f.value.iter().any(|v| v.to_ascii_lowercase().contains("network"))
    });
    let by_method_and_url = request.groups_by("method") && request.groups_by("url");

    if network
        && (request.groups_by("status_code") || request.groups_by("error_type"))
        && !request.groups_by("method")
        && !request.groups_by("url")
    {
        return QueryKind::NetworkErrorBreakdown;
    }
    if network && by_method_and_url {
        let pinned = request.filter(HTTP_METHOD_FIELD, FilterOperator::Eq).is_some()
            && request.filter(HTTP_URL_FIELD, FilterOperator::Eq).is_some();
        return if pinned {
            QueryKind::NetworkDetail
        } else {
            QueryKind::NetworkList
        };
    }

    let network_failures = request.filters.iter().any(|f| {
        f.field == "PulseType"
            && matches!(f.operator, FilterOperator::Eq | FilterOperator::Like)
            && f.value.iter().any(|v| {
                v == "network.0" || v.contains("network.4") || v.contains("network.5")
            })
    });
    if request.groups_by("network_provider") && network_failures {
        return QueryKind::NetworkIssuesByProvider;
    }
    QueryKind::Grouped
}

fn record_shape(request: &QueryRequest) -> Option<QueryKind> {
    let trace = request.has_alias_ignore_case("traceid");
    let span = request.has_alias_ignore_case("spanid");
    let events = request.has_alias("event_names");
    if !((events && (trace || span)) || (trace && span)) {
        return None;
    }
    if timeline_trace_id(request).is_some() {
        Some(QueryKind::SessionTimeline)
    } else {
        Some(QueryKind::SessionReplays)
    }
}

/// The trace a session-timeline listing is pinned to.
pub fn timeline_trace_id(request: &QueryRequest) -> Option<&str> {
    request
        .filters
        .iter()
        .find(|f| f.is_structured() && f.field.eq_ignore_ascii_case("traceid"))
        .and_then(|f| f.first_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> QueryRequest {
        QueryRequest::from_json(body.as_bytes()).unwrap()
    }

    #[test]
    fn test_stack_traces_beat_everything() {
        let req = parse(
            r#"{"dataType": "EXCEPTIONS",
                "select": [
                    {"function": "COL", "param": {"field": "TraceId"}, "alias": "trace_id"},
                    {"function": "COL", "param": {"field": "ExceptionStackTrace"}, "alias": "stacktrace"},
                    {"function": "TIME_BUCKET", "param": {"bucket": "1h"}, "alias": "t1"}
                ],
                "filters": [{"field": "GroupId", "operator": "EQ", "value": ["g1"]}],
                "groupBy": ["group_id"]}"#,
        );
        assert_eq!(classify(&req), QueryKind::StackTraces);
    }

    #[test]
    fn test_exception_list_and_timestamps() {
        let list = parse(
            r#"{"dataType": "EXCEPTIONS",
                "select": [{"function": "COL", "param": {"field": "GroupId"}, "alias": "group_id"}],
                "groupBy": ["group_id"]}"#,
        );
        assert_eq!(classify(&list), QueryKind::ExceptionsList);

        let stamps = parse(
            r#"{"dataType": "EXCEPTIONS",
                "select": [
                    {"function": "COL", "param": {"field": "GroupId"}, "alias": "group_id"},
                    {"function": "CUSTOM", "param": {"expression": "min(Timestamp)"}, "alias": "first_seen"},
                    {"function": "CUSTOM", "param": {"expression": "max(Timestamp)"}, "alias": "last_seen"}
                ],
                "groupBy": ["group_id"]}"#,
        );
        assert_eq!(classify(&stamps), QueryKind::ExceptionTimestamps);
    }

    #[test]
    fn test_time_series_with_t1_only_group() {
        let req = parse(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "TIME_BUCKET", "param": {"bucket": "5m"}, "alias": "t1"},
                    {"function": "APDEX", "alias": "apdex"}
                ],
                "groupBy": ["t1"]}"#,
        );
        assert_eq!(classify(&req), QueryKind::TimeSeries);
        assert!(!req.is_grouped());
    }

    #[test]
    fn test_network_shapes() {
        let breakdown = parse(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "StatusCode"}, "alias": "status_code"}],
                "filters": [{"field": "PulseType", "operator": "LIKE", "value": ["network.4%"]}],
                "groupBy": ["status_code", "error_type"]}"#,
        );
        assert_eq!(classify(&breakdown), QueryKind::NetworkErrorBreakdown);

        let list = parse(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "SpanAttributes['http.method']"}, "alias": "method"}],
                "filters": [{"field": "PulseType", "operator": "LIKE", "value": ["%network%"]}],
                "groupBy": ["method", "url"]}"#,
        );
        assert_eq!(classify(&list), QueryKind::NetworkList);

        let detail = parse(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "SpanAttributes['http.method']"}, "alias": "method"}],
                "filters": [
                    {"field": "PulseType", "operator": "LIKE", "value": ["%network%"]},
                    {"field": "SpanAttributes['http.method']", "operator": "EQ", "value": ["GET"]},
                    {"field": "SpanAttributes['http.url']", "operator": "EQ", "value": ["/api/v1/user/profile"]}
                ],
                "groupBy": ["method", "url"]}"#,
        );
        assert_eq!(classify(&detail), QueryKind::NetworkDetail);

        let provider = parse(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "NetworkProvider"}, "alias": "network_provider"}],
                "filters": [{"field": "PulseType", "operator": "EQ", "value": ["network.0"]}],
                "groupBy": ["network_provider"]}"#,
        );
        assert_eq!(classify(&provider), QueryKind::NetworkIssuesByProvider);
    }

    #[test]
    fn test_detail_and_session_shapes() {
        let span = parse(
            r#"{"dataType": "TRACES",
                "select": [{"function": "CUSTOM", "param": {"expression": "toJSONString(SpanAttributes)"}, "alias": "spanattributes"}],
                "filters": [
                    {"field": "TraceId", "operator": "EQ", "value": ["abc"]},
                    {"field": "SpanId", "operator": "EQ", "value": ["def"]}
                ],
                "limit": 1}"#,
        );
        assert_eq!(classify(&span), QueryKind::SpanDetails);

        let session = parse(
            r#"{"dataType": "LOGS",
                "select": [{"function": "COL", "param": {"field": "Body"}, "alias": "body"}],
                "filters": [{"field": "SessionId", "operator": "EQ", "value": "s-1"}]}"#,
        );
        assert_eq!(classify(&session), QueryKind::SessionSignals);
    }

    #[test]
    fn test_records_and_aggregate() {
        let replays = parse(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "TraceId"}, "alias": "traceid"},
                    {"function": "COL", "param": {"field": "EventName"}, "alias": "event_names"}
                ]}"#,
        );
        assert_eq!(classify(&replays), QueryKind::SessionReplays);

        let timeline = parse(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "TraceId"}, "alias": "TraceId"},
                    {"function": "COL", "param": {"field": "SpanId"}, "alias": "SpanId"}
                ],
                "filters": [{"field": "TraceId", "operator": "EQ", "value": ["trace-abc"]}]}"#,
        );
        assert_eq!(classify(&timeline), QueryKind::SessionTimeline);

        let aggregate = parse(r#"{"dataType": "TRACES", "select": [{"function": "CRASH", "alias": "crashes"}]}"#);
        assert_eq!(classify(&aggregate), QueryKind::Aggregate);
        assert_eq!(classify(&aggregate), classify(&aggregate));
    }
}
