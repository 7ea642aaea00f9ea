//! # Response Builders
//!
//! One builder per [`QueryKind`]. Builders emit rows in select order and
//! leave ordering and limits to [`crate::assemble`], except where a shape
//! caps its own row count.

pub mod exceptions;
pub mod grouped;
pub mod network;
pub mod records;
pub mod series;
pub mod signals;

use crate::classify::QueryKind;
use crate::generation::Generation;

pub type Rows = Vec<Vec<String>>;

pub fn build(kind: QueryKind, g: &mut Generation<'_>) -> Rows {
    match kind {
        QueryKind::StackTraces => exceptions::stack_traces(g),
        QueryKind::ScreenBreakdown => exceptions::screen_breakdown(g),
        QueryKind::IssueSummary => exceptions::issue_summary(g),
        QueryKind::ExceptionTimestamps => exceptions::timestamps(g),
        QueryKind::ExceptionsList => exceptions::list(g),
        QueryKind::SpanDetails => signals::span_details(g),
        QueryKind::LogDetails => signals::log_details(g),
        QueryKind::SessionSignals => signals::session_signals(g),
        QueryKind::TimeSeries => series::time_series(g),
        QueryKind::NetworkErrorBreakdown => network::error_breakdown(g),
        QueryKind::NetworkDetail => network::api_metrics(g, true),
        QueryKind::NetworkList => network::api_metrics(g, false),
        QueryKind::NetworkIssuesByProvider => network::issues_by_provider(g),
        QueryKind::Grouped => grouped::grouped(g),
        QueryKind::SessionTimeline => records::session_timeline(g),
        QueryKind::SessionReplays => records::session_replays(g),
        QueryKind::Aggregate => grouped::aggregate(g),
    }
}

/// Builder-local integer scaling, floored.
pub(crate) fn scale(value: u64, factor: f64) -> u64 {
    (value as f64 * factor).floor() as u64
}
