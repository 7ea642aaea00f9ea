//! # Session Signals
//!
//! Everything recorded for one session (span hierarchy, log lines or
//! exceptions, depending on the data type) plus the single-row span and
//! log detail views.
//!
//! Session signals always cover the five minutes before the reference
//! instant so the waterfall renders densely regardless of the time range.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;

use super::{scale, Rows};
use crate::bucket::iso;
use crate::generation::Generation;
use crate::request::{DataType, FilterOperator};
use crate::synth::SynthContext;

const SERVICE_NAME: &str = "pulse-mobile-app";
const EVENT_SEPARATOR: &str = "|||";

fn session_window(now: DateTime<Utc>) -> (DateTime<Utc>, Duration) {
    let span = Duration::minutes(5);
    (now - span, span)
}

// =============================================================================
// Span templates
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpanType {
    Internal,
    Network,
    Database,
    Render,
}

impl SpanType {
    fn kind(self) -> &'static str {
        match self {
            SpanType::Network | SpanType::Database => "CLIENT",
            SpanType::Internal | SpanType::Render => "INTERNAL",
        }
    }

    fn pulse_type(self) -> &'static str {
        match self {
            SpanType::Internal => "internal",
            SpanType::Network => "network.request",
            SpanType::Database => "database.query",
            SpanType::Render => "ui.render",
        }
    }
}

struct SpanTemplate {
    name: &'static str,
    span_type: SpanType,
    duration_ms: u64,
    children: &'static [SpanTemplate],
}

struct Interaction {
    name: &'static str,
    pulse_type: &'static str,
    base_ms: u64,
    /// Root span is named after the screen being loaded.
    per_screen: bool,
    children: &'static [SpanTemplate],
}

macro_rules! span {
    ($name:expr, $ty:ident, $ms:expr) => {
        SpanTemplate {
            name: $name,
            span_type: SpanType::$ty,
            duration_ms: $ms,
            children: &[],
        }
    };
    ($name:expr, $ty:ident, $ms:expr, [$($child:expr),* $(,)?]) => {
        SpanTemplate {
            name: $name,
            span_type: SpanType::$ty,
            duration_ms: $ms,
            children: &[$($child),*],
        }
    };
}

static INTERACTIONS: [Interaction; 5] = [
    Interaction {
        name: "AppStart",
        pulse_type: "app_start",
        base_ms: 2_500,
        per_screen: false,
        children: &[
            span!("SDK Initialization", Internal, 150, [
                span!("Config Load", Internal, 30),
                span!("Analytics Init", Internal, 50),
                span!("Crash Reporter Init", Internal, 40),
            ]),
            span!("Database Migration", Database, 200, [
                span!("Schema Check", Database, 50),
                span!("Run Migrations", Database, 120),
            ]),
            span!("User Session Restore", Internal, 300, [
                span!("Token Validation", Network, 180),
                span!("Profile Fetch", Network, 100),
            ]),
            span!("Initial Screen Render", Render, 400, [
                span!("Layout Inflation", Render, 80),
                span!("View Binding", Render, 60),
                span!("Data Binding", Render, 100),
            ]),
        ],
    },
    Interaction {
        name: "ScreenLoad",
        pulse_type: "screen_load",
        base_ms: 800,
        per_screen: true,
        children: &[
            span!("View Creation", Render, 100),
            span!("Data Fetch", Network, 350, [
                span!("API Request", Network, 280),
                span!("Response Parse", Internal, 50),
            ]),
            span!("Render Content", Render, 200, [
                span!("RecyclerView Bind", Render, 120),
                span!("Image Decode", Internal, 60),
            ]),
        ],
    },
    Interaction {
        name: "UserInteraction",
        pulse_type: "interaction",
        base_ms: 400,
        per_screen: false,
        children: &[
            span!("Click Handler", Internal, 20),
            span!("State Update", Internal, 50),
            span!("API Call", Network, 250, [
                span!("Request Prepare", Internal, 15),
                span!("Network Request", Network, 200),
                span!("Response Handle", Internal, 30),
            ]),
            span!("UI Update", Render, 80),
        ],
    },
    Interaction {
        name: "Navigation",
        pulse_type: "navigation",
        base_ms: 600,
        per_screen: false,
        children: &[
            span!("Route Resolve", Internal, 30),
            span!("Screen Transition", Render, 250, [
                span!("Exit Animation", Render, 100),
                span!("Enter Animation", Render, 120),
            ]),
            span!("New Screen Init", Internal, 150),
            span!("Data Prefetch", Network, 170),
        ],
    },
    Interaction {
        name: "NetworkRequest",
        pulse_type: "network.request",
        base_ms: 500,
        per_screen: false,
        children: &[
            span!("DNS Lookup", Network, 20),
            span!("TCP Connect", Network, 40),
            span!("TLS Handshake", Network, 60),
            span!("Request Send", Network, 30),
            span!("Server Processing", Network, 200),
            span!("Response Receive", Network, 100),
            span!("Body Parse", Internal, 50),
        ],
    },
];

const SCREENS: [&str; 6] = [
    "HomeScreen",
    "ProfileScreen",
    "SettingsScreen",
    "SearchScreen",
    "DetailsScreen",
    "CheckoutScreen",
];

struct SignalSpan {
    trace_id: String,
    span_id: String,
    parent_span_id: String,
    name: String,
    kind: &'static str,
    start: DateTime<Utc>,
    duration_ns: u64,
    status: &'static str,
    pulse_type: &'static str,
}

impl SignalSpan {
    fn cell(&self, alias: &str) -> String {
        match alias.to_ascii_lowercase().as_str() {
            "traceid" => self.trace_id.clone(),
            "spanid" => self.span_id.clone(),
            "parentspanid" => self.parent_span_id.clone(),
            "spanname" => self.name.clone(),
            "spankind" => self.kind.to_string(),
            "servicename" => SERVICE_NAME.to_string(),
            "timestamp" => iso(&self.start),
            "duration" => self.duration_ns.to_string(),
            "statuscode" => self.status.to_string(),
            "pulsetype" => self.pulse_type.to_string(),
            _ => String::new(),
        }
    }
}

fn status<R: Rng>(rng: &mut R, ok_ratio: f64) -> &'static str {
    if rng.gen_bool(ok_ratio) {
        "OK"
    } else {
        "ERROR"
    }
}

fn add_span(
    g: &mut Generation<'_>,
    spans: &mut Vec<SignalSpan>,
    trace_id: &str,
    parent: &str,
    template: &SpanTemplate,
    start: DateTime<Utc>,
    multiplier: f64,
) {
    let span_id = g.hex(16);
    spans.push(SignalSpan {
        trace_id: trace_id.to_string(),
        span_id: span_id.clone(),
        parent_span_id: parent.to_string(),
        name: template.name.to_string(),
        kind: template.span_type.kind(),
        start,
        duration_ns: scale(template.duration_ms, multiplier) * 1_000_000,
        status: status(&mut g.rng, 0.92),
        pulse_type: template.span_type.pulse_type(),
    });

    let mut offset_ms = 3;
    for child in template.children {
        let child_start = start + Duration::milliseconds(offset_ms as i64);
        add_span(g, spans, trace_id, &span_id, child, child_start, multiplier);
        offset_ms += scale(child.duration_ms, multiplier) + 2;
    }
}

/// 8-12 traces, one interaction template each, spread over the session.
fn trace_spans(g: &mut Generation<'_>) -> Vec<SignalSpan> {
    let (start, window) = session_window(g.now);
    let traces: usize = g.rng.gen_range(8..=12);
    let slot_ms = window.num_milliseconds() as f64 / traces as f64;
    let mut spans = Vec::new();

    for t in 0..traces {
        let template = &INTERACTIONS[t % INTERACTIONS.len()];
        let trace_id = g.hex(32);
        let jitter: f64 = g.rng.gen_range(0.0..0.3);
        let trace_start = start + Duration::milliseconds((slot_ms * (t as f64 + jitter)) as i64);
        let multiplier: f64 = g.rng.gen_range(0.7..1.3);

        let name = if template.per_screen {
            format!("{} Load", SCREENS[t % SCREENS.len()])
        } else {
            template.name.to_string()
        };
        let root_id = g.hex(16);
        spans.push(SignalSpan {
            trace_id: trace_id.clone(),
            span_id: root_id.clone(),
            parent_span_id: String::new(),
            name,
            kind: "INTERNAL",
            start: trace_start,
            duration_ns: scale(template.base_ms, multiplier) * 1_000_000,
            status: status(&mut g.rng, 0.95),
            pulse_type: template.pulse_type,
        });

        let mut offset_ms = 5;
        for child in template.children {
            let child_start = trace_start + Duration::milliseconds(offset_ms as i64);
            add_span(g, &mut spans, &trace_id, &root_id, child, child_start, multiplier);
            offset_ms += scale(child.duration_ms, multiplier) + 5;
        }
    }

    spans.sort_by_key(|s| s.start);
    spans
}

// =============================================================================
// Logs and exceptions
// =============================================================================

const LOG_BODIES: [&str; 36] = [
    "Application initialized",
    "User session started",
    "Fetching user preferences from cache",
    "Cache hit: user_preferences",
    "Loading HomeScreen",
    "HomeScreen rendered successfully",
    "Network request: GET /api/v1/user/profile",
    "Response received: 200 OK (234ms)",
    "Updating UI with profile data",
    "User tapped: 'Settings' button",
    "Navigating to SettingsScreen",
    "SettingsScreen loaded",
    "Fetching notification settings",
    "Push token registered",
    "Analytics event: screen_view (SettingsScreen)",
    "User changed theme preference",
    "Saving preferences to local storage",
    "Database write completed (12ms)",
    "Background sync initiated",
    "Syncing 3 pending items",
    "Sync completed successfully",
    "Memory usage: 128MB (normal)",
    "Location permission requested",
    "Location permission granted",
    "GPS coordinates received",
    "Map tiles loaded (8 tiles)",
    "Image loaded: profile_photo.jpg",
    "Image cached successfully",
    "Checking for app updates",
    "App is up to date",
    "Session heartbeat sent",
    "WebSocket connection established",
    "Real-time updates enabled",
    "User returned to HomeScreen",
    "Refreshing home feed",
    "Feed updated with 5 new items",
];

const SEVERITIES: [&str; 8] = ["INFO", "DEBUG", "INFO", "DEBUG", "INFO", "WARN", "INFO", "DEBUG"];

struct SessionException {
    kind: &'static str,
    title: &'static str,
    message: &'static str,
    screen: &'static str,
}

const SESSION_EXCEPTIONS: [SessionException; 4] = [
    SessionException {
        kind: "non_fatal",
        title: "NetworkTimeoutException",
        message: "Connection timed out after 30000ms",
        screen: "HomeScreen",
    },
    SessionException {
        kind: "crash",
        title: "NullPointerException",
        message: "Cannot invoke method 'getString()' on null object reference",
        screen: "ProfileScreen",
    },
    SessionException {
        kind: "anr",
        title: "Application Not Responding",
        message: "Input dispatching timed out (Waiting to send non-key event)",
        screen: "CheckoutScreen",
    },
    SessionException {
        kind: "non_fatal",
        title: "OutOfMemoryError",
        message: "Failed to allocate 4194304 bytes",
        screen: "ImageGalleryScreen",
    },
];

fn log_rows(g: &mut Generation<'_>, session_id: &str) -> Rows {
    let request = g.request;
    let (start, window) = session_window(g.now);
    let n: usize = g.rng.gen_range(25..40);
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let fraction = i as f64 / (n - 1) as f64 * 0.95;
        let at = start + Duration::milliseconds((window.num_milliseconds() as f64 * fraction) as i64);
        let mut row = Vec::with_capacity(request.select.len());
        for field in &request.select {
            let cell = match field.alias.to_ascii_lowercase().as_str() {
                "traceid" => format!("{}-trace-{}", session_id, i / 3),
                "spanid" => g.hex(16),
                "timestamp" => iso(&at),
                "severitytext" => SEVERITIES[i % SEVERITIES.len()].to_string(),
                "body" => LOG_BODIES[i % LOG_BODIES.len()].to_string(),
                "pulsetype" => "log".to_string(),
                _ => String::new(),
            };
            row.push(cell);
        }
        rows.push(row);
    }
    rows
}

fn exception_rows(g: &mut Generation<'_>, session_id: &str) -> Rows {
    let request = g.request;
    let (start, window) = session_window(g.now);
    let n: usize = g.rng.gen_range(1..=2);
    let stamp = g.now.timestamp_millis();
    let mut rows = Vec::with_capacity(n);
    for (i, exception) in SESSION_EXCEPTIONS.iter().take(n).enumerate() {
        let fraction = 0.3 + i as f64 * 0.3;
        let at = start + Duration::milliseconds((window.num_milliseconds() as f64 * fraction) as i64);
        let mut row = Vec::with_capacity(request.select.len());
        for field in &request.select {
            let cell = match field.alias.to_ascii_lowercase().as_str() {
                "timestamp" => iso(&at),
                "pulsetype" => format!("device.{}", exception.kind),
                "title" => exception.title.to_string(),
                "exceptionmessage" => exception.message.to_string(),
                "exceptiontype" => exception.kind.to_string(),
                "screenname" => exception.screen.to_string(),
                "traceid" => format!("{}-exception-trace-{}", session_id, i),
                "spanid" => g.hex(16),
                "groupid" => format!("group-{}-{}-{}", exception.kind, stamp, i),
                _ => String::new(),
            };
            row.push(cell);
        }
        rows.push(row);
    }
    rows
}

/// Signals for the session named by the `SessionId` filter.
pub fn session_signals(g: &mut Generation<'_>) -> Rows {
    let request = g.request;
    let session_id = request
        .filter_value("SessionId", FilterOperator::Eq)
        .unwrap_or("mock-session-123")
        .to_string();
    tracing::debug!("session signals for `{}` ({:?})", session_id, request.data_type);

    match request.data_type {
        DataType::Traces => {
            let spans = trace_spans(g);
            spans
                .iter()
                .map(|span| request.select.iter().map(|f| span.cell(&f.alias)).collect::<Vec<_>>())
                .collect()
        }
        DataType::Logs => log_rows(g, &session_id),
        DataType::Exceptions => exception_rows(g, &session_id),
    }
}

// =============================================================================
// Detail views
// =============================================================================

fn resource_attributes(full: bool) -> serde_json::Value {
    let mut attrs = json!({
        "service.name": SERVICE_NAME,
        "service.version": "3.2.1",
        "telemetry.sdk.name": "pulse-otel-sdk",
        "telemetry.sdk.version": "1.4.0",
        "device.id": "ABC123XYZ789",
        "device.model.name": "iPhone 14 Pro",
        "device.manufacturer": "Apple",
        "os.type": "iOS",
        "os.version": "17.2",
        "deployment.environment": "production",
    });
    if full {
        if let Some(map) = attrs.as_object_mut() {
            map.insert("os.name".into(), json!("iOS"));
            map.insert("host.arch".into(), json!("arm64"));
            map.insert("process.runtime.name".into(), json!("iOS"));
            map.insert("process.runtime.version".into(), json!("17.2"));
        }
    }
    attrs
}

/// One row: resource and span attributes as JSON, events and links as
/// `|||`-joined columns.
pub fn span_details(g: &mut Generation<'_>) -> Rows {
    let span_attributes = json!({
        "pulse.type": "screen_load",
        "pulse.screen.name": "HomeScreen",
        "pulse.session.id": "session-abc-123",
        "http.method": "GET",
        "http.url": "https://api.example.com/v1/user/profile",
        "http.status_code": "200",
        "http.response_content_length": "2458",
        "http.request_content_length": "0",
        "net.peer.name": "api.example.com",
        "net.peer.port": "443",
        "user_agent.original": "PulseApp/3.2.1 (iOS 17.2; iPhone14,2)",
        "thread.id": "1",
        "thread.name": "main",
        "code.function": "loadHomeScreen",
        "code.filepath": "HomeViewController.swift",
        "code.lineno": "142",
        "enduser.id": "user-12345",
        "app.screen.previous": "SplashScreen",
        "app.navigation.type": "push",
    });

    let now = g.now;
    let events = [
        (
            now - Duration::milliseconds(100),
            "view.created",
            json!({"view.class": "HomeViewController", "view.id": "home_root"}),
        ),
        (
            now - Duration::milliseconds(50),
            "data.loaded",
            json!({"data.source": "cache", "data.items": "12"}),
        ),
        (
            now,
            "view.rendered",
            json!({"view.frame_time": "16.7ms", "view.dropped_frames": "0"}),
        ),
    ];
    let link_trace = g.hex(32);
    let link_span = g.hex(16);
    let link_attributes = json!({"link.type": "parent_request", "link.source": "api_gateway"});

    let joined = |cells: Vec<String>| cells.join(EVENT_SEPARATOR);
    let row = g.fill_row(SynthContext::default(), |alias| {
        let cell = match alias.to_ascii_lowercase().as_str() {
            "resourceattributes" => resource_attributes(true).to_string(),
            "spanattributes" => span_attributes.to_string(),
            "eventstimestamp" => joined(events.iter().map(|(t, _, _)| iso(t)).collect()),
            "eventsname" => joined(events.iter().map(|(_, n, _)| n.to_string()).collect()),
            "eventsattributes" => joined(events.iter().map(|(_, _, a)| a.to_string()).collect()),
            "linkstraceid" => link_trace.clone(),
            "linksspanid" => link_span.clone(),
            "linksattributes" => link_attributes.to_string(),
            _ => String::new(),
        };
        Some(cell)
    });
    vec![row]
}

const DETAIL_LOG_BODIES: [&str; 5] = [
    "User completed profile update successfully",
    "Network request completed: GET /api/v1/user/profile (200 OK)",
    "Screen transition: HomeScreen -> ProfileScreen",
    "Cache hit for user preferences data",
    "Background sync completed with 3 items",
];

// INFO=9, DEBUG=5, WARN=13 in OpenTelemetry severity numbers.
const DETAIL_SEVERITIES: [(&str, u8); 3] = [("INFO", 9), ("DEBUG", 5), ("WARN", 13)];

pub fn log_details(g: &mut Generation<'_>) -> Rows {
    let index = g.rng.gen_range(0..DETAIL_LOG_BODIES.len());
    let (severity, severity_number) = DETAIL_SEVERITIES[index % DETAIL_SEVERITIES.len()];
    let log_attributes = json!({
        "log.file.name": "AppLogger.swift",
        "log.file.path": "/Sources/Logging/AppLogger.swift",
        "log.record.uid": format!("log-rec-{}", g.hex(8)),
        "code.function": "logEvent",
        "code.lineno": "87",
        "thread.id": "1",
        "thread.name": "main",
        "event.domain": "app",
        "event.name": "user_action",
        "user.id": "user-12345",
        "screen.name": "HomeScreen",
        "session.id": "session-abc-123",
        "app.state": "foreground",
        "network.type": "wifi",
    });
    let scope_attributes = json!({"scope.name": "com.pulse.app.logger", "scope.version": "1.0.0"});

    let row = g.fill_row(SynthContext::default(), |alias| {
        let cell = match alias.to_ascii_lowercase().as_str() {
            "resourceattributes" => resource_attributes(false).to_string(),
            "logattributes" => log_attributes.to_string(),
            "scopeattributes" => scope_attributes.to_string(),
            "body" => DETAIL_LOG_BODIES[index].to_string(),
            "severitytext" => severity.to_string(),
            "severitynumber" => severity_number.to_string(),
            _ => String::new(),
        };
        Some(cell)
    });
    vec![row]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::QueryRequest;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn request(data_type: &str, aliases: &[&str]) -> QueryRequest {
        let select: Vec<String> = aliases
            .iter()
            .map(|a| format!(r#"{{"function": "COL", "param": {{"field": "{a}"}}, "alias": "{a}"}}"#))
            .collect();
        let body = format!(
            r#"{{"dataType": "{}", "select": [{}],
                "filters": [{{"field": "SessionId", "operator": "EQ", "value": ["s-42"]}}]}}"#,
            data_type,
            select.join(",")
        );
        QueryRequest::from_json(body.as_bytes()).unwrap()
    }

    #[test]
    fn test_trace_spans_form_a_hierarchy() {
        let req = request("TRACES", &["TraceId", "SpanId", "ParentSpanId", "SpanName", "Timestamp"]);
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(6), None);
        let rows = session_signals(&mut g);
        assert!(!rows.is_empty());

        let roots = rows.iter().filter(|r| r[2].is_empty()).count();
        assert!((8..=12).contains(&roots));
        for row in rows.iter().filter(|r| !r[2].is_empty()) {
            let parent = rows.iter().find(|p| p[1] == row[2]).unwrap();
            assert_eq!(parent[0], row[0]);
        }
        let stamps: Vec<&String> = rows.iter().map(|r| &r[4]).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
    }

    #[test]
    fn test_log_and_exception_counts() {
        let req = request("LOGS", &["TraceId", "Body", "PulseType"]);
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(6), None);
        let rows = session_signals(&mut g);
        assert!((25..40).contains(&rows.len()));
        assert_eq!(rows[0][0], "s-42-trace-0");
        assert!(rows.iter().all(|r| r[2] == "log"));

        let req = request("EXCEPTIONS", &["Title", "PulseType"]);
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(6), None);
        let rows = session_signals(&mut g);
        assert!((1..=2).contains(&rows.len()));
        assert_eq!(rows[0][1], "device.non_fatal");
    }

    #[test]
    fn test_span_details_row() {
        let req = QueryRequest::from_json(
            br#"{"dataType": "TRACES",
                "select": [
                    {"function": "CUSTOM", "param": {"expression": "toJSONString(ResourceAttributes)"}, "alias": "resourceAttributes"},
                    {"function": "COL", "param": {"field": "Events.Name"}, "alias": "eventsName"},
                    {"function": "COL", "param": {"field": "Links.TraceId"}, "alias": "linksTraceId"}
                ],
                "filters": [
                    {"field": "TraceId", "operator": "EQ", "value": ["t"]},
                    {"field": "SpanId", "operator": "EQ", "value": ["s"]}
                ],
                "limit": 1}"#,
        )
        .unwrap();
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(6), None);
        let rows = span_details(&mut g);
        assert_eq!(rows.len(), 1);
        let resource: serde_json::Value = serde_json::from_str(&rows[0][0]).unwrap();
        assert_eq!(resource["service.name"], SERVICE_NAME);
        assert_eq!(rows[0][1], "view.created|||data.loaded|||view.rendered");
        assert_eq!(rows[0][2].len(), 32);
    }
}
