//! # Exception Analytics
//!
//! Issue list, per-issue summary, stack traces, screen breakdown and
//! first/last-seen timestamps.

use chrono::Duration;
use rand::Rng;

use super::{scale, Rows};
use crate::bucket::iso;
use crate::generation::Generation;
use crate::hash::hex_digest;
use crate::request::FilterOperator;
use crate::synth::SynthContext;

const APP_VERSIONS: [&str; 3] = ["2.4.0", "2.3.5", "2.3.0"];

const LIST_MESSAGES: [&str; 15] = [
    "NullPointerException at ContestListFragment.onViewCreated",
    "OutOfMemoryError: Failed to allocate bitmap in TeamCreationActivity",
    "IllegalStateException: Fragment already added in MatchDetailsFragment",
    "IndexOutOfBoundsException: Invalid player list index in TeamSelectionAdapter",
    "ClassCastException: Cannot cast ContestModel to ContestDetailModel",
    "SQLiteException: database locked while saving team data",
    "NetworkOnMainThreadException in PaymentGatewayService",
    "FileNotFoundException: Player image resource not found",
    "IllegalArgumentException: Invalid contest ID in JoinContestHandler",
    "RuntimeException: Unexpected error in LiveScoreRefreshHandler",
    "TimeoutException: Contest API request timed out",
    "JSONException: Malformed response from leaderboard endpoint",
    "IllegalStateException: Cannot join contest - already started",
    "OutOfMemoryError: Loading too many match images in MatchListFragment",
    "NullPointerException: User session expired in ProfileActivity",
];

const SUMMARY_ISSUES: [(&str, &str); 10] = [
    ("NullPointerException at ContestListFragment.onViewCreated", "NullPointerException"),
    ("OutOfMemoryError: Failed to allocate bitmap in TeamCreationActivity", "OutOfMemoryError"),
    ("IllegalStateException: Fragment already added in MatchDetailsFragment", "IllegalStateException"),
    ("IndexOutOfBoundsException: Invalid player list index", "IndexOutOfBoundsException"),
    ("ClassCastException: Cannot cast ContestModel", "ClassCastException"),
    ("SQLiteException: database locked while saving team", "SQLiteException"),
    ("NetworkOnMainThreadException in PaymentGatewayService", "NetworkOnMainThreadException"),
    ("FileNotFoundException: Player image resource", "FileNotFoundException"),
    ("IllegalArgumentException: Invalid contest ID", "IllegalArgumentException"),
    ("RuntimeException: Unexpected error in LiveScoreRefreshHandler", "RuntimeException"),
];

const STACK_TRACE: &str = "at com.example.app.MainActivity.onCreate(MainActivity.java:45)
at android.app.Activity.performCreate(Activity.java:8051)
at android.app.ActivityThread.performLaunchActivity(ActivityThread.java:3265)
at android.app.ActivityThread.handleLaunchActivity(ActivityThread.java:3409)
at android.app.servertransaction.LaunchActivityItem.execute(LaunchActivityItem.java:83)
at android.app.servertransaction.TransactionExecutor.executeCallbacks(TransactionExecutor.java:135)
at android.app.servertransaction.TransactionExecutor.execute(TransactionExecutor.java:95)
at android.app.ActivityThread$H.handleMessage(ActivityThread.java:2016)
at android.os.Handler.dispatchMessage(Handler.java:107)
at android.os.Looper.loop(Looper.java:214)
at android.app.ActivityThread.main(ActivityThread.java:7356)";

const TRACE_DEVICES: [&str; 5] = [
    "Samsung Galaxy S23",
    "Google Pixel 7",
    "OnePlus 9",
    "Xiaomi Redmi Note 12",
    "Realme 10 Pro",
];

const TRACE_OS_VERSIONS: [&str; 3] = ["Android 13", "Android 12", "Android 11"];

const SCREEN_SHARES: [(&str, u64); 5] = [
    ("MainActivity", 35),
    ("ProfileScreen", 25),
    ("SettingsActivity", 18),
    ("CheckoutScreen", 12),
    ("LoginActivity", 10),
];

const SCREEN_TOTAL: u64 = 150;

fn title(message: &str) -> &str {
    message.split(" at ").next().unwrap_or(message)
}

fn capped(g: &Generation<'_>, max: usize, default: usize) -> usize {
    g.request
        .effective_limit()
        .map(|l| l.min(max))
        .unwrap_or(default)
}

/// Exceptions grouped by issue: up to 100 rows, 50-250 occurrences each.
pub fn list(g: &mut Generation<'_>) -> Rows {
    let n = capped(g, 100, 100);
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let message = LIST_MESSAGES[i % LIST_MESSAGES.len()];
        let group_id = format!("group-{}-{}", hex_digest(message, 16), i);
        let occurrences: u64 = g.rng.gen_range(50..250);
        rows.push(g.fill_row(SynthContext::default(), |alias| {
            let cell = match alias {
                "group_id" => group_id.clone(),
                "title" => title(message).to_string(),
                "error_message" => message.to_string(),
                "app_versions" => APP_VERSIONS.join(", "),
                "occurrences" => occurrences.to_string(),
                "affected_users" => scale(occurrences, 0.7).to_string(),
                _ => return None,
            };
            Some(cell)
        }));
    }
    rows
}

/// Top issues under one group id, occurrences strictly decreasing.
pub fn issue_summary(g: &mut Generation<'_>) -> Rows {
    let group_id = g
        .request
        .filter_value("GroupId", FilterOperator::Eq)
        .unwrap_or_default()
        .to_string();
    let n = capped(g, SUMMARY_ISSUES.len(), SUMMARY_ISSUES.len());
    let mut rows = Vec::with_capacity(n);
    for (i, (message, error_type)) in SUMMARY_ISSUES.iter().take(n).enumerate() {
        let occurrences = 60 - 5 * i as u64 + g.rng.gen_range(0..5);
        rows.push(g.fill_row(SynthContext::default(), |alias| {
            let cell = match alias {
                "group_id" => group_id.clone(),
                "title" => title(message).to_string(),
                "error_message" => message.to_string(),
                "error_type" => error_type.to_string(),
                "app_versions" => APP_VERSIONS.join(", "),
                "occurrences" => occurrences.to_string(),
                "affected_users" => scale(occurrences, 0.7).to_string(),
                _ => return None,
            };
            Some(cell)
        }));
    }
    rows
}

/// Individual occurrences, two hours apart, all carrying the same trace.
pub fn stack_traces(g: &mut Generation<'_>) -> Rows {
    let n = capped(g, 20, 10);
    let now = g.now;
    let stamp = now.timestamp_millis();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let at = now - Duration::hours(2 * (n - i) as i64);
        let mut span_id = format!("span-{}-{}", stamp, i);
        while span_id.len() < 16 {
            span_id.push('0');
        }
        span_id.truncate(16);
        rows.push(g.fill_row(SynthContext::default(), |alias| {
            let cell = match alias {
                "trace_id" => format!("trace-{}-{}", stamp, i),
                "span_id" => span_id.clone(),
                "timestamp" => iso(&at),
                "device" => TRACE_DEVICES[i % TRACE_DEVICES.len()].to_string(),
                "os_version" => TRACE_OS_VERSIONS[i % TRACE_OS_VERSIONS.len()].to_string(),
                "app_version" => APP_VERSIONS[i % APP_VERSIONS.len()].to_string(),
                "stacktrace" => STACK_TRACE.to_string(),
                "error_message" => "NullPointerException at MainActivity.onCreate".to_string(),
                "error_type" => "NullPointerException".to_string(),
                _ => return None,
            };
            Some(cell)
        }));
    }
    rows
}

pub fn screen_breakdown(g: &mut Generation<'_>) -> Rows {
    let mut rows = Vec::with_capacity(SCREEN_SHARES.len());
    for (screen, percent) in SCREEN_SHARES {
        let occurrences = SCREEN_TOTAL * percent / 100;
        rows.push(g.fill_row(SynthContext::default(), |alias| match alias {
            "screen_name" => Some(screen.to_string()),
            "occurrences" => Some(occurrences.to_string()),
            _ => None,
        }));
    }
    rows
}

/// First seen within a six-month lookback, last seen within the past week,
/// one row per group id named by the `GroupId IN` filter.
pub fn timestamps(g: &mut Generation<'_>) -> Rows {
    let group_ids: Vec<String> = g
        .request
        .filter("GroupId", FilterOperator::In)
        .map(|f| f.value.clone())
        .unwrap_or_default();
    let now = g.now;
    let lookback = now - Duration::days(180);
    let mut rows = Vec::with_capacity(group_ids.len());
    for group_id in &group_ids {
        let first = lookback + Duration::days(g.rng.gen_range(0..180));
        let last = (now - Duration::days(g.rng.gen_range(0..7))).max(first);
        rows.push(g.fill_row(SynthContext::default(), |alias| {
            let cell = match alias {
                "group_id" => group_id.clone(),
                "first_seen" => iso(&first),
                "last_seen" => iso(&last),
                _ => return None,
            };
            Some(cell)
        }));
    }
    rows
}
