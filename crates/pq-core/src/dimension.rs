//! # Dimension Value Resolver
//!
//! Maps a group-by field to the set of values its rows should carry. A
//! filter on the same field (or a semantic equivalent) supplies the set;
//! otherwise a curated dictionary does. Unknown fields get placeholders,
//! so the result is empty only when a restricted attribute is filtered to
//! values outside its allow list.

use regex::Regex;
use std::sync::OnceLock;

use crate::request::Filter;

const SUBSCRIPTION_PLANS: [&str; 3] = ["Starter", "Pro", "Enterprise"];

const PLATFORMS: &[&str] = &["Android", "iOS"];

const REGIONS: &[&str] = &[
    "Maharashtra",
    "Karnataka",
    "Delhi",
    "Tamil Nadu",
    "Uttar Pradesh",
    "West Bengal",
    "Gujarat",
    "Rajasthan",
];

const DEVICE_MODELS: &[&str] = &[
    "Samsung Galaxy S21",
    "iPhone 13 Pro",
    "Redmi Note 11",
    "OnePlus Nord 2",
    "Realme 9 Pro",
    "Vivo V23",
    "Oppo Reno 7",
    "iPhone 14",
    "Samsung Galaxy A53",
    "Poco X4 Pro",
];

const OS_VERSIONS: &[&str] = &[
    "Android 13",
    "Android 12",
    "Android 11",
    "iOS 16",
    "iOS 15",
    "iOS 14",
];

const APP_VERSIONS: &[&str] = &["1.0.0", "1.1.0", "1.2.0", "2.0.0", "2.1.0"];

pub const NETWORK_PROVIDERS: &[&str] = &[
    "Jio",
    "Airtel",
    "Vi (Vodafone Idea)",
    "BSNL",
    "Aircel",
    "Other",
];

const CONNECTION_TYPES: &[&str] = &["WiFi", "4G", "5G", "3G"];

pub const INTERACTION_NAMES: &[&str] = &[
    "JoinContestButtonClick",
    "SaveTeamButtonClick",
    "PlayerSelectTap",
    "ContestListAPIFetch",
    "PaymentSubmitClick",
    "WalletBalanceFetch",
    "MatchScheduleAPICall",
    "LeaderboardRefreshTap",
    "ProfileSaveClick",
    "NotificationTap",
    "FilterApplyTap",
    "LiveScoreRefresh",
];

const SCREEN_NAMES: &[&str] = &[
    "HomeScreen",
    "ProductListScreen",
    "ProductDetailScreen",
    "CheckoutFormScreen",
    "PaymentScreen",
    "ProfileScreen",
    "SearchResultsScreen",
    "OrderListScreen",
    "CartScreen",
    "WishlistScreen",
    "SettingsScreen",
    "NotificationsScreen",
];

const URLS: &[&str] = &[
    "https://api.example.com/v1/users",
    "https://api.example.com/v1/products",
    "https://api.example.com/v1/orders",
    "https://api.example.com/v1/payments",
    "https://api.example.com/v1/auth/login",
    "https://api.example.com/v1/cart",
    "https://api.example.com/v1/search",
    "https://api.example.com/v1/notifications",
    "https://api.example.com/v1/analytics",
    "https://api.example.com/v1/profile",
];

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE"];

const ATTRIBUTE_VALUES: &[&str] = &["Value1", "Value2", "Value3"];

const PLACEHOLDERS: &[&str] = &[
    "Item1", "Item2", "Item3", "Item4", "Item5", "Item6", "Item7", "Item8",
];

fn bracket_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^\s*(\w+)\['([^']+)'\]\s*$"))
        .as_ref()
        .ok()
}

// =============================================================================
// Field keys
// =============================================================================

/// A group-by or filter field, normalised for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    /// Lowercased namespace of `Namespace['attr']` syntax.
    pub namespace: Option<String>,
    /// Attribute inside the brackets, original case.
    pub attribute: Option<String>,
    /// Lowercase dictionary key.
    pub normalized: String,
}

impl FieldKey {
    pub fn parse(field: &str) -> Self {
        let captures = bracket_pattern().and_then(|re| re.captures(field));
        if let Some(caps) = captures {
            let namespace = caps[1].to_ascii_lowercase();
            let attribute = caps[2].to_string();
            let normalized = match attribute.to_ascii_lowercase().as_str() {
                "screen.name" => "screen_name".to_string(),
                "http.url" => "url".to_string(),
                "http.method" => "method".to_string(),
                other => other.to_string(),
            };
            return Self {
                namespace: Some(namespace),
                attribute: Some(attribute),
                normalized,
            };
        }
        Self {
            namespace: None,
            attribute: None,
            normalized: field.trim().to_ascii_lowercase(),
        }
    }

    fn is_interaction(&self) -> bool {
        matches!(
            self.normalized.as_str(),
            "interaction_name" | "interactionname" | "spanname" | "span_name"
        )
    }

    fn is_screen(&self) -> bool {
        self.normalized == "screen_name" || self.normalized == "screenname"
    }

    fn is_restricted(&self) -> bool {
        self.normalized == "subscriptionplan"
    }

    /// Whether a filter on `other` constrains this dimension.
    pub fn matches_filter(&self, raw: &str, other: &str) -> bool {
        if raw.trim().eq_ignore_ascii_case(other.trim()) {
            return true;
        }
        let theirs = FieldKey::parse(other);
        if theirs.normalized == self.normalized {
            return true;
        }
        if self.is_interaction() && theirs.is_interaction() {
            return true;
        }
        self.is_screen() && other.to_ascii_lowercase().contains("screen")
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Values for one group-by dimension, deduplicated in first-seen order.
pub fn resolve_values(field: &str, filters: &[Filter]) -> Vec<String> {
    let key = FieldKey::parse(field);
    let filtered = filters
        .iter()
        .filter(|f| f.is_structured())
        .find(|f| key.matches_filter(field, &f.field) && f.first_value().is_some())
        .map(|f| dedup(f.value.iter().map(|v| v.trim()).filter(|v| !v.is_empty())));

    if key.is_restricted() {
        return match filtered {
            Some(values) => {
                let allowed: Vec<String> = values
                    .into_iter()
                    .filter(|v| SUBSCRIPTION_PLANS.contains(&v.as_str()))
                    .collect();
                if allowed.is_empty() {
                    tracing::debug!("no allowed values for `{}`; returning no data", field);
                }
                allowed
            }
            None => owned(&SUBSCRIPTION_PLANS),
        };
    }

    if let Some(values) = filtered {
        return values;
    }

    if let Some(values) = dictionary(&key.normalized) {
        return owned(values);
    }

    match key.namespace.as_deref() {
        Some("spanattributes") | Some("resourceattributes") | Some("logattributes") => {
            owned(ATTRIBUTE_VALUES)
        }
        _ => {
            tracing::warn!(
                "no dictionary for dimension `{}` (normalised `{}`); using placeholders",
                field,
                key.normalized
            );
            owned(PLACEHOLDERS)
        }
    }
}

fn dictionary(normalized: &str) -> Option<&'static [&'static str]> {
    let compact = normalized.replace('_', "");
    let values = match compact.as_str() {
        "platform" => PLATFORMS,
        "region" | "geostate" => REGIONS,
        "devicemodel" => DEVICE_MODELS,
        "osversion" => OS_VERSIONS,
        "appversion" => APP_VERSIONS,
        "networkprovider" => NETWORK_PROVIDERS,
        "connectiontype" => CONNECTION_TYPES,
        "spanname" | "interactionname" => INTERACTION_NAMES,
        "screenname" => SCREEN_NAMES,
        "url" => URLS,
        "method" => HTTP_METHODS,
        _ => return None,
    };
    Some(values)
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn dedup<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}
