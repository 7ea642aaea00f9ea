//! # SDK Configuration
//!
//! Versioned configuration pushed to the mobile SDKs. Exactly one version is
//! active at a time. An update appends a new active version on top of the
//! active one; a create discards the history and starts again at version 1.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::store::merge_patch;

const CURRENT_USER: &str = "current.user@example.com";
const ALL_SDKS: [&str; 4] = ["android_native", "android_rn", "ios_native", "ios_rn"];
const NATIVE_SDKS: [&str; 2] = ["android_native", "ios_native"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVersionMeta {
    pub version: u64,
    pub created_at: String,
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
struct ConfigVersion {
    config: Value,
    meta: ConfigVersionMeta,
}

/// Baseline configuration at `version` with the given default session
/// sample rate.
pub fn baseline(version: u64, session_sample_rate: f64) -> Value {
    json!({
        "version": version,
        "filtersConfig": filters_config(),
        "samplingConfig": sampling_config(session_sample_rate),
        "signals": {
            "scheduleDurationMs": 5000,
            "collectorUrl": "https://collector.pulse.io/v1/traces",
            "attributesToDrop": ["password", "credit_card", "ssn", "auth_token"],
        },
        "interaction": {
            "collectorUrl": "https://collector.pulse.io/v1/interactions",
            "configUrl": "https://config.pulse.io/v1/configs/latest",
            "beforeInitQueueSize": 100,
        },
        "featureConfigs": feature_configs(),
    })
}

fn event_filter(id: &str, name: &str, prop: (&str, &str), scope: &[&str], sdks: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "props": [{"name": prop.0, "value": prop.1}],
        "scope": scope,
        "sdks": sdks,
    })
}

fn filters_config() -> Value {
    json!({
        "mode": "blacklist",
        "whitelist": [
            event_filter("flt-test-event", "test_event", ("user_id", ".*test.*"), &["logs", "traces"], &NATIVE_SDKS),
        ],
        "blacklist": [
            event_filter(
                "flt-sensitive-event",
                "sensitive_event",
                ("contains_pii", "true"),
                &["logs", "traces", "metrics"],
                &ALL_SDKS,
            ),
            event_filter("flt-debug-log", "debug_log", ("level", "debug"), &["logs"], &NATIVE_SDKS),
        ],
    })
}

fn critical_event(id: &str, name: &str, prop: (&str, &str), scope: &[&str]) -> Value {
    json!({
        "id": id,
        "name": name,
        "props": [{"name": prop.0, "value": prop.1}],
        "scope": scope,
    })
}

fn sampling_config(session_sample_rate: f64) -> Value {
    let high_value = json!({
        "id": "rule-high-value-users",
        "name": "high_value_users",
        "match": {
            "type": "app_version_min",
            "sdks": NATIVE_SDKS,
            "app_version_min_inclusive": "2.0.0",
        },
        "session_sample_rate": 1.0,
    });
    let legacy = json!({
        "id": "rule-legacy-users",
        "name": "legacy_users",
        "match": {
            "type": "app_version_max",
            "sdks": ["android_native", "android_rn"],
            "app_version_max_inclusive": "1.5.0",
        },
        "session_sample_rate": 0.1,
    });
    let always_send = vec![
        critical_event("crit-crash", "crash", ("severity", "critical"), &["traces", "logs"]),
        critical_event("crit-payment-error", "payment_error", ("error_type", "payment.*"), &["traces"]),
        critical_event("crit-auth-failure", "auth_failure", ("error_code", "401|403"), &["traces", "logs"]),
    ];
    json!({
        "default": {"session_sample_rate": session_sample_rate},
        "rules": [high_value, legacy],
        "criticalEventPolicies": {"alwaysSend": always_send},
    })
}

fn feature_configs() -> Value {
    let features: [(&str, bool, f64, &[&str]); 4] = [
        ("crash_reporting", true, 1.0, &ALL_SDKS),
        ("network_monitoring", true, 0.8, &ALL_SDKS),
        ("performance_monitoring", true, 0.6, &NATIVE_SDKS),
        ("user_interaction_tracking", false, 0.3, &NATIVE_SDKS),
    ];
    features
        .into_iter()
        .map(|(name, enabled, rate, sdks)| {
            json!({
                "id": format!("feat-{}", name.replace('_', "-")),
                "featureName": name,
                "enabled": enabled,
                "session_sample_rate": rate,
                "sdks": sdks,
            })
        })
        .collect()
}

fn set_version(config: &mut Value, version: u64) {
    if let Some(map) = config.as_object_mut() {
        map.insert("version".into(), json!(version));
    }
}

// =============================================================================
// History
// =============================================================================

pub struct SdkConfigHistory {
    versions: Vec<ConfigVersion>,
}

impl SdkConfigHistory {
    /// Five versions over the last month, the newest active.
    pub fn seeded(now: DateTime<Utc>) -> Self {
        let history: [(u64, Duration, &str, &str, f64); 5] = [
            (1, Duration::days(30), "admin@example.com", "Initial configuration", 0.5),
            (2, Duration::days(7), "admin@example.com", "Added blacklist filters for sensitive data", 0.3),
            (3, Duration::days(3), "john.doe@example.com", "Reduced default sample rate to 50%", 0.5),
            (4, Duration::days(1), "jane.smith@example.com", "Added payment_error to critical events", 0.5),
            (5, Duration::hours(2), "john.doe@example.com", "Increased crash reporting sample rate", 0.5),
        ];
        let newest = history.len() as u64;
        let versions = history
            .into_iter()
            .map(|(version, age, author, description, rate)| ConfigVersion {
                config: baseline(version, rate),
                meta: ConfigVersionMeta {
                    version,
                    created_at: pq_core::bucket::iso(&(now - age)),
                    created_by: author.to_string(),
                    description: Some(description.to_string()),
                    is_active: version == newest,
                },
            })
            .collect();
        Self { versions }
    }

    /// The active configuration, falling back to the newest version.
    pub fn active(&self) -> Value {
        self.versions
            .iter()
            .find(|v| v.meta.is_active)
            .or_else(|| self.versions.iter().max_by_key(|v| v.meta.version))
            .map(|v| v.config.clone())
            .unwrap_or_else(|| baseline(1, 0.5))
    }

    /// Version metadata, newest first.
    pub fn versions(&self) -> Vec<ConfigVersionMeta> {
        let mut metas: Vec<ConfigVersionMeta> = self.versions.iter().map(|v| v.meta.clone()).collect();
        metas.sort_by(|a, b| b.version.cmp(&a.version));
        metas
    }

    pub fn version(&self, version: u64) -> Option<Value> {
        self.versions
            .iter()
            .find(|v| v.meta.version == version)
            .map(|v| v.config.clone())
    }

    /// Overlays `patch` on the active configuration as a new active version.
    /// A `description` key labels the version instead of entering the config.
    pub fn update(&mut self, mut patch: Value, now: DateTime<Utc>) -> Result<Value, serde_json::Error> {
        let description = take_description(&mut patch);
        let mut config = merge_patch(&self.active(), patch)?;
        let version = self.versions.iter().map(|v| v.meta.version).max().unwrap_or(0) + 1;
        set_version(&mut config, version);

        for existing in &mut self.versions {
            existing.meta.is_active = false;
        }
        self.versions.push(ConfigVersion {
            config: config.clone(),
            meta: ConfigVersionMeta {
                version,
                created_at: pq_core::bucket::iso(&now),
                created_by: CURRENT_USER.to_string(),
                description: Some(description.unwrap_or_else(|| format!("Configuration v{}", version))),
                is_active: true,
            },
        });
        tracing::info!("sdk config v{} is now active", version);
        Ok(config)
    }

    /// Replaces the history with `config` over the baseline as version 1.
    pub fn create(&mut self, mut config: Value, now: DateTime<Utc>) -> Result<Value, serde_json::Error> {
        take_description(&mut config);
        let mut created = merge_patch(&baseline(1, 0.5), config)?;
        set_version(&mut created, 1);
        self.versions = vec![ConfigVersion {
            config: created.clone(),
            meta: ConfigVersionMeta {
                version: 1,
                created_at: pq_core::bucket::iso(&now),
                created_by: CURRENT_USER.to_string(),
                description: Some("New configuration".to_string()),
                is_active: true,
            },
        }];
        tracing::info!("sdk config history reset");
        Ok(created)
    }
}

fn take_description(patch: &mut Value) -> Option<String> {
    let map = patch.as_object_mut()?;
    map.remove("version");
    match map.remove("description") {
        Some(Value::String(text)) => Some(text),
        _ => None,
    }
}
