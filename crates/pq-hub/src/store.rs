//! # Mock Store
//!
//! Users, interactions (jobs), alerts and SDK configuration behind the
//! dashboard's management screens. One store lives in each [`crate::AppState`]; tests build their own.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::sdk_config::{ConfigVersionMeta, SdkConfigHistory};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: u64,
    pub team_name: String,
    pub email_id: String,
    pub comm_email_id: String,
    pub phone_no: String,
    pub experiments: Vec<String>,
    pub last_active_today: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProp {
    pub name: String,
    pub value: String,
    pub operator: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub name: String,
    #[serde(default)]
    pub props: Vec<EventProp>,
    #[serde(default)]
    pub is_blacklisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub status: String,
    pub uptime_lower_limit_in_ms: u64,
    pub uptime_mid_limit_in_ms: u64,
    pub uptime_upper_limit_in_ms: u64,
    pub threshold_in_ms: u64,
    pub events: Vec<InteractionEvent>,
    pub global_blacklisted_events: Vec<InteractionEvent>,
    pub created_at: i64,
    pub created_by: String,
    pub updated_at: i64,
    pub updated_by: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInteractionRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
    #[serde(default)]
    pub global_blacklisted_events: Vec<InteractionEvent>,
    pub uptime_lower_limit_in_ms: Option<u64>,
    pub uptime_mid_limit_in_ms: Option<u64>,
    pub uptime_upper_limit_in_ms: Option<u64>,
    pub threshold_in_ms: Option<u64>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionFilter {
    pub status: Option<String>,
    pub user_email: Option<String>,
    pub interaction_name: Option<String>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPage {
    pub interactions: Vec<Interaction>,
    pub total_interactions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub alert_id: u64,
    pub job_id: String,
    pub name: String,
    pub description: String,
    pub severity_id: String,
    pub service_name: String,
    pub roster_name: String,
    pub current_state: String,
    pub last_evaluated_at: String,
    pub conditions: String,
    pub created_at: String,
    pub updated_at: String,
    pub created_by: String,
    pub job_name: String,
    pub metric: String,
    pub metric_operator: String,
    pub threshold: f64,
    pub min_total_interactions: u64,
    pub min_success_interactions: u64,
    pub min_error_interactions: u64,
    pub evaluation_interval: u64,
    pub evaluation_period: u64,
    pub is_snoozed: bool,
    pub snoozed_from: i64,
    pub snoozed_until: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertPage {
    pub total_alerts: usize,
    pub alerts: Vec<Alert>,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnoozeRequest {
    pub snooze_from: Option<i64>,
    pub snooze_until: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnoozeState {
    pub is_snoozed: bool,
    pub snoozed_from: i64,
    pub snoozed_until: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub reading: f64,
    pub threshold: f64,
    pub evaluated_at: String,
    pub current_state: String,
    pub evaluation_time: f64,
    pub total_interaction_count: u64,
    pub error_interaction_count: u64,
    pub success_interaction_count: u64,
    pub min_interaction_count: u64,
    pub min_success_interaction_count: u64,
    pub min_error_interaction_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertFilters {
    pub created_by: Vec<String>,
    pub updated_by: Vec<String>,
    pub job_ids: Vec<String>,
    pub current_states: Vec<String>,
}

const DEFAULT_AUTHOR: &str = "mock@dream11.com";
const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_SNOOZE_MS: i64 = 3_600_000;
const EVALUATIONS: usize = 10;
const ALERT_STATES: [&str; 5] = ["FIRING", "NORMAL", "ERRORED", "SILENCED", "NO_DATA"];

/// Overlays the keys of `patch` onto `item`.
pub fn merge_patch<T>(item: &T, patch: serde_json::Value) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(item)?;
    if let (Some(target), serde_json::Value::Object(fields)) = (merged.as_object_mut(), patch) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    serde_json::from_value(merged)
}

// =============================================================================
// Store
// =============================================================================

pub struct MockStore {
    users: RwLock<Vec<User>>,
    interactions: RwLock<Vec<Interaction>>,
    alerts: RwLock<Vec<Alert>>,
    sdk_configs: RwLock<SdkConfigHistory>,
}

impl MockStore {
    /// The fixtures the dashboard expects on first load.
    pub fn seeded() -> Self {
        let teams: [(&str, Vec<&str>, bool); 3] = [
            ("Frontend", vec!["experiment1", "experiment2"], true),
            ("Backend", vec!["experiment3"], false),
            ("DevOps", vec![], true),
        ];
        let users = teams
            .into_iter()
            .enumerate()
            .map(|(i, (team, experiments, active))| {
                let email = format!("user{}@dream11.com", i + 1);
                User {
                    user_id: i as u64 + 1,
                    team_name: team.to_string(),
                    email_id: email.clone(),
                    comm_email_id: email,
                    phone_no: format!("987654321{}", i),
                    experiments: experiments.into_iter().map(String::from).collect(),
                    last_active_today: active,
                }
            })
            .collect();

        let prop = |name: &str, value: &str| EventProp {
            name: name.into(),
            value: value.into(),
            operator: "EQUALS".into(),
        };
        let contest_join = Interaction {
            id: 1,
            name: "ContestJoinSuccess".into(),
            description: "User successfully joins a fantasy contest".into(),
            status: "RUNNING".into(),
            uptime_lower_limit_in_ms: 100,
            uptime_mid_limit_in_ms: 500,
            uptime_upper_limit_in_ms: 1000,
            threshold_in_ms: 60_000,
            events: vec![
                InteractionEvent {
                    name: "contest_join_start".into(),
                    props: vec![prop("contest_id", "string"), prop("user_id", "string")],
                    is_blacklisted: false,
                },
                InteractionEvent {
                    name: "contest_join_success".into(),
                    props: vec![prop("contest_id", "string"), prop("success", "true")],
                    is_blacklisted: false,
                },
            ],
            global_blacklisted_events: Vec::new(),
            created_at: 1_705_312_800_000,
            created_by: "user1@dream11.com".into(),
            updated_at: 1_705_312_800_000,
            updated_by: "user1@dream11.com".into(),
        };

        let evaluated = "2024-01-15T08:00:00.000Z".to_string();
        let error_rate = Alert {
            alert_id: 1,
            job_id: "1".into(),
            name: "High Error Rate Alert".into(),
            description: "Alert when error rate exceeds 10% threshold".into(),
            severity_id: "3".into(),
            service_name: "ContestJoinSuccess".into(),
            roster_name: "Frontend Team".into(),
            current_state: "FIRING".into(),
            last_evaluated_at: evaluated.clone(),
            conditions: String::new(),
            created_at: evaluated.clone(),
            updated_at: evaluated,
            created_by: "user1@dream11.com".into(),
            job_name: "ContestJoinSuccess".into(),
            metric: "ERROR_RATE".into(),
            metric_operator: "GREATER_THAN".into(),
            threshold: 0.1,
            min_total_interactions: 100,
            min_success_interactions: 90,
            min_error_interactions: 10,
            evaluation_interval: 300,
            evaluation_period: 600,
            is_snoozed: false,
            snoozed_from: 0,
            snoozed_until: 0,
        };

        Self {
            users: RwLock::new(users),
            interactions: RwLock::new(vec![contest_join]),
            alerts: RwLock::new(vec![error_rate]),
            sdk_configs: RwLock::new(SdkConfigHistory::seeded(Utc::now())),
        }
    }

    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    // -------------------------------------------------------------------------
    // Interactions
    // -------------------------------------------------------------------------

    pub async fn list_interactions(&self, filter: &InteractionFilter) -> InteractionPage {
        let interactions = self.interactions.read().await;
        let matching: Vec<Interaction> = interactions
            .iter()
            .filter(|i| filter.status.as_ref().map_or(true, |s| i.status == *s))
            .filter(|i| {
                filter
                    .user_email
                    .as_ref()
                    .map_or(true, |e| i.created_by.eq_ignore_ascii_case(e))
            })
            .filter(|i| {
                filter.interaction_name.as_ref().map_or(true, |n| {
                    i.name.to_lowercase().contains(&n.to_lowercase())
                })
            })
            .cloned()
            .collect();

        let total_interactions = matching.len();
        let size = filter.size.filter(|s| *s > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        let page = filter.page.unwrap_or(0);
        InteractionPage {
            interactions: matching.into_iter().skip(page * size).take(size).collect(),
            total_interactions,
        }
    }

    pub async fn interaction(&self, name: &str) -> Option<Interaction> {
        self.interactions
            .read()
            .await
            .iter()
            .find(|i| i.name == name)
            .cloned()
    }

    pub async fn create_interaction(
        &self,
        req: CreateInteractionRequest,
    ) -> Result<Interaction, String> {
        let mut interactions = self.interactions.write().await;
        if interactions.iter().any(|i| i.name == req.name) {
            return Err(req.name);
        }
        let now = Utc::now().timestamp_millis();
        let author = req.created_by.unwrap_or_else(|| DEFAULT_AUTHOR.to_string());
        let interaction = Interaction {
            id: interactions.iter().map(|i| i.id).max().unwrap_or(0) + 1,
            name: req.name,
            description: req.description,
            status: "RUNNING".into(),
            uptime_lower_limit_in_ms: req.uptime_lower_limit_in_ms.unwrap_or(100),
            uptime_mid_limit_in_ms: req.uptime_mid_limit_in_ms.unwrap_or(500),
            uptime_upper_limit_in_ms: req.uptime_upper_limit_in_ms.unwrap_or(1000),
            threshold_in_ms: req.threshold_in_ms.unwrap_or(60_000),
            events: req.events,
            global_blacklisted_events: req.global_blacklisted_events,
            created_at: now,
            created_by: author.clone(),
            updated_at: now,
            updated_by: author,
        };
        interactions.push(interaction.clone());
        Ok(interaction)
    }

    /// `Ok(None)` when no interaction has that name. A rename onto a name
    /// held by another interaction is rejected.
    pub async fn update_interaction(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<Option<Interaction>, ApiError> {
        let mut interactions = self.interactions.write().await;
        let Some(idx) = interactions.iter().position(|i| i.name == name) else {
            return Ok(None);
        };
        let mut updated = merge_patch(&interactions[idx], patch).map_err(ApiError::InvalidBody)?;
        let taken = interactions
            .iter()
            .enumerate()
            .any(|(j, other)| j != idx && other.name == updated.name);
        if taken {
            return Err(ApiError::InteractionExists(updated.name));
        }
        updated.id = interactions[idx].id;
        updated.updated_at = Utc::now().timestamp_millis();
        interactions[idx] = updated.clone();
        Ok(Some(updated))
    }

    pub async fn delete_interaction(&self, name: &str) -> bool {
        let mut interactions = self.interactions.write().await;
        let before = interactions.len();
        interactions.retain(|i| i.name != name);
        interactions.len() != before
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    pub async fn list_alerts(&self) -> AlertPage {
        let alerts = self.alerts.read().await.clone();
        AlertPage {
            total_alerts: alerts.len(),
            alerts,
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }

    pub async fn alert(&self, id: u64) -> Option<Alert> {
        self.alerts
            .read()
            .await
            .iter()
            .find(|a| a.alert_id == id)
            .cloned()
    }

    pub async fn create_alert(&self, mut alert: Alert) -> Alert {
        let mut alerts = self.alerts.write().await;
        let now = pq_core::bucket::iso(&Utc::now());
        alert.alert_id = alerts.iter().map(|a| a.alert_id).max().unwrap_or(0) + 1;
        alert.created_at = now.clone();
        alert.updated_at = now;
        alert.is_snoozed = false;
        alert.snoozed_from = 0;
        alert.snoozed_until = 0;
        alerts.push(alert.clone());
        alert
    }

    pub async fn update_alert(
        &self,
        id: u64,
        patch: serde_json::Value,
    ) -> Result<Option<Alert>, serde_json::Error> {
        let mut alerts = self.alerts.write().await;
        let Some(slot) = alerts.iter_mut().find(|a| a.alert_id == id) else {
            return Ok(None);
        };
        let mut updated = merge_patch(&*slot, patch)?;
        updated.alert_id = id;
        updated.updated_at = pq_core::bucket::iso(&Utc::now());
        *slot = updated.clone();
        Ok(Some(updated))
    }

    pub async fn delete_alert(&self, id: u64) -> bool {
        let mut alerts = self.alerts.write().await;
        let before = alerts.len();
        alerts.retain(|a| a.alert_id != id);
        alerts.len() != before
    }

    /// Silences an alert, by default for the next hour.
    pub async fn snooze_alert(&self, id: u64, req: SnoozeRequest) -> Option<SnoozeState> {
        let now = Utc::now().timestamp_millis();
        let state = SnoozeState {
            is_snoozed: true,
            snoozed_from: req.snooze_from.unwrap_or(now),
            snoozed_until: req.snooze_until.unwrap_or(now + DEFAULT_SNOOZE_MS),
        };
        self.set_snooze(id, &state, "SILENCED").await
    }

    /// Clears a snooze; the alert goes back to firing.
    pub async fn resume_alert(&self, id: u64) -> Option<SnoozeState> {
        let state = SnoozeState {
            is_snoozed: false,
            snoozed_from: 0,
            snoozed_until: 0,
        };
        self.set_snooze(id, &state, "FIRING").await
    }

    async fn set_snooze(&self, id: u64, state: &SnoozeState, current: &str) -> Option<SnoozeState> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts.iter_mut().find(|a| a.alert_id == id)?;
        alert.is_snoozed = state.is_snoozed;
        alert.snoozed_from = state.snoozed_from;
        alert.snoozed_until = state.snoozed_until;
        alert.current_state = current.to_string();
        alert.updated_at = pq_core::bucket::iso(&Utc::now());
        Some(state.clone())
    }

    /// Filter options for the alert list, drawn from the current fixtures.
    pub async fn alert_filters(&self) -> AlertFilters {
        let emails: Vec<String> = self
            .users
            .read()
            .await
            .iter()
            .map(|u| u.email_id.clone())
            .collect();
        let job_ids = self
            .interactions
            .read()
            .await
            .iter()
            .map(|i| i.id.to_string())
            .collect();
        AlertFilters {
            created_by: emails.clone(),
            updated_by: emails,
            job_ids,
            current_states: ALERT_STATES.iter().map(|s| s.to_string()).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // SDK configuration
    // -------------------------------------------------------------------------

    pub async fn sdk_config(&self) -> serde_json::Value {
        self.sdk_configs.read().await.active()
    }

    pub async fn sdk_config_versions(&self) -> Vec<ConfigVersionMeta> {
        self.sdk_configs.read().await.versions()
    }

    pub async fn sdk_config_version(&self, version: u64) -> Option<serde_json::Value> {
        self.sdk_configs.read().await.version(version)
    }

    pub async fn update_sdk_config(
        &self,
        patch: serde_json::Value,
    ) -> Result<serde_json::Value, serde_json::Error> {
        let now = Utc::now();
        self.sdk_configs.write().await.update(patch, now)
    }

    pub async fn create_sdk_config(
        &self,
        config: serde_json::Value,
    ) -> Result<serde_json::Value, serde_json::Error> {
        let now = Utc::now();
        self.sdk_configs.write().await.create(config, now)
    }
}

/// Ten hourly evaluations, newest first; every third one fired.
pub fn evaluation_history<R: Rng>(alert: &Alert, now: DateTime<Utc>, rng: &mut R) -> Vec<Evaluation> {
    (0..EVALUATIONS)
        .map(|i| {
            let total: u64 = rng.gen_range(100..300);
            let success = (total as f64 * rng.gen_range(0.7..1.0)).floor() as u64;
            let state = if i % 3 == 0 { "FIRING" } else { "NORMAL" };
            Evaluation {
                reading: round2(rng.gen_range(0.1..0.9)),
                threshold: alert.threshold,
                evaluated_at: pq_core::bucket::iso(&(now - Duration::hours(i as i64))),
                current_state: state.to_string(),
                evaluation_time: round2(rng.gen_range(2.0..5.0)),
                total_interaction_count: total,
                error_interaction_count: total - success,
                success_interaction_count: success,
                min_interaction_count: alert.min_total_interactions,
                min_success_interaction_count: alert.min_success_interactions,
                min_error_interaction_count: alert.min_error_interactions,
            }
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
