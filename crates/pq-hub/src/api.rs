//! # API Handlers
//!
//! Axum handlers for the query endpoint and the mock management screens.
//! Successful responses are wrapped as `{"data": ...}`.

use crate::error::ApiError;
use crate::sdk_config::ConfigVersionMeta;
use crate::store::{
    evaluation_history, Alert, AlertFilters, AlertPage, CreateInteractionRequest, Evaluation,
    Interaction, InteractionFilter, InteractionPage, SnoozeRequest, SnoozeState, User,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use pq_core::{classify, QueryRequest, QueryResponse};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

type ApiResult<T> = Result<Json<Data<T>>, ApiError>;

fn data<T>(value: T) -> ApiResult<T> {
    Ok(Json(Data { data: value }))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

/// Like [`parse_body`], but an empty body reads as `T::default()`.
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    parse_body(body)
}

// =============================================================================
// Mock network behaviour
// =============================================================================

/// Applies the configured latency and random failure rate before any
/// mock endpoint runs.
pub async fn simulate_network(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mock = &state.config.mock;
    if mock.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(mock.delay_ms)).await;
    }
    let rate = mock.error_rate.clamp(0.0, 1.0);
    let fail = rate > 0.0 && rand::thread_rng().gen_bool(rate);
    if fail {
        tracing::warn!("simulated failure for {} {}", req.method(), req.uri().path());
        return ApiError::Simulated.into_response();
    }
    next.run(req).await
}

pub async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// Query
// =============================================================================

pub async fn query_distribution(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<QueryResponse> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::MissingBody);
    }
    let request = QueryRequest::from_json(&body)?;
    let kind = classify(&request);
    let response = state.engine.execute(&request)?;
    tracing::info!(
        "{:?} {} query: {} columns, {} rows",
        request.data_type,
        kind,
        response.fields.len(),
        response.rows.len()
    );
    data(response)
}

// =============================================================================
// Users
// =============================================================================

pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Vec<User>> {
    data(state.store.users().await)
}

// =============================================================================
// Interactions
// =============================================================================

pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<InteractionFilter>,
) -> ApiResult<InteractionPage> {
    data(state.store.list_interactions(&filter).await)
}

pub async fn create_interaction(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<Interaction> {
    let req: CreateInteractionRequest = parse_body(&body)?;
    let interaction = state
        .store
        .create_interaction(req)
        .await
        .map_err(ApiError::InteractionExists)?;
    tracing::info!("created interaction {}", interaction.name);
    data(interaction)
}

pub async fn get_interaction(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Interaction> {
    match state.store.interaction(&name).await {
        Some(interaction) => data(interaction),
        None => Err(ApiError::InteractionNotFound(name)),
    }
}

pub async fn update_interaction(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> ApiResult<Interaction> {
    let patch: serde_json::Value = parse_body(&body)?;
    state
        .store
        .update_interaction(&name, patch)
        .await?
        .map_or(Err(ApiError::InteractionNotFound(name)), data)
}

pub async fn delete_interaction(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_interaction(&name).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::InteractionNotFound(name))
    }
}

// =============================================================================
// Alerts
// =============================================================================

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> ApiResult<AlertPage> {
    data(state.store.list_alerts().await)
}

pub async fn create_alert(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<Alert> {
    let alert: Alert = parse_body(&body)?;
    let alert = state.store.create_alert(alert).await;
    tracing::info!("created alert {} ({})", alert.alert_id, alert.name);
    data(alert)
}

pub async fn get_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Alert> {
    match state.store.alert(id).await {
        Some(alert) => data(alert),
        None => Err(ApiError::AlertNotFound(id)),
    }
}

pub async fn update_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> ApiResult<Alert> {
    let patch: serde_json::Value = parse_body(&body)?;
    state
        .store
        .update_alert(id, patch)
        .await
        .map_err(ApiError::InvalidBody)?
        .map_or(Err(ApiError::AlertNotFound(id)), data)
}

pub async fn delete_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_alert(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::AlertNotFound(id))
    }
}

pub async fn alert_filters(State(state): State<Arc<AppState>>) -> ApiResult<AlertFilters> {
    data(state.store.alert_filters().await)
}

pub async fn alert_evaluation_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Evaluation>> {
    let alert = state.store.alert(id).await.ok_or(ApiError::AlertNotFound(id))?;
    let history = evaluation_history(&alert, chrono::Utc::now(), &mut rand::thread_rng());
    data(history)
}

pub async fn snooze_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    body: Bytes,
) -> ApiResult<SnoozeState> {
    let req: SnoozeRequest = parse_optional_body(&body)?;
    let snooze = state
        .store
        .snooze_alert(id, req)
        .await
        .ok_or(ApiError::AlertNotFound(id))?;
    tracing::info!("alert {} snoozed until {}", id, snooze.snoozed_until);
    data(snooze)
}

pub async fn resume_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> ApiResult<SnoozeState> {
    state
        .store
        .resume_alert(id)
        .await
        .map_or(Err(ApiError::AlertNotFound(id)), data)
}

// =============================================================================
// SDK configuration
// =============================================================================

pub async fn sdk_config_versions(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<ConfigVersionMeta>> {
    data(state.store.sdk_config_versions().await)
}

pub async fn active_sdk_config(State(state): State<Arc<AppState>>) -> ApiResult<serde_json::Value> {
    data(state.store.sdk_config().await)
}

pub async fn sdk_config_version(
    State(state): State<Arc<AppState>>,
    Path(version): Path<u64>,
) -> ApiResult<serde_json::Value> {
    state
        .store
        .sdk_config_version(version)
        .await
        .map_or(Err(ApiError::ConfigVersionNotFound(version)), data)
}

/// Publishes a new active version on top of the current one.
pub async fn update_sdk_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<serde_json::Value> {
    let patch: serde_json::Value = parse_body(&body)?;
    let config = state
        .store
        .update_sdk_config(patch)
        .await
        .map_err(ApiError::InvalidBody)?;
    data(config)
}

/// Starts a fresh history from the submitted configuration.
pub async fn create_sdk_config(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<serde_json::Value> {
    let config: serde_json::Value = parse_body(&body)?;
    let config = state
        .store
        .create_sdk_config(config)
        .await
        .map_err(ApiError::InvalidBody)?;
    data(config)
}
