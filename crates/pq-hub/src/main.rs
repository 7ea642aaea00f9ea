use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pq_core::{Engine, EngineOptions};

mod api;
mod error;
mod sdk_config;
mod store;

use store::MockStore;

// =============================================================================
// CLI
// =============================================================================

#[derive(Parser)]
#[command(
    name = "pq-hub",
    version = "0.1.0",
    about = "Pulse mock dashboard API"
)]
struct Args {
    /// Server bind address (overrides `[server] bind`)
    #[arg(long)]
    bind: Option<String>,

    /// Path to config file
    #[arg(long, default_value = "pq-hub.toml")]
    config: PathBuf,

    /// Fixed engine seed for reproducible responses
    #[arg(long)]
    seed: Option<u64>,
}

// =============================================================================
// Config
// =============================================================================

#[derive(Deserialize, Default, Clone)]
struct Config {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    engine: EngineOptions,
    #[serde(default)]
    mock: MockConfig,
}

#[derive(Deserialize, Clone)]
struct ServerConfig {
    #[serde(default = "default_bind")]
    bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Deserialize, Clone, Default)]
struct MockConfig {
    /// Artificial latency before every mock endpoint.
    #[serde(default)]
    delay_ms: u64,
    /// Probability in [0, 1] of answering with a simulated 500.
    #[serde(default)]
    error_rate: f64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".into()
}

fn load_config(path: &PathBuf) -> Config {
    if path.exists() {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("ignoring unreadable config {:?}: {}", path, e);
            Config::default()
        })
    } else {
        Config::default()
    }
}

// =============================================================================
// Application State
// =============================================================================

struct AppState {
    engine: Engine,
    store: MockStore,
    config: Config,
}

impl AppState {
    fn new(config: Config) -> Self {
        Self {
            engine: Engine::new(config.engine.clone()),
            store: MockStore::seeded(),
            config,
        }
    }
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/v1/interactions/performance-metric/distribution",
            post(api::query_distribution),
        )
        .route("/v1/users", get(api::list_users))
        .route(
            "/v1/interactions",
            get(api::list_interactions).post(api::create_interaction),
        )
        .route(
            "/v1/interactions/:name",
            get(api::get_interaction)
                .put(api::update_interaction)
                .delete(api::delete_interaction),
        )
        .route("/v1/alert", get(api::list_alerts).post(api::create_alert))
        .route("/v1/alert/filters", get(api::alert_filters))
        .route(
            "/v1/alert/:id",
            get(api::get_alert)
                .put(api::update_alert)
                .delete(api::delete_alert),
        )
        .route(
            "/v1/alert/:id/evaluationHistory",
            get(api::alert_evaluation_history),
        )
        .route(
            "/v1/alert/:id/snooze",
            post(api::snooze_alert).delete(api::resume_alert),
        )
        .route(
            "/v1/configs",
            get(api::sdk_config_versions)
                .post(api::update_sdk_config)
                .put(api::create_sdk_config),
        )
        .route("/v1/configs/active-config", get(api::active_sdk_config))
        .route("/v1/configs/:version", get(api::sdk_config_version))
        // Latency and failure injection cover the routes above only.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::simulate_network,
        ))
        .route("/healthz", get(api::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "pq_hub=info,pq_core=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = load_config(&args.config);
    if args.seed.is_some() {
        config.engine.seed = args.seed;
    }
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let addr: SocketAddr = match bind.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid bind address {}: {}", bind, e);
            std::process::exit(1);
        }
    };

    let seed = config.engine.seed;
    let (delay_ms, error_rate) = (config.mock.delay_ms, config.mock.error_rate);
    let app = router(Arc::new(AppState::new(config)));

    tracing::info!("pq-hub v0.1.0");
    tracing::info!("  Query:  http://{}/v1/interactions/performance-metric/distribution", addr);
    tracing::info!("  Seed:   {:?}", seed);
    tracing::info!("  Mock:   {}ms delay, {:.0}% errors", delay_ms, error_rate * 100.0);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app(mock: MockConfig) -> Router {
        let config = Config {
            engine: EngineOptions::seeded(11),
            mock,
            ..Default::default()
        };
        router(Arc::new(AppState::new(config)))
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    const DISTRIBUTION: &str = "/v1/interactions/performance-metric/distribution";

    #[tokio::test]
    async fn test_query_wrapped_in_data() {
        let body = r#"{"dataType": "TRACES", "select": [
            {"function": "COL", "param": {"field": "Platform"}, "alias": "platform"},
            {"function": "APDEX", "alias": "apdex"}
        ], "groupBy": ["platform"]}"#;
        let (status, json) = send(app(MockConfig::default()), "POST", DISTRIBUTION, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["fields"], serde_json::json!(["platform", "apdex"]));
        assert!(!json["data"]["rows"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_bodies() {
        let (status, json) = send(app(MockConfig::default()), "POST", DISTRIBUTION, "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "Request body is required");
        assert!(json["data"].is_null());

        let (status, json) = send(app(MockConfig::default()), "POST", DISTRIBUTION, "{nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_simulated_failures_spare_healthz() {
        let failing = MockConfig {
            delay_ms: 0,
            error_rate: 1.0,
        };
        let (status, json) = send(app(failing.clone()), "GET", "/v1/users", "").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "MOCK_ERROR");
        assert_eq!(json["error"]["cause"], "Random error simulation");

        let (status, _) = send(app(failing), "GET", "/healthz", "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_interaction_routes() {
        let (status, json) = send(app(MockConfig::default()), "GET", "/v1/interactions", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["totalInteractions"], 1);

        let (status, json) = send(
            app(MockConfig::default()),
            "GET",
            "/v1/interactions/ContestJoinSuccess",
            "",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["thresholdInMs"], 60000);

        let (status, json) =
            send(app(MockConfig::default()), "GET", "/v1/interactions/Missing", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "INTERACTION_NOT_FOUND");

        let (status, json) = send(
            app(MockConfig::default()),
            "POST",
            "/v1/interactions",
            r#"{"name": "ContestJoinSuccess"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INTERACTION_EXISTS");
    }

    #[tokio::test]
    async fn test_alert_routes_share_one_store() {
        let app = app(MockConfig::default());
        let (status, json) = send(
            app.clone(),
            "POST",
            "/v1/alert",
            r#"{"name": "Slow Launch", "metric": "APDEX", "threshold": 0.7}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["alert_id"], 2);

        let (_, json) = send(app.clone(), "GET", "/v1/alert", "").await;
        assert_eq!(json["data"]["total_alerts"], 2);

        let (status, _) = send(app.clone(), "DELETE", "/v1/alert/2", "").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, json) = send(app, "GET", "/v1/alert/2", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "ALERT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rename_onto_taken_name_is_rejected() {
        let app = app(MockConfig::default());
        let (status, _) = send(app.clone(), "POST", "/v1/interactions", r#"{"name": "Other"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            app.clone(),
            "PUT",
            "/v1/interactions/Other",
            r#"{"name": "ContestJoinSuccess"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "INTERACTION_EXISTS");

        let (_, json) = send(app.clone(), "GET", "/v1/interactions", "").await;
        assert_eq!(json["data"]["totalInteractions"], 2);

        let (status, _) = send(app.clone(), "DELETE", "/v1/interactions/ContestJoinSuccess", "").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app, "GET", "/v1/interactions/Other", "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_snooze_and_resume_alert() {
        let app = app(MockConfig::default());
        let (status, json) = send(
            app.clone(),
            "POST",
            "/v1/alert/1/snooze",
            r#"{"snoozeFrom": 1000, "snoozeUntil": 5000}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["isSnoozed"], true);
        assert_eq!(json["data"]["snoozedUntil"], 5000);

        let (_, json) = send(app.clone(), "GET", "/v1/alert/1", "").await;
        assert_eq!(json["data"]["is_snoozed"], true);
        assert_eq!(json["data"]["snoozed_from"], 1000);
        assert_eq!(json["data"]["current_state"], "SILENCED");

        let (status, json) = send(app.clone(), "DELETE", "/v1/alert/1/snooze", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["isSnoozed"], false);

        let (_, json) = send(app.clone(), "GET", "/v1/alert/1", "").await;
        assert_eq!(json["data"]["is_snoozed"], false);
        assert_eq!(json["data"]["current_state"], "FIRING");

        let (status, _) = send(app, "POST", "/v1/alert/42/snooze", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_history_and_filters() {
        let app = app(MockConfig::default());
        let (status, json) = send(app.clone(), "GET", "/v1/alert/1/evaluationHistory", "").await;
        assert_eq!(status, StatusCode::OK);
        let history = json["data"].as_array().unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history[0]["current_state"], "FIRING");
        assert_eq!(history[1]["current_state"], "NORMAL");

        let (status, _) = send(app.clone(), "GET", "/v1/alert/42/evaluationHistory", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, json) = send(app, "GET", "/v1/alert/filters", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["created_by"][0], "user1@dream11.com");
        assert_eq!(json["data"]["job_ids"], serde_json::json!(["1"]));
        assert_eq!(json["data"]["current_states"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_sdk_config_versions() {
        let app = app(MockConfig::default());
        let (_, json) = send(app.clone(), "GET", "/v1/configs", "").await;
        assert_eq!(json["data"][0]["version"], 5);
        assert_eq!(json["data"][0]["isActive"], true);

        let (status, json) = send(
            app.clone(),
            "POST",
            "/v1/configs",
            r#"{"signals": {"scheduleDurationMs": 2000}, "description": "Faster flush"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["version"], 6);

        let (_, json) = send(app.clone(), "GET", "/v1/configs/active-config", "").await;
        assert_eq!(json["data"]["version"], 6);
        assert_eq!(json["data"]["signals"]["scheduleDurationMs"], 2000);

        let (status, json) = send(app.clone(), "GET", "/v1/configs/2", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["samplingConfig"]["default"]["session_sample_rate"], 0.3);

        let (status, _) = send(app.clone(), "PUT", "/v1/configs", r#"{}"#).await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = send(app.clone(), "GET", "/v1/configs", "").await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);

        let (status, json) = send(app, "GET", "/v1/configs/6", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "CONFIG_NOT_FOUND");
    }
}
