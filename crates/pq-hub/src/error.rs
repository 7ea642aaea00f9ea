//! # API Errors
//!
//! Every failure leaves the hub as `{"data": null, "error": {code, message, cause}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pq_core::QueryError;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Request body is required")]
    MissingBody,

    #[error("Invalid query request")]
    InvalidQuery(#[from] QueryError),

    #[error("Invalid request body")]
    InvalidBody(#[source] serde_json::Error),

    #[error("Interaction already exists")]
    InteractionExists(String),

    #[error("Interaction not found")]
    InteractionNotFound(String),

    #[error("Alert not found")]
    AlertNotFound(u64),

    #[error("Configuration version not found")]
    ConfigVersionNotFound(u64),

    #[error("Simulated mock server error")]
    Simulated,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub cause: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingBody
            | ApiError::InvalidQuery(_)
            | ApiError::InvalidBody(_)
            | ApiError::InteractionExists(_) => StatusCode::BAD_REQUEST,
            ApiError::InteractionNotFound(_)
            | ApiError::AlertNotFound(_)
            | ApiError::ConfigVersionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Simulated => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingBody | ApiError::InvalidQuery(_) | ApiError::InvalidBody(_) => {
                "BAD_REQUEST"
            }
            ApiError::InteractionExists(_) => "INTERACTION_EXISTS",
            ApiError::InteractionNotFound(_) => "INTERACTION_NOT_FOUND",
            ApiError::AlertNotFound(_) => "ALERT_NOT_FOUND",
            ApiError::ConfigVersionNotFound(_) => "CONFIG_NOT_FOUND",
            ApiError::Simulated => "MOCK_ERROR",
        }
    }

    pub fn cause(&self) -> String {
        match self {
            ApiError::MissingBody => "Missing request body".into(),
            ApiError::InvalidQuery(e) => e.to_string(),
            ApiError::InvalidBody(e) => e.to_string(),
            ApiError::InteractionExists(name) => {
                format!("Interaction with name '{}' already exists", name)
            }
            ApiError::InteractionNotFound(name) => format!("Interaction '{}' not found", name),
            ApiError::AlertNotFound(id) => format!("Invalid alert ID {}", id),
            ApiError::ConfigVersionNotFound(version) => {
                format!("No configuration with version {}", version)
            }
            ApiError::Simulated => "Random error simulation".into(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            cause: self.cause(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self.code(), self.cause());
        } else {
            tracing::debug!("{}: {}", self.code(), self.cause());
        }
        (status, Json(json!({ "data": null, "error": self.body() }))).into_response()
    }
}
