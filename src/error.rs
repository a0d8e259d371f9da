//! Error types for the host
//!
//! Request-scoped variants render as JSON error responses; startup-scoped
//! variants propagate to `main` and stop the process before it serves.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Main error type for host operations
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Context key already set: {0}")]
    DuplicateContextKey(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Module '{module}' failed to start: {source}")]
    ModuleStartupFailure {
        module: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Wrap a hook error with the name of the module that raised it
    pub fn module(module: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::ModuleStartupFailure {
            module: module.into(),
            source: source.into(),
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailure(_) => StatusCode::UNAUTHORIZED,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ConfigurationMissing(_)
            | Self::DuplicateContextKey(_)
            | Self::SigningFailure(_)
            | Self::ModuleStartupFailure { .. }
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the logs
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut response = (status, Json(json!({ "error": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}

/// Result type alias for host operations
pub type Result<T> = std::result::Result<T, HostError>;
