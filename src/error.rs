//! Service error types
//!
//! Only [`ServiceError::InvalidArgument`] ever reaches an HTTP caller from a
//! lookup. Render and gate failures are folded into a degraded
//! `LookupResult` by the orchestrator instead of being returned.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;

/// Service-wide result type
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// No usable search term was supplied
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration rejected while building the service
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Catalog API client could not be built
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            ServiceError::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_argument", msg.clone())
            }
            ServiceError::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "config_error",
                    "Service misconfigured".to_string(),
                )
            }
            ServiceError::HttpClient(e) => {
                tracing::error!("HTTP client error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "http_client_error",
                    "Service misconfigured".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}
