//! Server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the [`Broadcaster`](crate::broadcast::Broadcaster).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BroadcastError {
    /// The registry already holds the configured maximum number of callbacks.
    #[error("subscriber limit reached ({limit} registrations)")]
    RegistrationLimit {
        /// The configured maximum.
        limit: usize,
    },
}

/// Errors returned by HTTP handlers, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body is not JSON at all.
    #[error("Invalid JSON payload.")]
    InvalidJson,
    /// Request body is JSON but does not match the expected shape.
    #[error("{0}")]
    Validation(String),
    /// The server cannot take another stream subscriber right now.
    #[error("{0}")]
    Unavailable(#[from] BroadcastError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
