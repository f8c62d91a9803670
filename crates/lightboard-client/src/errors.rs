//! Client error types.

use std::time::Duration;

use thiserror::Error;

/// Errors from HTTP calls to a Lightboard server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, broken body).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// `error` field of the response body, or the raw body.
        message: String,
    },
    /// The server did not send response headers in time.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The response body was not a valid snapshot.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
