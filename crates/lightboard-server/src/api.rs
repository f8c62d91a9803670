//! HTTP handlers for the active set.
//!
//! | Route | Method | Purpose |
//! |-------|--------|---------|
//! | `/api/active-buttons` | GET | current snapshot |
//! | `/api/active-buttons` | POST | replace the whole set |
//! | `/api/active-buttons/stream` | GET | SSE push stream |

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use lightboard_core::ActiveSetSnapshot;
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::errors::ApiError;
use crate::metrics::API_VALIDATION_ERRORS_TOTAL;
use crate::server::AppState;
use crate::stream::StreamSession;
use crate::stream::frame::CONTENT_TYPE;

/// Body of a replace request.
///
/// `activeButtonIds` is accepted as an alias of `activeIds`. Any other field
/// is a validation error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReplaceRequest {
    /// The complete new set.
    #[serde(alias = "activeButtonIds")]
    pub active_ids: Vec<String>,
}

impl ReplaceRequest {
    /// Parse a raw request body.
    ///
    /// Not JSON at all is [`ApiError::InvalidJson`]; JSON of the wrong shape
    /// is [`ApiError::Validation`].
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            counter!(API_VALIDATION_ERRORS_TOTAL, "kind" => "json").increment(1);
            debug!(error = %e, "replace body is not JSON");
            ApiError::InvalidJson
        })?;
        serde_json::from_value(value).map_err(|e| {
            counter!(API_VALIDATION_ERRORS_TOTAL, "kind" => "schema").increment(1);
            debug!(error = %e, "replace body failed validation");
            ApiError::Validation(e.to_string())
        })
    }
}

/// GET /api/active-buttons
pub async fn get_active(State(state): State<AppState>) -> Response {
    let snapshot = ActiveSetSnapshot::clone(&state.store.get());
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(snapshot),
    )
        .into_response()
}

/// POST /api/active-buttons
#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn replace_active(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ActiveSetSnapshot>, ApiError> {
    let request = ReplaceRequest::parse(&body)?;
    let installed = state.store.replace(request.active_ids);
    Ok(Json(ActiveSetSnapshot::clone(&installed)))
}

/// GET /api/active-buttons/stream
#[instrument(skip_all)]
pub async fn stream_active(State(state): State<AppState>) -> Result<Response, ApiError> {
    let session = StreamSession::open(
        &state.store,
        state.heartbeat_interval,
        state.shutdown.token(),
    )
    .map_err(|e| {
        warn!(error = %e, "refusing stream connection");
        ApiError::from(e)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE)),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-transform"),
            ),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        session.into_body(),
    )
        .into_response())
}
