//! One-shot HTTP calls against a Lightboard server.

use std::time::Duration;

use lightboard_core::ActiveSetSnapshot;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, Response};
use serde_json::json;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};

const SNAPSHOT_PATH: &str = "/api/active-buttons";
const STREAM_PATH: &str = "/api/active-buttons/stream";

/// Thin typed wrapper over `reqwest` for the active-set endpoints.
#[derive(Clone, Debug)]
pub struct SnapshotClient {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl SnapshotClient {
    /// Build a client from config.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
        })
    }

    /// Server base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the current snapshot, bypassing caches.
    pub async fn fetch(&self) -> Result<ActiveSetSnapshot> {
        let resp = self
            .http
            .get(self.url(SNAPSHOT_PATH))
            .header(CACHE_CONTROL, "no-store")
            .timeout(self.request_timeout)
            .send()
            .await?;
        let snapshot = decode(resp).await?;
        debug!(active_count = snapshot.len(), "fetched snapshot");
        Ok(snapshot)
    }

    /// Replace the whole set on the server. Returns the installed snapshot.
    pub async fn replace<I, S>(&self, ids: I) -> Result<ActiveSetSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        let resp = self
            .http
            .post(self.url(SNAPSHOT_PATH))
            .json(&json!({ "activeIds": ids }))
            .timeout(self.request_timeout)
            .send()
            .await?;
        decode(resp).await
    }

    /// Open the push stream. The response body is the raw event stream.
    ///
    /// Only the wait for response headers is bounded by the request
    /// timeout; the body stays open for as long as the server streams.
    pub async fn open_stream(&self) -> Result<Response> {
        let request = self
            .http
            .get(self.url(STREAM_PATH))
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send();
        let resp = tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ClientError::Timeout(self.request_timeout))??;
        ensure_success(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode(resp: Response) -> Result<ActiveSetSnapshot> {
    let bytes = ensure_success(resp).await?.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
