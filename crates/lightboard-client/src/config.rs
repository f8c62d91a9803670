//! Client configuration.

use std::time::Duration;

use lightboard_settings::LightboardSettings;

/// Configuration for [`SnapshotClient`](crate::SnapshotClient) and
/// [`ClientSubscription`](crate::ClientSubscription).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Server base URL, e.g. `http://127.0.0.1:3000`.
    pub base_url: String,
    /// Fixed delay between a dropped stream and the next connect attempt.
    pub retry_delay: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Limit on a one-shot request, and on waiting for the stream's
    /// response headers. The stream body itself has no limit.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            retry_delay: Duration::from_millis(1_500),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url` with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build a client config from loaded settings.
    pub fn from_settings(settings: &LightboardSettings) -> Self {
        Self {
            base_url: settings.client.base_url.clone(),
            retry_delay: settings.client.retry_delay(),
            connect_timeout: settings.client.connect_timeout(),
            request_timeout: settings.client.request_timeout(),
        }
    }

    /// Override the reconnect delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
