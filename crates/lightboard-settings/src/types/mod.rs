//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: missing fields
//! get their default during deserialization, so partial JSON files are fine.

mod network;

pub use network::*;

use lightboard_core::logging::LogFormat;
use serde::{Deserialize, Serialize};

/// Lower bound for any timer-backed interval, in milliseconds.
pub const MIN_INTERVAL_MS: u64 = 100;

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "port": 8080 },
///   "stream": { "heartbeatIntervalMs": 10000 },
///   "logging": { "level": "debug", "format": "json" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LightboardSettings {
    /// Settings schema version.
    pub version: String,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Push-stream settings.
    pub stream: StreamSettings,
    /// Subscriber client settings.
    pub client: ClientSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for LightboardSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            server: ServerSettings::default(),
            stream: StreamSettings::default(),
            client: ClientSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl LightboardSettings {
    /// Correct out-of-range values.
    ///
    /// Called automatically during loading. Values are clamped with a warning
    /// rather than rejected.
    pub fn validate(&mut self) {
        fn clamp_interval(val: &mut u64, name: &str) {
            if *val < MIN_INTERVAL_MS {
                tracing::warn!("{name} too small ({val}ms), clamped to {MIN_INTERVAL_MS}ms");
                *val = MIN_INTERVAL_MS;
            }
        }

        clamp_interval(&mut self.stream.heartbeat_interval_ms, "heartbeat_interval_ms");
        clamp_interval(&mut self.client.retry_delay_ms, "retry_delay_ms");
        clamp_interval(&mut self.client.connect_timeout_ms, "connect_timeout_ms");
        clamp_interval(&mut self.client.request_timeout_ms, "request_timeout_ms");

        if self.server.max_subscribers == 0 {
            tracing::warn!("max_subscribers must be at least 1, correcting");
            self.server.max_subscribers = 1;
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `tracing` filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serde_roundtrip() {
        let defaults = LightboardSettings::default();
        let json = serde_json::to_string(&defaults).unwrap();
        let back: LightboardSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.version, defaults.version);
        assert_eq!(back.server.port, defaults.server.port);
        assert_eq!(
            back.stream.heartbeat_interval_ms,
            defaults.stream.heartbeat_interval_ms
        );
        assert_eq!(back.logging.format, defaults.logging.format);
    }

    #[test]
    fn default_settings_json_field_names() {
        let json = serde_json::to_value(LightboardSettings::default()).unwrap();
        assert!(json["server"].get("maxSubscribers").is_some());
        assert!(json["server"].get("shutdownTimeoutMs").is_some());
        assert!(json["stream"].get("heartbeatIntervalMs").is_some());
        assert!(json["client"].get("retryDelayMs").is_some());
        assert!(json["client"].get("baseUrl").is_some());
        assert_eq!(json["logging"]["format"], "compact");
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: LightboardSettings =
            serde_json::from_str(r#"{"server": {"port": 9000}}"#).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.client.retry_delay_ms, 1_500);
    }

    #[test]
    fn validate_clamps_tiny_intervals() {
        let mut settings = LightboardSettings::default();
        settings.stream.heartbeat_interval_ms = 0;
        settings.client.retry_delay_ms = 5;
        settings.client.connect_timeout_ms = 1;
        settings.client.request_timeout_ms = 0;
        settings.validate();
        assert_eq!(settings.stream.heartbeat_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(settings.client.retry_delay_ms, MIN_INTERVAL_MS);
        assert_eq!(settings.client.connect_timeout_ms, MIN_INTERVAL_MS);
        assert_eq!(settings.client.request_timeout_ms, MIN_INTERVAL_MS);
    }

    #[test]
    fn validate_corrects_zero_subscribers() {
        let mut settings = LightboardSettings::default();
        settings.server.max_subscribers = 0;
        settings.validate();
        assert_eq!(settings.server.max_subscribers, 1);
    }

    #[test]
    fn validate_keeps_valid_values() {
        let mut settings = LightboardSettings::default();
        settings.validate();
        assert_eq!(settings.stream.heartbeat_interval_ms, 15_000);
        assert_eq!(settings.client.retry_delay_ms, 1_500);
        assert_eq!(settings.server.max_subscribers, 100);
    }
}
