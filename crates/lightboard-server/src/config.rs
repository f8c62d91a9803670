//! Server configuration.

use std::time::Duration;

use lightboard_settings::LightboardSettings;

/// Configuration for the Lightboard server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent stream subscribers.
    pub max_subscribers: usize,
    /// Idle time on a stream before a heartbeat comment is written.
    pub heartbeat_interval: Duration,
    /// How long graceful shutdown waits for in-flight connections.
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_subscribers: 100,
            heartbeat_interval: Duration::from_secs(15),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Build a server config from loaded settings.
    pub fn from_settings(settings: &LightboardSettings) -> Self {
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            max_subscribers: settings.server.max_subscribers,
            heartbeat_interval: settings.stream.heartbeat_interval(),
            shutdown_timeout: settings.server.shutdown_timeout(),
        }
    }

    /// `host:port` bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
