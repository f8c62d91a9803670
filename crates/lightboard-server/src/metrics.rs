//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Successful active-set replacements (counter).
pub const ACTIVE_SET_REPLACEMENTS_TOTAL: &str = "active_set_replacements_total";
/// Size of the current active set (gauge).
pub const ACTIVE_SET_SIZE: &str = "active_set_size";
/// Stream connections opened (counter).
pub const STREAM_CONNECTIONS_TOTAL: &str = "stream_connections_total";
/// Open stream connections (gauge).
pub const STREAM_CONNECTIONS_ACTIVE: &str = "stream_connections_active";
/// Stream connection lifetime in seconds (histogram).
pub const STREAM_CONNECTION_DURATION_SECONDS: &str = "stream_connection_duration_seconds";
/// Heartbeat comments written (counter).
pub const STREAM_HEARTBEATS_TOTAL: &str = "stream_heartbeats_total";
/// Snapshot messages written (counter).
pub const STREAM_MESSAGES_TOTAL: &str = "stream_messages_total";
/// Subscriber callbacks that panicked during publish (counter).
pub const BROADCAST_CALLBACK_PANICS_TOTAL: &str = "broadcast_callback_panics_total";
/// Registrations refused by the subscriber cap (counter).
pub const BROADCAST_REGISTRATIONS_REJECTED_TOTAL: &str = "broadcast_registrations_rejected_total";
/// Replace requests rejected as invalid (counter, labels: kind).
pub const API_VALIDATION_ERRORS_TOTAL: &str = "api_validation_errors_total";
