//! `LightboardServer`: Axum HTTP + SSE server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::api;
use crate::broadcast::Broadcaster;
use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::store::StateStore;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The active-set store.
    pub store: Arc<StateStore>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Idle period before a stream heartbeat.
    pub heartbeat_interval: Duration,
    /// Prometheus handle for `/metrics`.
    pub metrics: PrometheusHandle,
}

/// The Lightboard server.
pub struct LightboardServer {
    config: ServerConfig,
    store: Arc<StateStore>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl LightboardServer {
    /// Create a server with a fresh store capped at `config.max_subscribers`.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let store = StateStore::with_broadcaster(Broadcaster::with_limit(config.max_subscribers));
        Self::with_store(config, Arc::new(store), metrics)
    }

    /// Create a server around an existing store.
    pub fn with_store(
        config: ServerConfig,
        store: Arc<StateStore>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            store: self.store.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            heartbeat_interval: self.config.heartbeat_interval,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route(
                "/api/active-buttons",
                get(api::get_active).post(api::replace_active),
            )
            .route("/api/active-buttons/stream", get(api::stream_active))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve in a background task.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task,
    /// which finishes once shutdown is signalled and open connections drain.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, max_subscribers = self.config.max_subscribers, "lightboard server started");

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            match result {
                Ok(()) => info!("lightboard server stopped"),
                Err(e) => warn!(error = %e, "lightboard server exited with error"),
            }
        });

        Ok((addr, handle))
    }

    /// The active-set store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let resp = health::health_check(
        state.start_time,
        state.store.subscriber_count(),
        state.store.get().len(),
    );
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(&state.metrics),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
