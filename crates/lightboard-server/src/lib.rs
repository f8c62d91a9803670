//! # lightboard-server
//!
//! Single-writer active-set store with live fan-out over Server-Sent Events.
//!
//! - [`store::StateStore`]: holds the current snapshot, replaces and publishes it
//!   in one critical section
//! - [`broadcast::Broadcaster`]: callback registry with idempotent unsubscribe,
//!   panic isolation, and a registration cap
//! - [`stream`]: per-connection `Opening → Streaming → Closed` session that
//!   turns published snapshots and heartbeats into SSE frames
//! - [`api`]: `GET`/`POST /api/active-buttons` and the stream endpoint
//! - [`server::LightboardServer`]: Axum router, `/health`, `/metrics`, and
//!   graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod stream;

pub use broadcast::{Broadcaster, Subscription};
pub use config::ServerConfig;
pub use errors::{ApiError, BroadcastError};
pub use server::LightboardServer;
pub use store::StateStore;
