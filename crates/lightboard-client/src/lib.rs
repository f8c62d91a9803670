//! # lightboard-client
//!
//! Consumer side of the Lightboard push stream.
//!
//! - [`http::SnapshotClient`]: one-shot fetch and replace over HTTP
//! - [`sse`]: line-buffered Server-Sent Events parser
//! - [`subscription::ClientSubscription`]: background task that fetches the
//!   current set once, then follows the stream and reconnects after a fixed
//!   delay whenever it drops
//!
//! ## Crate Position
//!
//! Depends on lightboard-core and lightboard-settings. Used by the
//! `lightboard` binary (`watch`, `get`, `set`).

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod http;
pub mod sse;
pub mod subscription;

pub use config::ClientConfig;
pub use errors::{ClientError, Result};
pub use http::SnapshotClient;
pub use subscription::{ClientSubscription, ConnectionStatus, SubscriptionState};
