//! # lightboard-core
//!
//! Shared vocabulary for the Lightboard crates:
//!
//! - **Snapshot**: [`snapshot::ActiveSetSnapshot`], the canonical (deduplicated,
//!   sorted, timestamped) active-identifier set and its JSON wire shape
//! - **IDs**: [`ids::ConnectionId`], [`ids::ClientId`] as newtypes
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other lightboard crates.

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod snapshot;

pub use snapshot::{ActiveSetSnapshot, now_millis};
