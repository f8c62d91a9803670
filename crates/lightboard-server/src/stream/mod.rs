//! Server-Sent Events push stream.
//!
//! One [`session::StreamSession`] per HTTP connection. The session owns its
//! subscription, heartbeat timer, and a latest-value slot fed by the
//! broadcaster; the HTTP body pulls [`frame::Frame`]s out of it until the
//! client goes away or the server shuts down.

pub mod frame;
pub mod heartbeat;
pub mod session;

pub use frame::Frame;
pub use heartbeat::Heartbeat;
pub use session::{CloseReason, SessionState, StreamSession};
