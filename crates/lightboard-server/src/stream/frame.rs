//! SSE wire frames.

use std::sync::Arc;

use bytes::Bytes;
use lightboard_core::ActiveSetSnapshot;

/// Content type of the stream response.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Heartbeat comment, ignored by conforming SSE parsers.
pub const HEARTBEAT: &[u8] = b": heartbeat\n\n";

/// One message on the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A full snapshot (`data: {json}`).
    Snapshot(Arc<ActiveSetSnapshot>),
    /// Keep-alive comment.
    Heartbeat,
}

impl Frame {
    /// Encode to bytes ready for the response body.
    ///
    /// Each frame is self-contained and ends with a blank line.
    pub fn encode(&self) -> serde_json::Result<Bytes> {
        match self {
            Self::Snapshot(snapshot) => {
                let json = snapshot.to_json()?;
                Ok(Bytes::from(format!("data: {json}\n\n")))
            }
            Self::Heartbeat => Ok(Bytes::from_static(HEARTBEAT)),
        }
    }
}
