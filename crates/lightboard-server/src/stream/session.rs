//! Per-connection stream session.
//!
//! ```text
//! Opening ──first frame──▶ Streaming ──▶ Closed
//!    │                                     ▲
//!    └──────────── any exit ───────────────┘
//! ```
//!
//! **Opening**: the session has registered with the store and holds the
//! snapshot that was current at registration time; it is written first.
//!
//! **Streaming**: every published snapshot lands in a latest-value slot
//! (`tokio::sync::watch`), so a slow reader never blocks the publisher and
//! only ever sees the newest set. The heartbeat fires after each idle period
//! without a data frame.
//!
//! **Closed**: reached on server shutdown, local close, or when the HTTP body
//! is dropped because the peer went away or a write failed. Teardown runs
//! exactly once no matter how many of those race.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use bytes::Bytes;
use lightboard_core::ActiveSetSnapshot;
use lightboard_core::ids::ConnectionId;
use metrics::{counter, gauge, histogram};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::frame::Frame;
use super::heartbeat::Heartbeat;
use crate::broadcast::Subscription;
use crate::errors::BroadcastError;
use crate::metrics::{
    STREAM_CONNECTION_DURATION_SECONDS, STREAM_CONNECTIONS_ACTIVE, STREAM_CONNECTIONS_TOTAL,
    STREAM_HEARTBEATS_TOTAL, STREAM_MESSAGES_TOTAL,
};
use crate::store::StateStore;

/// Lifecycle state of a [`StreamSession`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered; the initial snapshot has not been written yet.
    Opening,
    /// Forwarding snapshots and heartbeats.
    Streaming,
    /// Torn down. No further frames.
    Closed,
}

/// Why a session closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The response body was dropped (peer disconnect or write failure).
    ClientGone,
    /// The server's shutdown token fired.
    Shutdown,
    /// [`StreamSession::close`] was called.
    Local,
    /// The store's broadcaster went away.
    StoreGone,
}

enum Wake {
    Cancelled,
    Updated(bool),
    Heartbeat,
}

/// One subscriber connection on the push stream.
#[derive(Debug)]
pub struct StreamSession {
    id: ConnectionId,
    state: SessionState,
    initial: Option<Arc<ActiveSetSnapshot>>,
    updates: watch::Receiver<Option<Arc<ActiveSetSnapshot>>>,
    subscription: Option<Subscription>,
    heartbeat: Heartbeat,
    cancel: CancellationToken,
    opened_at: Instant,
    messages: u64,
    heartbeats: u64,
}

impl StreamSession {
    /// Register with `store` and capture its current snapshot.
    ///
    /// Fails if the store's subscriber cap is reached; nothing is left
    /// registered in that case.
    pub fn open(
        store: &StateStore,
        heartbeat_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, BroadcastError> {
        let (tx, updates) = watch::channel(None);
        let (subscription, current) = store.subscribe_with_current(move |snapshot| {
            let _ = tx.send_replace(Some(Arc::clone(snapshot)));
        })?;

        let id = ConnectionId::new();
        counter!(STREAM_CONNECTIONS_TOTAL).increment(1);
        gauge!(STREAM_CONNECTIONS_ACTIVE).increment(1.0);
        info!(
            conn_id = %id,
            sub_id = subscription.id(),
            subscribers = store.subscriber_count(),
            "stream opened"
        );

        Ok(Self {
            id,
            state: SessionState::Opening,
            initial: Some(current),
            updates,
            subscription: Some(subscription),
            heartbeat: Heartbeat::new(heartbeat_interval),
            cancel,
            opened_at: Instant::now(),
            messages: 0,
            heartbeats: 0,
        })
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Wait for the next frame to write. `None` once the session is closed.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                SessionState::Closed => return None,
                SessionState::Opening => {
                    self.state = SessionState::Streaming;
                    if let Some(snapshot) = self.initial.take() {
                        return Some(self.emit(snapshot));
                    }
                }
                SessionState::Streaming => {}
            }

            let wake = tokio::select! {
                biased;
                () = self.cancel.cancelled() => Wake::Cancelled,
                changed = self.updates.changed() => Wake::Updated(changed.is_ok()),
                () = self.heartbeat.tick() => Wake::Heartbeat,
            };

            match wake {
                Wake::Cancelled => self.teardown(CloseReason::Shutdown),
                Wake::Updated(false) => self.teardown(CloseReason::StoreGone),
                Wake::Updated(true) => {
                    let latest = self.updates.borrow_and_update().clone();
                    if let Some(snapshot) = latest {
                        return Some(self.emit(snapshot));
                    }
                }
                Wake::Heartbeat => {
                    self.heartbeats += 1;
                    counter!(STREAM_HEARTBEATS_TOTAL).increment(1);
                    debug!(conn_id = %self.id, "heartbeat");
                    return Some(Frame::Heartbeat);
                }
            }
        }
    }

    /// Close the session from the server side.
    pub fn close(&mut self) {
        self.teardown(CloseReason::Local);
    }

    /// Turn the session into a streaming response body.
    ///
    /// Dropping the body (client disconnect, failed write) drops the session,
    /// which runs teardown.
    pub fn into_body(self) -> Body {
        let frames = futures::stream::unfold(self, |mut session| async move {
            loop {
                let frame = session.next_frame().await?;
                match frame.encode() {
                    Ok(bytes) => return Some((Ok::<Bytes, Infallible>(bytes), session)),
                    Err(e) => {
                        warn!(conn_id = %session.id, error = %e, "failed to encode frame, skipping");
                    }
                }
            }
        });
        Body::from_stream(frames)
    }

    fn emit(&mut self, snapshot: Arc<ActiveSetSnapshot>) -> Frame {
        self.heartbeat.reset();
        self.messages += 1;
        counter!(STREAM_MESSAGES_TOTAL).increment(1);
        debug!(conn_id = %self.id, active_count = snapshot.len(), "snapshot frame");
        Frame::Snapshot(snapshot)
    }

    fn teardown(&mut self, reason: CloseReason) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.initial = None;
        if let Some(subscription) = self.subscription.take() {
            let _ = subscription.unsubscribe();
        }

        let lifetime = self.opened_at.elapsed();
        gauge!(STREAM_CONNECTIONS_ACTIVE).decrement(1.0);
        histogram!(STREAM_CONNECTION_DURATION_SECONDS).record(lifetime.as_secs_f64());
        info!(
            conn_id = %self.id,
            ?reason,
            messages = self.messages,
            heartbeats = self.heartbeats,
            duration_ms = u64::try_from(lifetime.as_millis()).unwrap_or(u64::MAX),
            "stream closed"
        );
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.teardown(CloseReason::ClientGone);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
