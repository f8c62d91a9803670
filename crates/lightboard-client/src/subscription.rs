//! Auto-reconnecting subscription to the active-set stream.
//!
//! A [`ClientSubscription`] owns one background task that:
//! 1. fetches the current snapshot once (failures are ignored)
//! 2. opens the push stream and applies every valid snapshot message
//! 3. on error or end of stream, waits a fixed delay and reconnects, forever
//!
//! Steps 1 and 2 start together; a slow or hung fetch never holds back the
//! stream, and a fetch answer older than what the stream already delivered
//! is dropped. The stream loop itself is strictly sequential, so there is
//! never more than one open connection or one pending reconnect timer.
//! Teardown cancels whatever is in flight and nothing is scheduled
//! afterwards.
//!
//! Observers read [`SubscriptionState`] through a `tokio::sync::watch`
//! channel; [`ConnectionStatus`] is the stale/loading indicator.

use std::pin::pin;
use std::time::Duration;

use futures::StreamExt;
use lightboard_core::ActiveSetSnapshot;
use lightboard_core::ids::ClientId;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::http::SnapshotClient;
use crate::sse::{SseEvent, parse_sse};

/// Connection state of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// First connect attempt in progress.
    Connecting,
    /// Stream is open.
    Live,
    /// Stream dropped; waiting out the retry delay or reconnecting.
    Reconnecting,
    /// Torn down. Terminal.
    Closed,
}

/// Everything an observer can see about a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionState {
    /// Latest known snapshot, `None` until the first one arrives.
    pub snapshot: Option<ActiveSetSnapshot>,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Successful stream connections so far.
    pub connects: u64,
    /// Heartbeat comments received so far.
    pub heartbeats: u64,
}

impl SubscriptionState {
    fn new() -> Self {
        Self {
            snapshot: None,
            status: ConnectionStatus::Connecting,
            connects: 0,
            heartbeats: 0,
        }
    }

    /// Active identifiers of the latest snapshot (empty before the first one).
    pub fn active_ids(&self) -> &[String] {
        match &self.snapshot {
            Some(snapshot) => snapshot.active_ids(),
            None => &[],
        }
    }
}

/// Handle to a running subscription. Dropping it stops the task.
pub struct ClientSubscription {
    id: ClientId,
    state: watch::Receiver<SubscriptionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ClientSubscription {
    /// Spawn the subscription task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(client: SnapshotClient, retry_delay: Duration) -> Self {
        let id = ClientId::new();
        let (tx, state) = watch::channel(SubscriptionState::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            id.clone(),
            client,
            retry_delay,
            tx,
            cancel.clone(),
        ));

        Self {
            id,
            state,
            cancel,
            task: Some(task),
        }
    }

    /// Subscription id (appears in log fields).
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Copy of the current state.
    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    /// Active identifiers of the latest snapshot (empty before the first one).
    pub fn active_ids(&self) -> Vec<String> {
        self.state.borrow().active_ids().to_vec()
    }

    /// A receiver for observing state changes independently of this handle.
    pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
        self.state.clone()
    }

    /// Wait until the state changes. Returns `false` once the task has ended.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until `predicate` holds for the state, returning that state.
    ///
    /// Returns `None` if the task ends first without satisfying it.
    pub async fn wait_for<F>(&mut self, mut predicate: F) -> Option<SubscriptionState>
    where
        F: FnMut(&SubscriptionState) -> bool,
    {
        self.state
            .wait_for(|s| predicate(s))
            .await
            .ok()
            .map(|state| SubscriptionState::clone(&state))
    }

    /// Stop the subscription and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(client_id = %self.id, error = %e, "subscription task failed");
            }
        }
    }
}

impl Drop for ClientSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Apply a snapshot read from the stream. Stream order is authoritative.
fn apply_streamed(tx: &watch::Sender<SubscriptionState>, snapshot: ActiveSetSnapshot) {
    let _ = tx.send_if_modified(|state| {
        if state.snapshot.as_ref() == Some(&snapshot) {
            return false;
        }
        state.snapshot = Some(snapshot);
        true
    });
}

/// Apply the one-shot fetch result unless the stream already delivered
/// something newer.
fn apply_fetched(tx: &watch::Sender<SubscriptionState>, snapshot: ActiveSetSnapshot) {
    let _ = tx.send_if_modified(|state| {
        if state
            .snapshot
            .as_ref()
            .is_some_and(|current| current.updated_at() >= snapshot.updated_at())
        {
            return false;
        }
        state.snapshot = Some(snapshot);
        true
    });
}

fn set_status(tx: &watch::Sender<SubscriptionState>, status: ConnectionStatus) {
    let _ = tx.send_if_modified(|state| {
        if state.status == status {
            return false;
        }
        state.status = status;
        true
    });
}

async fn run(
    id: ClientId,
    client: SnapshotClient,
    retry_delay: Duration,
    tx: watch::Sender<SubscriptionState>,
    cancel: CancellationToken,
) {
    info!(client_id = %id, base_url = client.base_url(), "subscription started");

    let ((), ()) = tokio::join!(
        initial_fetch(&id, &client, &tx, &cancel),
        stream_loop(&id, &client, retry_delay, &tx, &cancel),
    );

    set_status(&tx, ConnectionStatus::Closed);
    info!(client_id = %id, "subscription closed");
}

/// One-shot fetch of the current snapshot, racing the first stream connect.
async fn initial_fetch(
    id: &ClientId,
    client: &SnapshotClient,
    tx: &watch::Sender<SubscriptionState>,
    cancel: &CancellationToken,
) {
    tokio::select! {
        () = cancel.cancelled() => {}
        fetched = client.fetch() => match fetched {
            Ok(snapshot) => apply_fetched(tx, snapshot),
            Err(e) => debug!(client_id = %id, error = %e, "initial fetch failed, relying on stream"),
        },
    }
}

async fn stream_loop(
    id: &ClientId,
    client: &SnapshotClient,
    retry_delay: Duration,
    tx: &watch::Sender<SubscriptionState>,
    cancel: &CancellationToken,
) {
    let mut attempt: u64 = 0;
    while !cancel.is_cancelled() {
        attempt += 1;
        let opened = tokio::select! {
            () = cancel.cancelled() => break,
            opened = client.open_stream() => opened,
        };

        match opened {
            Ok(resp) => {
                tx.send_modify(|state| {
                    state.status = ConnectionStatus::Live;
                    state.connects += 1;
                });
                info!(client_id = %id, attempt, "stream connected");

                let mut events = pin!(parse_sse(resp.bytes_stream()));
                loop {
                    let event = tokio::select! {
                        () = cancel.cancelled() => None,
                        event = events.next() => event,
                    };
                    match event {
                        Some(SseEvent::Data(payload)) => {
                            match serde_json::from_str::<ActiveSetSnapshot>(&payload) {
                                Ok(snapshot) => apply_streamed(tx, snapshot),
                                Err(e) => {
                                    debug!(client_id = %id, error = %e, "discarding malformed message");
                                }
                            }
                        }
                        Some(SseEvent::Comment(text)) => {
                            trace!(client_id = %id, comment = %text, "stream comment");
                            tx.send_modify(|state| state.heartbeats += 1);
                        }
                        None => break,
                    }
                }
                if cancel.is_cancelled() {
                    break;
                }
                info!(client_id = %id, "stream ended, reconnecting");
            }
            Err(e) => {
                warn!(client_id = %id, attempt, error = %e, "stream connect failed");
            }
        }

        set_status(tx, ConnectionStatus::Reconnecting);
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(retry_delay) => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
