//! The single current active set.
//!
//! [`StateStore`] owns exactly one [`ActiveSetSnapshot`] and the
//! [`Broadcaster`] that announces replacements. It is an ordinary value: the
//! server constructs one and shares it through `Arc`, and tests build their
//! own isolated instances.
//!
//! Writers serialize on a publish lock so installing a snapshot and
//! delivering it happen as one step: two concurrent `replace` calls can never
//! deliver out of order, and installed timestamps never go backwards. Readers
//! only take the snapshot lock long enough to clone an `Arc`.

use std::sync::Arc;

use lightboard_core::{ActiveSetSnapshot, now_millis};
use metrics::{counter, gauge};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::broadcast::{Broadcaster, Subscription};
use crate::errors::BroadcastError;
use crate::metrics::{ACTIVE_SET_REPLACEMENTS_TOTAL, ACTIVE_SET_SIZE};

/// Holder of the current active-set snapshot.
pub struct StateStore {
    current: RwLock<Arc<ActiveSetSnapshot>>,
    publish_lock: Mutex<()>,
    broadcaster: Broadcaster,
}

impl StateStore {
    /// Create a store with an empty set and an unlimited broadcaster.
    pub fn new() -> Self {
        Self::with_broadcaster(Broadcaster::new())
    }

    /// Create a store with an empty set, publishing through `broadcaster`.
    pub fn with_broadcaster(broadcaster: Broadcaster) -> Self {
        gauge!(ACTIVE_SET_SIZE).set(0.0);
        Self {
            current: RwLock::new(Arc::new(ActiveSetSnapshot::empty(now_millis()))),
            publish_lock: Mutex::new(()),
            broadcaster,
        }
    }

    /// The current snapshot. Never blocks on publishers and never fails.
    pub fn get(&self) -> Arc<ActiveSetSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Replace the whole set with `ids` and publish it.
    ///
    /// Input is deduplicated and sorted; any sequence (including empty) is
    /// accepted. Subscribers have been handed the new snapshot by the time
    /// this returns.
    ///
    /// Callbacks run while the publish lock is held, so they must not call
    /// `replace` themselves.
    pub fn replace<I, S>(&self, ids: I) -> Arc<ActiveSetSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _publishing = self.publish_lock.lock();

        let previous = self.current.read().updated_at();
        let snapshot = Arc::new(ActiveSetSnapshot::new(ids, now_millis().max(previous)));
        *self.current.write() = Arc::clone(&snapshot);

        counter!(ACTIVE_SET_REPLACEMENTS_TOTAL).increment(1);
        #[allow(clippy::cast_precision_loss)]
        gauge!(ACTIVE_SET_SIZE).set(snapshot.len() as f64);
        info!(
            active_count = snapshot.len(),
            updated_at = snapshot.updated_at(),
            "active set replaced"
        );

        let delivered = self.broadcaster.publish(&snapshot);
        debug!(delivered, "replacement delivered");
        snapshot
    }

    /// Register for future snapshots and read the current one atomically.
    ///
    /// No replacement can land between the read and the registration, so the
    /// caller sees the returned snapshot followed by every later one, with no
    /// gap and no duplicate.
    pub fn subscribe_with_current<F>(
        &self,
        callback: F,
    ) -> Result<(Subscription, Arc<ActiveSetSnapshot>), BroadcastError>
    where
        F: Fn(&Arc<ActiveSetSnapshot>) + Send + Sync + 'static,
    {
        let _publishing = self.publish_lock.lock();
        let subscription = self.broadcaster.subscribe(callback)?;
        Ok((subscription, self.get()))
    }

    /// Register for future snapshots only.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, BroadcastError>
    where
        F: Fn(&Arc<ActiveSetSnapshot>) + Send + Sync + 'static,
    {
        self.broadcaster.subscribe(callback)
    }

    /// The broadcaster used for fan-out.
    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Number of live subscriber registrations.
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
