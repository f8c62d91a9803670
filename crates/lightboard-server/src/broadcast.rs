//! Snapshot fan-out to registered callbacks.
//!
//! Every registration gets a generated id mapped to its callback. The returned
//! [`Subscription`] is the only way to remove it, and removal is idempotent:
//! calling [`Subscription::unsubscribe`] twice, or dropping the handle after an
//! explicit unsubscribe, is a no-op.
//!
//! [`Broadcaster::publish`] copies the callback list out of the lock before
//! invoking anything, so callbacks may subscribe or unsubscribe without
//! deadlocking. A panicking callback is caught, counted, and logged; delivery
//! to the remaining callbacks continues and the publisher never sees it.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use lightboard_core::ActiveSetSnapshot;
use metrics::counter;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::BroadcastError;
use crate::metrics::{BROADCAST_CALLBACK_PANICS_TOTAL, BROADCAST_REGISTRATIONS_REJECTED_TOTAL};

type Callback = Arc<dyn Fn(&Arc<ActiveSetSnapshot>) + Send + Sync>;

struct Registry {
    callbacks: Mutex<HashMap<u64, Callback>>,
    next_id: AtomicU64,
    max_registrations: Option<usize>,
}

impl Registry {
    fn remove(&self, id: u64) -> bool {
        self.callbacks.lock().remove(&id).is_some()
    }
}

/// Registry of snapshot callbacks.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Registry>,
}

impl Broadcaster {
    /// Create a broadcaster with no registration limit.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a broadcaster that refuses registrations past `max`.
    pub fn with_limit(max: usize) -> Self {
        Self::build(Some(max))
    }

    fn build(max_registrations: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Registry {
                callbacks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                max_registrations,
            }),
        }
    }

    /// Register `callback` for every future published snapshot.
    ///
    /// Fails fast with [`BroadcastError::RegistrationLimit`] when the
    /// registry is full.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, BroadcastError>
    where
        F: Fn(&Arc<ActiveSetSnapshot>) + Send + Sync + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if let Some(limit) = self.inner.max_registrations {
            if callbacks.len() >= limit {
                counter!(BROADCAST_REGISTRATIONS_REJECTED_TOTAL).increment(1);
                warn!(limit, "subscriber registration rejected");
                return Err(BroadcastError::RegistrationLimit { limit });
            }
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = callbacks.insert(id, Arc::new(callback));
        debug!(sub_id = id, subscribers = callbacks.len(), "subscriber registered");
        drop(callbacks);

        Ok(Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
            active: AtomicBool::new(true),
        })
    }

    /// Deliver `snapshot` to every registered callback.
    ///
    /// Order of delivery is unspecified. Returns the number of callbacks that
    /// completed without panicking.
    pub fn publish(&self, snapshot: &Arc<ActiveSetSnapshot>) -> usize {
        let targets: Vec<(u64, Callback)> = self
            .inner
            .callbacks
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in targets {
            if catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_ok() {
                delivered += 1;
            } else {
                counter!(BROADCAST_CALLBACK_PANICS_TOTAL).increment(1);
                warn!(sub_id = id, "subscriber callback panicked, skipping");
            }
        }
        debug!(delivered, active_count = snapshot.len(), "snapshot published");
        delivered
    }

    /// Number of live registrations.
    pub fn subscriber_count(&self) -> usize {
        self.inner.callbacks.lock().len()
    }

    /// Configured registration limit, if any.
    pub fn max_registrations(&self) -> Option<usize> {
        self.inner.max_registrations
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one registration. Unsubscribes on drop.
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
    active: AtomicBool,
}

impl Subscription {
    /// Registration id (unique per broadcaster).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this handle still holds its registration.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the registration.
    ///
    /// Returns `true` only on the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        let removed = self
            .registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.id));
        if removed {
            debug!(sub_id = self.id, "subscriber removed");
        }
        removed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
