//! The active-set snapshot.
//!
//! An [`ActiveSetSnapshot`] is the complete set of currently active
//! identifiers plus the time it was installed. It is an immutable value: every
//! change produces a new snapshot, never an in-place edit.
//!
//! # Canonical form
//!
//! `activeIds` is always deduplicated and sorted ascending (byte order), no
//! matter how the snapshot was built or deserialized. Two snapshots over the
//! same set therefore serialize identically, which makes equality by
//! serialization cheap for downstream consumers.
//!
//! # JSON Format
//!
//! ```json
//! { "activeIds": ["a", "b"], "updatedAt": 1767225600000 }
//! ```
//!
//! `updatedAt` is integer epoch milliseconds.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Complete, deduplicated, sorted active-identifier set plus its timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SnapshotWire")]
pub struct ActiveSetSnapshot {
    active_ids: Vec<String>,
    updated_at: i64,
}

/// Inbound wire shape. Canonicalized on conversion so a peer can never hand
/// us an unsorted or duplicated set.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotWire {
    #[serde(alias = "activeButtonIds")]
    active_ids: Vec<String>,
    #[serde(default)]
    updated_at: i64,
}

impl From<SnapshotWire> for ActiveSetSnapshot {
    fn from(wire: SnapshotWire) -> Self {
        Self::new(wire.active_ids, wire.updated_at)
    }
}

impl ActiveSetSnapshot {
    /// Build a snapshot from any sequence of identifiers.
    ///
    /// Input order and duplicates are irrelevant: the result holds each
    /// identifier once, sorted ascending.
    pub fn new<I, S>(ids: I, updated_at: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        Self {
            active_ids: unique.into_iter().collect(),
            updated_at,
        }
    }

    /// An empty snapshot stamped with `updated_at`.
    pub fn empty(updated_at: i64) -> Self {
        Self {
            active_ids: Vec::new(),
            updated_at,
        }
    }

    /// The active identifiers, deduplicated and sorted ascending.
    pub fn active_ids(&self) -> &[String] {
        &self.active_ids
    }

    /// Installation time in epoch milliseconds.
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Installation time as a UTC datetime, if representable.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_at)
    }

    /// Whether `id` is in the active set.
    pub fn contains(&self, id: &str) -> bool {
        self.active_ids
            .binary_search_by(|probe| probe.as_str().cmp(id))
            .is_ok()
    }

    /// Number of active identifiers.
    pub fn len(&self) -> usize {
        self.active_ids.len()
    }

    /// Whether no identifier is active.
    pub fn is_empty(&self) -> bool {
        self.active_ids.is_empty()
    }

    /// Whether `other` holds the same set, ignoring timestamps.
    pub fn same_set(&self, other: &Self) -> bool {
        self.active_ids == other.active_ids
    }

    /// Serialize to the JSON wire shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
