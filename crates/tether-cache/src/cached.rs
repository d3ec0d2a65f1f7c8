//! The cached in-memory representative of one record.

use std::cell::{Cell, RefCell};

use serde::{Deserialize, Serialize};
use tether_core::{Error, Id, Result};

/// Where a cached record stands in its persistence lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Created in memory, never saved; holds a transient cache key and no
    /// identifier.
    New,
    /// Backed by a row in the store.
    Loaded,
    /// Marked for deletion. The record stays alive for its outstanding
    /// handles but is no longer reachable through lookups.
    PendingDelete,
}

/// One record's canonical in-memory form: the value, the count of live
/// handles, and its identity bookkeeping. Owned by an identity map, shared
/// out only through `Handle`.
pub(crate) struct RecordCell<T> {
    pub(crate) value: RefCell<T>,
    handles: Cell<u32>,
    identity: Cell<Option<Id>>,
    lifecycle: Cell<Lifecycle>,
    /// Key under which the owning map currently files this record: the
    /// identifier once persisted, a negative transient key before.
    cache_key: Cell<i64>,
}

impl<T> RecordCell<T> {
    pub(crate) fn transient(value: T, cache_key: i64) -> Self {
        Self {
            value: RefCell::new(value),
            handles: Cell::new(0),
            identity: Cell::new(None),
            lifecycle: Cell::new(Lifecycle::New),
            cache_key: Cell::new(cache_key),
        }
    }

    pub(crate) fn loaded(value: T, id: Id) -> Self {
        Self {
            value: RefCell::new(value),
            handles: Cell::new(0),
            identity: Cell::new(Some(id)),
            lifecycle: Cell::new(Lifecycle::Loaded),
            cache_key: Cell::new(id),
        }
    }

    /// Claim one more handle. Fails with `Overflow` at the counter's
    /// ceiling, leaving the count unchanged.
    pub(crate) fn claim(&self) -> Result<()> {
        let next = self
            .handles
            .get()
            .checked_add(1)
            .ok_or(Error::Overflow { what: "handle" })?;
        self.handles.set(next);
        Ok(())
    }

    /// Release one handle. Infallible: a release is only ever paired with a
    /// successful claim.
    pub(crate) fn release(&self) {
        let count = self.handles.get();
        debug_assert!(count > 0, "release without a matching claim");
        self.handles.set(count.saturating_sub(1));
    }

    pub(crate) fn handles(&self) -> u32 {
        self.handles.get()
    }

    pub(crate) fn identity(&self) -> Option<Id> {
        self.identity.get()
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.get()
    }

    pub(crate) fn cache_key(&self) -> i64 {
        self.cache_key.get()
    }

    /// First (and only) identity assignment: transient key out, real id in.
    pub(crate) fn assign_identity(&self, id: Id) {
        debug_assert!(self.identity.get().is_none(), "identity assigned twice");
        self.identity.set(Some(id));
        self.lifecycle.set(Lifecycle::Loaded);
        self.cache_key.set(id);
    }

    pub(crate) fn condemn(&self) {
        self.lifecycle.set(Lifecycle::PendingDelete);
    }

    /// The identifier of a record known to be persisted.
    pub(crate) fn persisted_id(&self) -> Id {
        match self.identity.get() {
            Some(id) => id,
            // Loaded and PendingDelete-after-Loaded records always carry an
            // identity; this is unreachable outside a bookkeeping bug.
            None => unreachable!("persisted record without an identity"),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_handles_for_test(&self, count: u32) {
        self.handles.set(count);
    }
}
