//! At most one in-memory instance per persisted record.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{Error, Id, Result, quote_ident};
use tether_statement::Database;

use crate::cached::RecordCell;
use crate::handle::Handle;
use crate::record::Record;

/// The identity cache for one base record type.
///
/// Persisted entries are keyed by their identifier; records not yet saved
/// are keyed by a negative transient key drawn from a countdown counter.
/// Records marked for deletion move to the condemned list: they surrender
/// their key (so a later load of the same identifier consults the store
/// honestly) but stay alive until their last handle drops.
///
/// Eviction is lazy. Dropping the last handle makes an entry *eligible*;
/// nothing is freed until [`IdentityMap::prune`] runs, and prune never
/// touches an entry with outstanding handles.
///
/// A map is scoped to one connection (its `Session` owns it) and must
/// outlive every handle created from it — which the `Rc`-based plumbing
/// makes structural rather than a caller obligation.
pub struct IdentityMap<T: Record> {
    by_key: RefCell<HashMap<i64, Rc<RecordCell<T>>>>,
    condemned: RefCell<Vec<Rc<RecordCell<T>>>>,
    next_transient: Cell<i64>,
}

impl<T: Record> IdentityMap<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_key: RefCell::new(HashMap::new()),
            condemned: RefCell::new(Vec::new()),
            next_transient: Cell::new(-1),
        }
    }

    /// Cache a brand-new record under a transient key and hand back its
    /// first handle.
    ///
    /// Fails with `Overflow` if the transient-key counter would wrap; the
    /// map is left unchanged on any failure.
    pub fn create_new(&self) -> Result<Handle<T>> {
        let key = self.next_transient.get();
        if key == i64::MIN {
            return Err(Error::Overflow {
                what: "transient key",
            });
        }
        let cell = Rc::new(RecordCell::transient(T::fresh(), key));
        let handle = Handle::bind(Rc::clone(&cell))?;
        self.by_key.borrow_mut().insert(key, cell);
        self.next_transient.set(key - 1);
        tracing::debug!(table = T::TABLE, key, "transient record cached");
        Ok(handle)
    }

    /// Handle to the record `id`, verifying the row exists before loading.
    ///
    /// A cache hit skips the store entirely. On a miss, the primary-key
    /// column is probed through the statement pool; `BadIdentifier` if no
    /// such row, otherwise the record is loaded and cached as Loaded.
    pub fn get_checked(&self, db: &Database<T::Conn>, id: Id) -> Result<Handle<T>> {
        if let Some(cell) = self.lookup(id) {
            return Handle::bind(cell);
        }
        let sql = format!(
            "select {pk} from {table} where {pk} = :id",
            pk = quote_ident(T::PRIMARY_KEY),
            table = quote_ident(T::TABLE),
        );
        let mut probe = db.statement(&sql)?;
        probe.bind(":id", id)?;
        if !probe.step()? {
            return Err(Error::BadIdentifier {
                table: T::TABLE,
                id,
            });
        }
        drop(probe);
        self.cache_loaded(db, id)
    }

    /// Handle to the record `id`, trusting the caller that the row exists
    /// (typically because `id` came out of a result-set cursor over this
    /// table). Passing an id with no row behind it violates that contract;
    /// the result is an error or a nonsense record, never memory unsafety.
    pub fn get_unchecked(&self, db: &Database<T::Conn>, id: Id) -> Result<Handle<T>> {
        if let Some(cell) = self.lookup(id) {
            return Handle::bind(cell);
        }
        self.cache_loaded(db, id)
    }

    fn lookup(&self, id: Id) -> Option<Rc<RecordCell<T>>> {
        self.by_key.borrow().get(&id).cloned()
    }

    fn cache_loaded(&self, db: &Database<T::Conn>, id: Id) -> Result<Handle<T>> {
        // The map borrow is not held across the load: a record's `load` may
        // reenter the cache for other records.
        let value = T::load(db, id)?;
        let cell = Rc::new(RecordCell::loaded(value, id));
        let handle = Handle::bind(Rc::clone(&cell))?;
        self.by_key.borrow_mut().insert(id, cell);
        tracing::debug!(table = T::TABLE, id, "record cached");
        Ok(handle)
    }

    /// Re-key a transient record to the identifier the store just assigned
    /// it, flipping its lifecycle to Loaded. Called exactly once per
    /// record, on first save.
    ///
    /// Fails with `DuplicateIdentity` — map unchanged — if `id` is already
    /// cached, which indicates a bug in id allocation upstream.
    pub fn notify_persisted(&self, transient_key: i64, id: Id) -> Result<()> {
        let mut by_key = self.by_key.borrow_mut();
        if by_key.contains_key(&id) {
            return Err(Error::DuplicateIdentity {
                table: T::TABLE,
                id,
            });
        }
        let Some(cell) = by_key.remove(&transient_key) else {
            return Err(Error::BadIdentifier {
                table: T::TABLE,
                id: transient_key,
            });
        };
        cell.assign_identity(id);
        by_key.insert(id, cell);
        tracing::debug!(table = T::TABLE, transient_key, id, "record re-keyed");
        Ok(())
    }

    /// Move a record to the condemned list: lifecycle PendingDelete, key
    /// surrendered, value kept alive for outstanding handles.
    pub(crate) fn condemn(&self, cell: &Rc<RecordCell<T>>) {
        self.by_key.borrow_mut().remove(&cell.cache_key());
        cell.condemn();
        self.condemned.borrow_mut().push(Rc::clone(cell));
    }

    /// Drop every entry with zero outstanding handles, cached and condemned
    /// alike. Returns how many were freed. Referenced entries are never
    /// touched, whatever their lifecycle.
    pub fn prune(&self) -> usize {
        let mut freed = 0;
        self.by_key.borrow_mut().retain(|_, cell| {
            let keep = cell.handles() > 0;
            if !keep {
                freed += 1;
            }
            keep
        });
        self.condemned.borrow_mut().retain(|cell| {
            let keep = cell.handles() > 0;
            if !keep {
                freed += 1;
            }
            keep
        });
        if freed > 0 {
            tracing::debug!(table = T::TABLE, freed, "pruned unreferenced records");
        }
        freed
    }

    /// Number of entries currently filed under a key.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.by_key.borrow().len()
    }

    pub(crate) fn condemned_count(&self) -> usize {
        self.condemned.borrow().len()
    }

    pub(crate) fn live_handles(&self) -> u64 {
        let keyed: u64 = self
            .by_key
            .borrow()
            .values()
            .map(|cell| u64::from(cell.handles()))
            .sum();
        let condemned: u64 = self
            .condemned
            .borrow()
            .iter()
            .map(|cell| u64::from(cell.handles()))
            .sum();
        keyed + condemned
    }

    pub(crate) fn dump(&self) -> serde_json::Value {
        let entries: Vec<serde_json::Value> = self
            .by_key
            .borrow()
            .iter()
            .map(|(key, cell)| {
                serde_json::json!({
                    "key": key,
                    "id": cell.identity(),
                    "lifecycle": cell.lifecycle(),
                    "handles": cell.handles(),
                })
            })
            .collect();
        serde_json::json!({
            "table": T::TABLE,
            "entries": entries,
            "condemned": self.condemned_count(),
        })
    }

    #[cfg(test)]
    pub(crate) fn set_next_transient_for_test(&self, key: i64) {
        self.next_transient.set(key);
    }
}
