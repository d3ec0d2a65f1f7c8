//! Connection-scoped owner of the identity maps.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use tether_core::{Connection, Error, Id, Result};
use tether_statement::{Database, TransactionGuard};

use crate::cached::Lifecycle;
use crate::handle::Handle;
use crate::identity_map::IdentityMap;
use crate::record::{Record, Variant};

/// Type-erased view of one identity map, so the session can sweep and
/// inspect maps without knowing their record types.
trait MapSlot {
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
    fn prune(&self) -> usize;
    fn cached(&self) -> usize;
    fn condemned(&self) -> usize;
    fn live_handles(&self) -> u64;
    fn dump(&self) -> serde_json::Value;
}

impl<T: Record> MapSlot for IdentityMap<T> {
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn prune(&self) -> usize {
        IdentityMap::prune(self)
    }

    fn cached(&self) -> usize {
        self.cached_count()
    }

    fn condemned(&self) -> usize {
        self.condemned_count()
    }

    fn live_handles(&self) -> u64 {
        IdentityMap::live_handles(self)
    }

    fn dump(&self) -> serde_json::Value {
        IdentityMap::dump(self)
    }
}

/// Aggregate shape of a session's caches, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Records currently filed under a key, across all maps.
    pub tracked: usize,
    /// Records on a condemned list, across all maps.
    pub condemned: usize,
    /// Outstanding handles, across all records.
    pub live_handles: u64,
}

/// One connection's worth of persistence state: the statement-pooled
/// [`Database`] plus one [`IdentityMap`] per base record type, created on
/// first use.
///
/// The session is the value whose lifetime scopes the whole apparatus:
/// drop it and connection, statement pool and caches go together. It is
/// never a hidden singleton — code that wants the cache is handed a
/// `&Session`.
pub struct Session<C: Connection> {
    db: Database<C>,
    maps: RefCell<HashMap<TypeId, Rc<dyn MapSlot>>>,
}

impl<C: Connection> Session<C> {
    /// Take ownership of a connection and start with empty caches.
    pub fn new(conn: C) -> Self {
        Self {
            db: Database::new(conn),
            maps: RefCell::new(HashMap::new()),
        }
    }

    /// The statement-pooled database handle.
    #[must_use]
    pub fn database(&self) -> &Database<C> {
        &self.db
    }

    /// The identity map for `T`, created on first use.
    ///
    /// Handed out as an `Rc` so callers can work with the map while the
    /// session's registry stays unborrowed — record loads reenter the
    /// session, and a held borrow here would deadlock that.
    pub fn identity_map<T: Record<Conn = C>>(&self) -> Rc<IdentityMap<T>> {
        let key = TypeId::of::<T>();
        if let Some(slot) = self.maps.borrow().get(&key) {
            if let Ok(map) = Rc::clone(slot).as_any_rc().downcast::<IdentityMap<T>>() {
                return map;
            }
        }
        let map = Rc::new(IdentityMap::<T>::new());
        self.maps
            .borrow_mut()
            .insert(key, Rc::clone(&map) as Rc<dyn MapSlot>);
        map
    }

    /// A handle to a brand-new, not-yet-persisted record.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn create<T: Record<Conn = C>>(&self) -> Result<Handle<T>> {
        self.identity_map::<T>().create_new()
    }

    /// A handle to record `id`, verifying existence in the store first.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load<T: Record<Conn = C>>(&self, id: Id) -> Result<Handle<T>> {
        self.identity_map::<T>().get_checked(&self.db, id)
    }

    /// A handle to record `id`, trusting the caller that the row exists.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn load_unchecked<T: Record<Conn = C>>(&self, id: Id) -> Result<Handle<T>> {
        self.identity_map::<T>().get_unchecked(&self.db, id)
    }

    /// A checked load through the base map of a variant hierarchy,
    /// verifying the loaded record really is variant `V`.
    pub fn load_variant<V>(&self, id: Id) -> Result<Handle<V::Base>>
    where
        V: Variant,
        V::Base: Record<Conn = C>,
    {
        let handle = self.load::<V::Base>(id)?;
        self.check_variant::<V>(handle, id)
    }

    /// Unchecked-load counterpart of [`Session::load_variant`].
    pub fn load_variant_unchecked<V>(&self, id: Id) -> Result<Handle<V::Base>>
    where
        V: Variant,
        V::Base: Record<Conn = C>,
    {
        let handle = self.load_unchecked::<V::Base>(id)?;
        self.check_variant::<V>(handle, id)
    }

    fn check_variant<V>(&self, handle: Handle<V::Base>, id: Id) -> Result<Handle<V::Base>>
    where
        V: Variant,
        V::Base: Record<Conn = C>,
    {
        if V::matches(&*handle.value()?) {
            Ok(handle)
        } else {
            Err(Error::TypeMismatch {
                table: <V::Base as Record>::TABLE,
                id,
            })
        }
    }

    /// Write the handled record to the store.
    ///
    /// A New record is inserted; the store-assigned identifier re-keys its
    /// cache entry and comes back to the caller. A Loaded record is
    /// updated in place. A record already marked for deletion is refused.
    #[tracing::instrument(level = "debug", skip(self, handle))]
    pub fn save<T: Record<Conn = C>>(&self, handle: &Handle<T>) -> Result<Id> {
        let Some(cell) = handle.record() else {
            return Err(Error::UnboundHandle);
        };
        match cell.lifecycle() {
            Lifecycle::New => {
                let id = {
                    let value = cell.value.borrow();
                    value.insert(&self.db)?
                };
                self.identity_map::<T>()
                    .notify_persisted(cell.cache_key(), id)?;
                tracing::info!(table = T::TABLE, id, "record persisted");
                Ok(id)
            }
            Lifecycle::Loaded => {
                let id = cell.persisted_id();
                cell.value.borrow().update(&self.db, id)?;
                tracing::debug!(table = T::TABLE, id, "record updated");
                Ok(id)
            }
            Lifecycle::PendingDelete => Err(Error::RecordDeleted),
        }
    }

    /// Delete the handled record's row and condemn its cache entry.
    ///
    /// Live handles keep working against the condemned record; its
    /// identifier becomes honestly absent for subsequent checked loads.
    /// Removing a never-persisted record only condemns the cache entry.
    /// Removing an already-removed record is a no-op.
    #[tracing::instrument(level = "debug", skip(self, handle))]
    pub fn remove<T: Record<Conn = C>>(&self, handle: &Handle<T>) -> Result<()> {
        let Some(cell) = handle.record() else {
            return Err(Error::UnboundHandle);
        };
        match cell.lifecycle() {
            Lifecycle::PendingDelete => Ok(()),
            Lifecycle::New => {
                self.identity_map::<T>().condemn(cell);
                Ok(())
            }
            Lifecycle::Loaded => {
                let id = cell.persisted_id();
                T::delete(&self.db, id)?;
                self.identity_map::<T>().condemn(cell);
                tracing::info!(table = T::TABLE, id, "record deleted");
                Ok(())
            }
        }
    }

    /// Sweep every map, freeing records with no outstanding handles.
    /// Returns how many entries were dropped.
    pub fn prune(&self) -> usize {
        self.maps.borrow().values().map(|slot| slot.prune()).sum()
    }

    /// Open a transaction on this session's database.
    ///
    /// The caches are not rolled back with the store: after a rollback,
    /// records loaded or saved inside the transaction may hold uncommitted
    /// values, and callers must treat such handles as stale.
    pub fn begin(&self) -> Result<TransactionGuard<'_, C>> {
        TransactionGuard::begin(&self.db)
    }

    /// Aggregate cache shape across every map.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let maps = self.maps.borrow();
        let mut stats = CacheStats {
            tracked: 0,
            condemned: 0,
            live_handles: 0,
        };
        for slot in maps.values() {
            stats.tracked += slot.cached();
            stats.condemned += slot.condemned();
            stats.live_handles += slot.live_handles();
        }
        stats
    }

    /// Per-map dump of what is cached, for tests and log inspection.
    #[must_use]
    pub fn dump_tracked(&self) -> serde_json::Value {
        let maps = self.maps.borrow();
        let dumps: Vec<serde_json::Value> = maps.values().map(|slot| slot.dump()).collect();
        serde_json::Value::Array(dumps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GasGiant, Planet, seeded_session, session};

    #[test]
    fn create_save_assigns_an_identity_and_rekeys() {
        let session = session();
        let handle = session.create::<Planet>().unwrap();
        assert_eq!(handle.lifecycle(), Some(Lifecycle::New));
        assert_eq!(handle.id(), None);

        {
            let mut planet = handle.value_mut().unwrap();
            planet.name = "Neptune".to_string();
            planet.size = "giant".to_string();
        }
        let id = session.save(&handle).unwrap();
        assert_eq!(handle.id(), Some(id));
        assert_eq!(handle.lifecycle(), Some(Lifecycle::Loaded));

        // The re-keyed entry is the same record a lookup now returns.
        let again = session.load::<Planet>(id).unwrap();
        assert_eq!(again, handle);
    }

    #[test]
    fn save_on_loaded_updates_in_place() {
        let session = seeded_session();
        let handle = session.load::<Planet>(2).unwrap();
        handle.value_mut().unwrap().size = "large".to_string();
        session.save(&handle).unwrap();

        // Evict and reload: the store saw the update.
        drop(handle);
        session.prune();
        let reloaded = session.load::<Planet>(2).unwrap();
        assert_eq!(reloaded.value().unwrap().size, "large");
    }

    #[test]
    fn save_on_unbound_and_deleted_handles_is_refused() {
        let session = seeded_session();
        assert_eq!(
            session.save(&Handle::<Planet>::unbound()).unwrap_err(),
            Error::UnboundHandle
        );

        let handle = session.load::<Planet>(1).unwrap();
        session.remove(&handle).unwrap();
        assert_eq!(session.save(&handle).unwrap_err(), Error::RecordDeleted);
    }

    #[test]
    fn removed_records_stay_alive_for_their_handles() {
        let session = seeded_session();
        let handle = session.load::<Planet>(1).unwrap();
        session.remove(&handle).unwrap();

        assert_eq!(handle.lifecycle(), Some(Lifecycle::PendingDelete));
        assert_eq!(handle.value().unwrap().name, "Mercury");

        // The row is gone, so a checked load reports a bad identifier.
        assert_eq!(
            session.load::<Planet>(1).unwrap_err(),
            Error::BadIdentifier {
                table: "planets",
                id: 1,
            }
        );

        // The condemned entry survives pruning while the handle lives.
        assert_eq!(session.prune(), 0);
        assert_eq!(session.stats().condemned, 1);
        drop(handle);
        assert_eq!(session.prune(), 1);
        assert_eq!(session.stats().condemned, 0);
    }

    #[test]
    fn variant_lookup_checks_the_concrete_type() {
        let session = seeded_session();
        let giant = session.load_variant::<GasGiant>(3).unwrap();
        assert_eq!(giant.value().unwrap().name, "Jupiter");

        assert_eq!(
            session.load_variant::<GasGiant>(1).unwrap_err(),
            Error::TypeMismatch {
                table: "planets",
                id: 1,
            }
        );
        assert_eq!(
            session.load_variant_unchecked::<GasGiant>(2).unwrap_err(),
            Error::TypeMismatch {
                table: "planets",
                id: 2,
            }
        );
    }

    #[test]
    fn stats_and_dump_reflect_the_cache() {
        let session = seeded_session();
        let h1 = session.load::<Planet>(1).unwrap();
        let _h2 = h1.try_clone().unwrap();
        let _h3 = session.load::<Planet>(2).unwrap();

        let stats = session.stats();
        assert_eq!(stats.tracked, 2);
        assert_eq!(stats.live_handles, 3);
        assert_eq!(stats.condemned, 0);

        let dump = session.dump_tracked();
        let maps = dump.as_array().unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0]["table"], "planets");
        assert_eq!(maps[0]["entries"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn identity_maps_are_per_type_and_stable() {
        let session = seeded_session();
        let map_a = session.identity_map::<Planet>();
        let map_b = session.identity_map::<Planet>();
        assert!(Rc::ptr_eq(&map_a, &map_b));
    }
}
