//! Identity-cached persistence for embedded relational stores.
//!
//! Tether sits between business objects and a backing store and enforces
//! two disciplines the store cannot:
//!
//! 1. **One instance per record.** A connection-scoped [`Session`] keeps an
//!    identity map per persisted type; every lookup of the same identifier
//!    yields a [`Handle`] aliasing the same in-memory record, with an
//!    explicit reference count that never wraps and never blocks teardown.
//! 2. **One user per compiled statement.** The session's
//!    [`Database`] pools prepared statements by text; overlapping
//!    acquisitions of the same text get distinct slots, so a nested query
//!    can never corrupt an outer cursor. Contention mints a new slot —
//!    nobody waits.
//!
//! The backing store stays behind the [`Connection`] boundary trait;
//! `tether-mem` ships a small in-memory implementation used throughout the
//! test suites.
//!
//! # Example
//!
//! ```ignore
//! use tether::prelude::*;
//! use tether_mem::MemoryConnection;
//!
//! let session = Session::new(MemoryConnection::open());
//! session.database().execute(
//!     "create table heroes (hero_id integer primary key autoincrement, name text)",
//! )?;
//!
//! // New record: cached under a transient key until first save.
//! let hero = session.create::<Hero>()?;
//! hero.value_mut()?.name = "Rusty".to_string();
//! let id = session.save(&hero)?;
//!
//! // Every lookup of that id aliases the same record.
//! let same = session.load::<Hero>(id)?;
//! assert_eq!(same, hero);
//! ```

pub use tether_core::{
    Connection, Error, FromValue, Id, PreparedQuery, Result, Value, quote_ident,
};

pub use tether_statement::{Database, PoolStats, Statement, TransactionGuard};

pub use tether_cache::{
    CacheStats, Handle, IdentityMap, Lifecycle, Reader, Record, Session, Variant,
};

/// One-stop imports for application code.
pub mod prelude {
    pub use tether_cache::{
        CacheStats, Handle, IdentityMap, Lifecycle, Reader, Record, Session, Variant,
    };
    pub use tether_core::{Connection, Error, FromValue, Id, Result, Value};
    pub use tether_statement::{Database, Statement, TransactionGuard};
}
