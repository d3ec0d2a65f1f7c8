//! Identity cache and reference-counted handles for Tether.
//!
//! Business objects persisted in a relational store have a problem the
//! store cannot solve: if the same row is loaded twice, the program holds
//! two disagreeing copies. This crate guarantees **at most one in-memory
//! instance per persisted record** and counts every outstanding reference
//! to it.
//!
//! # Pieces
//!
//! - [`Record`] is the contract a persisted type signs: table and
//!   primary-key names plus load/insert/update/delete over the statement
//!   layer. [`Variant`] maps a derived type onto the base type whose table
//!   owns the primary-key sequence.
//! - [`IdentityMap`] holds the canonical instances for one base type:
//!   lookup, transient creation, re-keying on first persist, lazy eviction.
//! - [`Handle`] is the only sanctioned way to touch a cached record. Every
//!   copy bumps the record's reference counter (fallibly — the counter
//!   never wraps), every drop releases it (infallibly).
//! - [`Session`] is the connection-scoped owner: one
//!   [`tether_statement::Database`] plus one identity map per base type,
//!   with the save/remove orchestration and diagnostics on top.
//! - [`Reader`] iterates a primary-key select into unchecked handles.
//!
//! Everything here is single-threaded by design; reentrancy (a record load
//! issuing nested loads) is supported, parallelism is not.

pub mod cached;
pub mod handle;
pub mod identity_map;
pub mod reader;
pub mod record;
pub mod session;

pub use cached::Lifecycle;
pub use handle::Handle;
pub use identity_map::IdentityMap;
pub use reader::Reader;
pub use record::{Record, Variant};
pub use session::{CacheStats, Session};

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixture: a small planet catalogue over the memory backend.

    use tether_core::{Connection, Error, Id, Result};
    use tether_mem::MemoryConnection;
    use tether_statement::Database;

    use crate::record::{Record, Variant};
    use crate::session::Session;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Planet {
        pub(crate) name: String,
        pub(crate) size: String,
    }

    impl Record for Planet {
        type Conn = MemoryConnection;
        const TABLE: &'static str = "planets";
        const PRIMARY_KEY: &'static str = "planet_id";

        fn fresh() -> Self {
            Self {
                name: String::new(),
                size: String::new(),
            }
        }

        fn load(db: &Database<Self::Conn>, id: Id) -> Result<Self> {
            let mut stmt =
                db.statement("select name, size from planets where planet_id = :id")?;
            stmt.bind(":id", id)?;
            if !stmt.step()? {
                return Err(Error::BadIdentifier {
                    table: Self::TABLE,
                    id,
                });
            }
            Ok(Self {
                name: stmt.extract(0)?,
                size: stmt.extract(1)?,
            })
        }

        fn insert(&self, db: &Database<Self::Conn>) -> Result<Id> {
            let mut stmt =
                db.statement("insert into planets (name, size) values (:name, :size)")?;
            stmt.bind(":name", self.name.as_str())?;
            stmt.bind(":size", self.size.as_str())?;
            stmt.step_final()?;
            db.connection().last_insert_id()
        }

        fn update(&self, db: &Database<Self::Conn>, id: Id) -> Result<()> {
            let mut stmt = db.statement(
                "update planets set name = :name, size = :size where planet_id = :id",
            )?;
            stmt.bind(":name", self.name.as_str())?;
            stmt.bind(":size", self.size.as_str())?;
            stmt.bind(":id", id)?;
            stmt.step_final()
        }
    }

    /// A "gas giant" is a planet row whose size column says so; the planets
    /// table owns the identifier sequence.
    pub(crate) struct GasGiant;

    impl Variant for GasGiant {
        type Base = Planet;

        fn matches(base: &Planet) -> bool {
            base.size == "giant"
        }
    }

    pub(crate) fn session() -> Session<MemoryConnection> {
        let session = Session::new(MemoryConnection::open());
        session
            .database()
            .execute(
                "create table planets (planet_id integer primary key autoincrement, \
                 name text, size text)",
            )
            .unwrap();
        session
    }

    pub(crate) fn seeded_session() -> Session<MemoryConnection> {
        let session = session();
        session
            .database()
            .execute(
                "insert into planets (name, size) values ('Mercury', 'small'); \
                 insert into planets (name, size) values ('Venus', 'medium'); \
                 insert into planets (name, size) values ('Jupiter', 'giant')",
            )
            .unwrap();
        session
    }
}
