//! Contracts a persisted type signs with the cache.

use tether_core::{Connection, Id, Result, quote_ident};
use tether_statement::Database;

/// A business-object type persisted in one table family.
///
/// The cache asks four things of a record type: where its rows live
/// (`TABLE`, `PRIMARY_KEY`), how to materialize one (`load`), and how to
/// write one back (`insert`, `update`). `load` is trusted the way an
/// unchecked lookup is trusted — existence verification, when wanted, is
/// the identity map's job, done against the primary-key column before
/// `load` runs.
///
/// A record value's `Drop` must not panic; handle destruction relies on it.
pub trait Record: Sized + 'static {
    /// The connection type this record is persisted through.
    type Conn: Connection;

    /// Table holding this type's rows (for a [`Variant`] hierarchy, the
    /// base type's table, which owns the identifier sequence).
    const TABLE: &'static str;

    /// Name of the single-column integer autoincrement primary key.
    const PRIMARY_KEY: &'static str;

    /// A blank value for a record created in memory, before first save.
    fn fresh() -> Self;

    /// Materialize the row `id`. Called by the identity map on a cache
    /// miss; the id has already been verified when the lookup was checked.
    fn load(db: &Database<Self::Conn>, id: Id) -> Result<Self>;

    /// Insert this value as a new row and return the identifier the store
    /// assigned.
    fn insert(&self, db: &Database<Self::Conn>) -> Result<Id>;

    /// Write this value over the existing row `id`.
    fn update(&self, db: &Database<Self::Conn>, id: Id) -> Result<()>;

    /// Delete the row `id`. The default goes through the statement pool
    /// with the type's table metadata; override for multi-table variants.
    fn delete(db: &Database<Self::Conn>, id: Id) -> Result<()> {
        let sql = format!(
            "delete from {} where {} = :id",
            quote_ident(Self::TABLE),
            quote_ident(Self::PRIMARY_KEY)
        );
        let mut stmt = db.statement(&sql)?;
        stmt.bind(":id", id)?;
        stmt.step_final()
    }
}

/// Compile-time mapping from a derived persisted type to the base type
/// whose table owns the shared identifier sequence.
///
/// Hierarchies are not modeled with inheritance: the base type is what the
/// identity map stores, and `matches` is the runtime check that a loaded
/// base record really is this variant — the cache's substitute for a
/// dynamic downcast. A failed check surfaces as a type-mismatch error from
/// the variant lookup.
pub trait Variant: 'static {
    /// The base type sharing this variant's table family.
    type Base: Record;

    /// Whether `base` is an instance of this variant.
    fn matches(base: &Self::Base) -> bool;
}
