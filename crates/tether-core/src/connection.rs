//! The backing-store boundary.
//!
//! Tether does not implement a SQL engine. It drives one through these two
//! traits and makes exactly three assumptions about it: statement text is
//! compiled into reusable query objects, stepping a query visits result rows
//! one at a time, and a transactional `begin`/`commit`/`rollback` vocabulary
//! exists behind [`Connection::execute_immediate`].

use crate::error::Result;
use crate::identifiers::Id;
use crate::value::Value;

/// A compiled query object produced by [`Connection::prepare`].
///
/// The statement layer above this trait guarantees a query object is only
/// ever driven by one logical user at a time, and that it is reset and its
/// bindings cleared between users. Implementations therefore never need
/// their own sharing discipline.
pub trait PreparedQuery {
    /// Bind a named parameter (name given as written in the SQL, including
    /// any prefix sigil such as `:`).
    ///
    /// Fails with [`crate::Error::NoParameter`] when the statement has no
    /// parameter of that name. A failed bind must leave previously bound
    /// parameters untouched; the caller handles cleanup.
    fn bind_value(&mut self, name: &str, value: Value) -> Result<()>;

    /// Advance to the next result row.
    ///
    /// Returns `true` while positioned on a row, `false` on exhaustion.
    /// Side-effecting statements perform their work on the first step and
    /// report exhaustion.
    fn step(&mut self) -> Result<bool>;

    /// Extract the raw value in column `index` (zero-based) of the current
    /// row.
    fn column(&self, index: usize) -> Result<Value>;

    /// Number of columns in the result shape of this query.
    fn column_count(&self) -> usize;

    /// Rewind the cursor to before the first row. Bound parameters are
    /// retained. Never fails.
    fn reset(&mut self);

    /// Set every bound parameter back to NULL. Never fails.
    fn clear_bindings(&mut self);
}

/// A live connection to the backing store.
pub trait Connection {
    /// The compiled query type this store produces.
    type Statement: PreparedQuery;

    /// Whether the connection is usable. Every statement-pool operation
    /// checks this first and reports [`crate::Error::InvalidConnection`]
    /// without touching the store when it fails.
    fn is_valid(&self) -> bool;

    /// Compile the first statement in `text`.
    ///
    /// Returns the query object together with the byte offset just past the
    /// first complete statement, so the caller can inspect the remaining
    /// tail. The store parses only the first statement; the tail is returned
    /// unexamined.
    fn prepare(&self, text: &str) -> Result<(Self::Statement, usize)>;

    /// Execute `text` directly, bypassing the statement pool. Multiple
    /// statements are permitted. Returns the number of rows changed by the
    /// final statement.
    fn execute_immediate(&self, text: &str) -> Result<u64>;

    /// The identifier assigned by the most recent successful insert.
    fn last_insert_id(&self) -> Result<Id>;
}
