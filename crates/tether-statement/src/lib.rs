//! Prepared-statement pooling for Tether.
//!
//! Many call sites want the same query text at overlapping times — most
//! visibly when a row-processing loop issues a nested query with identical
//! text. Recompiling per use is wasteful; sharing one compiled query corrupts
//! cursor state. This crate resolves the tension with a **tagged pool**:
//! compiled queries are grouped by text, each carries an `in use` flag, and
//! an acquisition either claims an idle slot or mints a new one. Nobody ever
//! waits, and no two live acquisitions of the same text observe each other.
//!
//! # Pieces
//!
//! - [`Database`] owns the raw connection plus the pool, and is the handle
//!   the rest of the workspace passes around.
//! - [`Statement`] is the RAII claim on one slot: bind, step, extract;
//!   dropping it scrubs the slot and returns it to the pool.
//! - [`TransactionGuard`] brackets a region whose partial effects must not
//!   survive failure; dropping it without a commit rolls back.
//!
//! The scheduling model is single-threaded cooperative: "locking" here flags
//! exclusivity to route reentrant users apart, it never blocks.

pub mod database;
pub mod slot;
pub mod statement;
pub mod transaction;

pub use database::{Database, PoolStats};
pub use statement::Statement;
pub use transaction::TransactionGuard;
