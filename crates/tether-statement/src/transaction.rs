//! Scope guard for transaction boundaries.

use tether_core::{Connection, Result};

use crate::database::Database;

/// Marks a region whose partial effects must be atomically undone on
/// failure.
///
/// Begin with [`TransactionGuard::begin`]; finish with
/// [`TransactionGuard::commit`] or [`TransactionGuard::rollback`]. Dropping
/// the guard without a commit rolls back, so every early-return and error
/// path is covered.
///
/// The guard speaks only to the backing store. The identity cache makes no
/// attempt to re-synchronize in-memory records on a rollback: cached values
/// may reflect uncommitted state afterwards, and callers crossing a rollback
/// boundary must treat affected handles as stale.
pub struct TransactionGuard<'d, C: Connection> {
    db: &'d Database<C>,
    open: bool,
}

impl<'d, C: Connection> TransactionGuard<'d, C> {
    /// Open a transaction on the backing store.
    pub fn begin(db: &'d Database<C>) -> Result<Self> {
        db.execute("begin transaction")?;
        tracing::debug!("transaction opened");
        Ok(Self { db, open: true })
    }

    /// Commit. Consumes the guard; if the store rejects the commit the
    /// transaction is still open and the guard's drop will roll it back.
    pub fn commit(mut self) -> Result<()> {
        self.db.execute("commit")?;
        self.open = false;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll back explicitly. Equivalent to dropping the guard, but surfaces
    /// any store error to the caller.
    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.db.execute("rollback")?;
        tracing::debug!("transaction rolled back");
        Ok(())
    }
}

impl<C: Connection> Drop for TransactionGuard<'_, C> {
    fn drop(&mut self) {
        if self.open {
            // Drop must not fail; a store that refuses the rollback here
            // is reported through the log, not a panic.
            if let Err(err) = self.db.execute("rollback") {
                tracing::error!(error = %err, "rollback on drop failed");
            } else {
                tracing::debug!("transaction rolled back on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_mem::MemoryConnection;

    fn counted(db: &Database<MemoryConnection>) -> i64 {
        let mut select = db.statement("select n from tally").unwrap();
        let mut rows = 0;
        while select.step().unwrap() {
            rows += 1;
        }
        rows
    }

    fn tally_db() -> Database<MemoryConnection> {
        let db = Database::new(MemoryConnection::open());
        db.execute("create table tally (n integer)").unwrap();
        db
    }

    #[test]
    fn commit_keeps_effects() {
        let db = tally_db();
        let guard = TransactionGuard::begin(&db).unwrap();
        db.execute("insert into tally (n) values (1)").unwrap();
        guard.commit().unwrap();
        assert_eq!(counted(&db), 1);
    }

    #[test]
    fn drop_without_commit_rolls_back() {
        let db = tally_db();
        {
            let _guard = TransactionGuard::begin(&db).unwrap();
            db.execute("insert into tally (n) values (1)").unwrap();
            db.execute("insert into tally (n) values (2)").unwrap();
        }
        assert_eq!(counted(&db), 0);
    }

    #[test]
    fn explicit_rollback_undoes_effects() {
        let db = tally_db();
        let guard = TransactionGuard::begin(&db).unwrap();
        db.execute("insert into tally (n) values (1)").unwrap();
        guard.rollback().unwrap();
        assert_eq!(counted(&db), 0);
    }
}
