//! Connection plus statement pool.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{Connection, Error, Result};

use crate::slot::StatementSlot;
use crate::statement::Statement;

/// A backing-store connection together with its prepared-statement pool.
///
/// One `Database` exists per connection; everything above this layer (the
/// identity cache, record loaders, transaction guards) goes through it. The
/// pool trades memory for the absence of contention: when every slot for a
/// text is claimed, a new one is compiled rather than making anyone wait.
pub struct Database<C: Connection> {
    conn: C,
    pool: RefCell<HashMap<String, Vec<Rc<RefCell<StatementSlot<C::Statement>>>>>>,
}

/// Point-in-time shape of the statement pool, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Distinct statement texts with at least one slot.
    pub texts: usize,
    /// Total compiled slots across all texts.
    pub slots: usize,
    /// Slots currently claimed by a live [`Statement`].
    pub in_use: usize,
}

impl<C: Connection> Database<C> {
    /// Wrap a connection. The pool starts empty; slots are compiled on
    /// first use of each statement text.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            pool: RefCell::new(HashMap::new()),
        }
    }

    /// The raw connection.
    #[must_use]
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Tear down the pool and give the connection back.
    pub fn into_connection(self) -> C {
        self.conn
    }

    /// Whether the underlying connection is usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.conn.is_valid()
    }

    /// Acquire an exclusive [`Statement`] for `text`.
    ///
    /// Reuses an idle slot when one exists for this exact text, otherwise
    /// compiles a fresh one and adds it to the pool. Either way the slot is
    /// scrubbed (cursor rewound, bindings nulled) before it is handed out.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConnection`] if the connection fails its validity
    ///   check (checked before anything else).
    /// - [`Error::Prepare`] if the store rejects the text, tagged with the
    ///   offending statement.
    /// - [`Error::TooManyStatements`] if `text` holds anything beyond one
    ///   statement plus trailing separators and whitespace. Exactly one
    ///   statement is tracked per slot.
    pub fn statement(&self, text: &str) -> Result<Statement<'_, C>> {
        if !self.conn.is_valid() {
            return Err(Error::InvalidConnection);
        }

        if let Some(slots) = self.pool.borrow().get(text) {
            for slot in slots {
                let mut claimed = slot.borrow_mut();
                if !claimed.locked {
                    claimed.scrub();
                    claimed.locked = true;
                    drop(claimed);
                    tracing::debug!(statement = text, "reusing pooled statement slot");
                    return Ok(Statement::new(self, Rc::clone(slot)));
                }
            }
        }

        let (query, consumed) = self.conn.prepare(text).map_err(|err| match err {
            Error::Backend { message } => Error::Prepare {
                statement: text.to_string(),
                message,
            },
            other => other,
        })?;
        reject_trailing_statements(text, consumed)?;

        let slot = Rc::new(RefCell::new(StatementSlot::new(query)));
        slot.borrow_mut().locked = true;
        self.pool
            .borrow_mut()
            .entry(text.to_string())
            .or_default()
            .push(Rc::clone(&slot));
        tracing::debug!(statement = text, "compiled new statement slot");
        Ok(Statement::new(self, slot))
    }

    /// Execute `text` immediately, bypassing the pool. Multiple statements
    /// are tolerated here; this is the path for DDL and transaction verbs.
    pub fn execute(&self, text: &str) -> Result<u64> {
        if !self.conn.is_valid() {
            return Err(Error::InvalidConnection);
        }
        self.conn.execute_immediate(text)
    }

    /// Current pool shape.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        let pool = self.pool.borrow();
        let mut stats = PoolStats {
            texts: pool.len(),
            slots: 0,
            in_use: 0,
        };
        for slots in pool.values() {
            stats.slots += slots.len();
            stats.in_use += slots.iter().filter(|s| s.borrow().locked).count();
        }
        stats
    }
}

/// A statement's slot holds exactly one statement; anything after the first
/// complete statement other than separators and whitespace is rejected.
fn reject_trailing_statements(text: &str, consumed: usize) -> Result<()> {
    let tail = text.get(consumed..).unwrap_or("");
    if tail.chars().all(|ch| ch == ';' || ch.is_ascii_whitespace()) {
        Ok(())
    } else {
        Err(Error::TooManyStatements {
            statement: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_mem::MemoryConnection;

    fn planets_db() -> Database<MemoryConnection> {
        let db = Database::new(MemoryConnection::open());
        db.execute("create table planets (name text, size text)")
            .unwrap();
        db.execute("insert into planets (name, size) values ('Mercury', 'small')")
            .unwrap();
        db.execute("insert into planets (name, size) values ('Venus', 'medium')")
            .unwrap();
        db.execute("insert into planets (name, size) values ('Earth', 'medium')")
            .unwrap();
        db
    }

    #[test]
    fn trailing_separators_and_whitespace_are_harmless() {
        let db = planets_db();
        assert!(
            db.statement("insert into planets (name, size) values ('Mars', 'small'); ;;    ")
                .is_ok()
        );
        assert!(
            db.statement("insert into planets (name, size) values ('Saturn', 'large');")
                .is_ok()
        );
    }

    #[test]
    fn second_statement_is_rejected() {
        let db = planets_db();
        let err = db
            .statement(
                "insert into planets (name, size) values ('Earth', 'medium'); \
                 insert into planets (name, size) values ('Jupiter', 'large')",
            )
            .unwrap_err();
        assert!(matches!(err, Error::TooManyStatements { .. }));

        // Ungrammatical tails are rejected the same way; only the first
        // statement is ever parsed.
        let err = db
            .statement("insert into planets (name, size) values ('Earth', 'medium'); gibberish((")
            .unwrap_err();
        assert!(matches!(err, Error::TooManyStatements { .. }));
    }

    #[test]
    fn syntax_errors_surface_tagged_with_the_text() {
        let db = planets_db();
        let err = db.statement("unsyntactical gobbledigook").unwrap_err();
        match err {
            Error::Prepare { statement, .. } => {
                assert_eq!(statement, "unsyntactical gobbledigook");
            }
            other => panic!("expected Prepare error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_connection_dominates() {
        let conn = MemoryConnection::open();
        conn.close();
        let db = Database::new(conn);
        assert_eq!(
            db.statement("unsyntactical gobbledigook").unwrap_err(),
            Error::InvalidConnection
        );
    }

    #[test]
    fn concurrent_acquisitions_get_distinct_slots() {
        let db = planets_db();
        let text = "select size from planets where name = 'Earth'";
        let mut s0 = db.statement(text).unwrap();
        let mut s1 = db.statement(text).unwrap();
        assert_eq!(db.pool_stats().slots, 2);
        assert_eq!(db.pool_stats().in_use, 2);

        // Stepping one does not perturb the other's cursor.
        assert!(s0.step().unwrap());
        assert!(!s0.step().unwrap());
        assert!(s1.step().unwrap());
        assert!(!s1.step().unwrap());
    }

    #[test]
    fn released_slots_are_reused_not_multiplied() {
        let db = planets_db();
        let text = "select name from planets";
        {
            let _s = db.statement(text).unwrap();
        }
        {
            let _s = db.statement(text).unwrap();
        }
        let stats = db.pool_stats();
        assert_eq!(stats.texts, 1);
        assert_eq!(stats.slots, 1);
        assert_eq!(stats.in_use, 0);
    }
}
