//! In-memory reference backend for Tether.
//!
//! `tether-mem` implements the `tether-core` boundary traits over a plain
//! in-process table store and a deliberately small SQL subset: `create
//! table`, `insert`, `select` with one equality filter, `delete`, and the
//! transaction verbs. It exists so the cache and statement layers (and code
//! built on them) can be exercised end to end without an external engine,
//! and it doubles as a worked example of what a driver owes the core traits:
//!
//! - `prepare` compiles exactly one statement and reports where it ended,
//!   leaving the tail for the statement pool's multi-statement guard.
//! - named parameters are case-sensitive and bind-by-name; an unknown name
//!   is `NoParameter`.
//! - stepping a side-effecting statement performs its work and reports
//!   exhaustion; stepping a select walks materialized rows.
//! - `begin`/`commit`/`rollback` snapshot and restore the whole store.
//!
//! Storage is dynamically typed: column type words in DDL are accepted and
//! ignored, and `integer primary key autoincrement` columns are filled and
//! counted automatically.

mod sql;
mod statement;

pub use statement::MemStatement;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tether_core::{Connection, Error, Id, Result, Value};

#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) columns: Vec<String>,
    pub(crate) autoincrement: Option<usize>,
    pub(crate) next_rowid: i64,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl Table {
    pub(crate) fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| Error::backend(format!("no such column: {name}")))
    }
}

#[derive(Debug, Default)]
pub(crate) struct Store {
    pub(crate) tables: HashMap<String, Table>,
    pub(crate) snapshot: Option<HashMap<String, Table>>,
    pub(crate) last_insert: i64,
}

impl Store {
    pub(crate) fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::backend(format!("no such table: {name}")))
    }
}

/// A connection to a private in-memory store.
///
/// Each `open()` creates an independent store, like an in-memory database
/// file. The connection can be invalidated with [`MemoryConnection::close`],
/// after which every operation reports `InvalidConnection` — useful for
/// exercising validity-check paths.
pub struct MemoryConnection {
    store: Rc<RefCell<Store>>,
    valid: Cell<bool>,
}

impl MemoryConnection {
    /// Open a connection to a fresh, empty store.
    #[must_use]
    pub fn open() -> Self {
        Self {
            store: Rc::new(RefCell::new(Store::default())),
            valid: Cell::new(true),
        }
    }

    /// Invalidate the connection. The store itself is untouched; only this
    /// connection stops answering.
    pub fn close(&self) {
        self.valid.set(false);
    }
}

impl Connection for MemoryConnection {
    type Statement = MemStatement;

    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn prepare(&self, text: &str) -> Result<(MemStatement, usize)> {
        if !self.is_valid() {
            return Err(Error::InvalidConnection);
        }
        let (ast, consumed) = sql::parse(text)?;
        let plan = {
            let store = self.store.borrow();
            statement::resolve(&store, ast)?
        };
        Ok((MemStatement::new(Rc::clone(&self.store), plan), consumed))
    }

    fn execute_immediate(&self, text: &str) -> Result<u64> {
        if !self.is_valid() {
            return Err(Error::InvalidConnection);
        }
        let no_params = HashMap::new();
        let mut rest = text;
        let mut affected = 0;
        loop {
            rest = rest.trim_start_matches(|c: char| c == ';' || c.is_ascii_whitespace());
            if rest.is_empty() {
                break;
            }
            let (ast, consumed) = sql::parse(rest)?;
            let plan = {
                let store = self.store.borrow();
                statement::resolve(&store, ast)?
            };
            affected = {
                let mut store = self.store.borrow_mut();
                statement::execute(&mut store, &plan, &no_params)?
            };
            rest = &rest[consumed..];
        }
        Ok(affected)
    }

    fn last_insert_id(&self) -> Result<Id> {
        Ok(self.store.borrow().last_insert)
    }
}
