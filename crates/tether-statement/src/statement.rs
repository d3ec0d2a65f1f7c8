//! RAII claim on one pooled statement slot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tether_core::{Connection, Error, FromValue, PreparedQuery, Result, Value};

use crate::database::Database;
use crate::slot::StatementSlot;

/// An exclusively held compiled statement.
///
/// Obtained from [`Database::statement`]; while alive, no other acquisition
/// of the same text can reach this slot. Dropping the `Statement` rewinds
/// the cursor, clears the bindings and releases the slot, on every exit
/// path.
///
/// Any bind or extract failure scrubs the slot before the error propagates,
/// so a slot that passed through a failing user is indistinguishable from a
/// fresh one to the next acquirer.
pub struct Statement<'d, C: Connection> {
    db: &'d Database<C>,
    slot: Rc<RefCell<StatementSlot<C::Statement>>>,
}

impl<'d, C: Connection> Statement<'d, C> {
    pub(crate) fn new(db: &'d Database<C>, slot: Rc<RefCell<StatementSlot<C::Statement>>>) -> Self {
        Self { db, slot }
    }

    /// Bind a named parameter.
    ///
    /// On failure (unknown name, store rejection) the slot is reset and its
    /// bindings cleared before the error is returned; no stale partial
    /// bindings survive for the next user.
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut slot = self.slot.borrow_mut();
        match slot.query.bind_value(name, value.into()) {
            Ok(()) => Ok(()),
            Err(err) => {
                slot.scrub();
                Err(err)
            }
        }
    }

    /// Advance to the next result row.
    ///
    /// Returns `true` while rows remain. On exhaustion the statement resets
    /// itself: the cursor is cyclic, and the next `step` replays from the
    /// first row with bindings intact. Callers that expect exhaustion to be
    /// final use [`Statement::step_final`].
    ///
    /// Store errors during stepping scrub the slot before propagating.
    pub fn step(&mut self) -> Result<bool> {
        if !self.db.is_valid() {
            return Err(Error::InvalidConnection);
        }
        let mut slot = self.slot.borrow_mut();
        match slot.query.step() {
            Ok(true) => Ok(true),
            Ok(false) => {
                slot.query.reset();
                Ok(false)
            }
            Err(err) => {
                slot.scrub();
                Err(err)
            }
        }
    }

    /// Step once and demand exhaustion.
    ///
    /// Fails with [`Error::UnexpectedResultRow`] (after resetting the
    /// cursor) if a row was still available.
    pub fn step_final(&mut self) -> Result<()> {
        if self.step()? {
            self.slot.borrow_mut().query.reset();
            return Err(Error::UnexpectedResultRow);
        }
        Ok(())
    }

    /// Extract column `index` of the current row as `T`.
    ///
    /// Extraction is strict: the column's storage class must match `T`
    /// exactly. Index and type failures scrub the slot before propagating.
    pub fn extract<T: FromValue>(&self, index: usize) -> Result<T> {
        let extracted = {
            let slot = self.slot.borrow();
            slot.query.column(index).and_then(T::from_value)
        };
        extracted.map_err(|err| {
            self.slot.borrow_mut().scrub();
            err
        })
    }

    /// Number of columns in this statement's result shape.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.slot.borrow().query.column_count()
    }

    /// Rewind the cursor, keeping bound parameters.
    pub fn reset(&mut self) {
        self.slot.borrow_mut().query.reset();
    }

    /// Null out every bound parameter.
    pub fn clear_bindings(&mut self) {
        self.slot.borrow_mut().query.clear_bindings();
    }
}

impl<C: Connection> Drop for Statement<'_, C> {
    fn drop(&mut self) {
        let mut slot = self.slot.borrow_mut();
        slot.scrub();
        slot.locked = false;
    }
}

impl<C: Connection> fmt::Debug for Statement<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("columns", &self.column_count())
            .finish_non_exhaustive()
    }
}
