//! Reference-counted accessor to a cached record.

use std::cell::{Ref, RefMut};
use std::fmt;
use std::rc::Rc;

use tether_core::{Error, Id, Result};

use crate::cached::{Lifecycle, RecordCell};

/// The only sanctioned way client code touches a cached record.
///
/// A handle either aliases exactly one cached record or is unbound. Its
/// whole job is reference-count discipline:
///
/// - binding or copying a handle bumps the record's counter, and fails with
///   `Overflow` rather than wrap — the failed copy leaves both sides
///   unchanged;
/// - moving a handle transfers the claim without touching the counter;
/// - dropping a handle releases the claim and can never fail, on every exit
///   route.
///
/// Copying is therefore spelled [`Handle::try_clone`]; there is
/// deliberately no `Clone` impl.
///
/// Two handles are equal iff they alias the same record — identity, not
/// value, comparison.
pub struct Handle<T> {
    cell: Option<Rc<RecordCell<T>>>,
}

impl<T> Handle<T> {
    /// An unbound handle. Dereferencing it fails with
    /// [`Error::UnboundHandle`]; the check allocates nothing.
    #[must_use]
    pub fn unbound() -> Self {
        Self { cell: None }
    }

    /// Bind to a record, claiming one reference.
    pub(crate) fn bind(cell: Rc<RecordCell<T>>) -> Result<Self> {
        cell.claim()?;
        Ok(Self { cell: Some(cell) })
    }

    /// Whether this handle aliases a record.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.cell.is_some()
    }

    /// A second handle to the same record.
    ///
    /// Fails with `Overflow` if the record's counter is saturated; the
    /// record and this handle are left untouched. Cloning an unbound handle
    /// yields another unbound handle.
    pub fn try_clone(&self) -> Result<Self> {
        match &self.cell {
            None => Ok(Self::unbound()),
            Some(cell) => Self::bind(Rc::clone(cell)),
        }
    }

    /// Shared access to the record's value.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently mutably borrowed through another
    /// handle — the usual single-threaded `RefCell` discipline. The cache
    /// guarantees single-instance identity, not write-conflict ordering.
    pub fn value(&self) -> Result<Ref<'_, T>> {
        match &self.cell {
            Some(cell) => Ok(cell.value.borrow()),
            None => Err(Error::UnboundHandle),
        }
    }

    /// Exclusive access to the record's value. Mutations are visible
    /// through every aliasing handle.
    ///
    /// # Panics
    ///
    /// Panics if the value is currently borrowed elsewhere; see
    /// [`Handle::value`].
    pub fn value_mut(&self) -> Result<RefMut<'_, T>> {
        match &self.cell {
            Some(cell) => Ok(cell.value.borrow_mut()),
            None => Err(Error::UnboundHandle),
        }
    }

    /// The record's persisted identifier, if it has one yet.
    #[must_use]
    pub fn id(&self) -> Option<Id> {
        self.cell.as_ref().and_then(|cell| cell.identity())
    }

    /// The record's lifecycle state; `None` for an unbound handle.
    #[must_use]
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.cell.as_ref().map(|cell| cell.lifecycle())
    }

    /// How many handles (this one included) alias the record. Diagnostic.
    #[must_use]
    pub fn handle_count(&self) -> Option<u32> {
        self.cell.as_ref().map(|cell| cell.handles())
    }

    pub(crate) fn record(&self) -> Option<&Rc<RecordCell<T>>> {
        self.cell.as_ref()
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            cell.release();
        }
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.cell, &other.cell) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cell {
            Some(cell) => f
                .debug_struct("Handle")
                .field("id", &cell.identity())
                .field("lifecycle", &cell.lifecycle())
                .field("handles", &cell.handles())
                .finish(),
            None => f.write_str("Handle(unbound)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: &str) -> Rc<RecordCell<String>> {
        Rc::new(RecordCell::loaded(value.to_string(), 1))
    }

    #[test]
    fn unbound_handle_dereference_fails() {
        let handle: Handle<String> = Handle::default();
        assert!(!handle.is_bound());
        assert_eq!(handle.value().unwrap_err(), Error::UnboundHandle);
        assert_eq!(handle.value_mut().unwrap_err(), Error::UnboundHandle);
        assert_eq!(handle.id(), None);
    }

    #[test]
    fn clone_and_drop_keep_the_count_exact() {
        let cell = cell("Mars");
        let h1 = Handle::bind(Rc::clone(&cell)).unwrap();
        assert_eq!(cell.handles(), 1);
        let h2 = h1.try_clone().unwrap();
        let h3 = h2.try_clone().unwrap();
        assert_eq!(cell.handles(), 3);
        drop(h2);
        assert_eq!(cell.handles(), 2);
        drop(h1);
        drop(h3);
        assert_eq!(cell.handles(), 0);
    }

    #[test]
    fn moving_does_not_touch_the_count() {
        let cell = cell("Mars");
        let h1 = Handle::bind(Rc::clone(&cell)).unwrap();
        let h2 = h1;
        assert_eq!(cell.handles(), 1);
        drop(h2);
        assert_eq!(cell.handles(), 0);
    }

    #[test]
    fn saturated_counter_rejects_the_copy_and_stays_put() {
        let cell = cell("Mars");
        let handle = Handle::bind(Rc::clone(&cell)).unwrap();
        cell.set_handles_for_test(u32::MAX);
        let err = handle.try_clone().unwrap_err();
        assert_eq!(err, Error::Overflow { what: "handle" });
        assert_eq!(cell.handles(), u32::MAX);
        // Restore so the drop's debug assertion stays honest.
        cell.set_handles_for_test(1);
    }

    #[test]
    fn equality_is_aliasing() {
        let a = cell("Mars");
        let b = cell("Mars");
        let ha1 = Handle::bind(Rc::clone(&a)).unwrap();
        let ha2 = ha1.try_clone().unwrap();
        let hb = Handle::bind(Rc::clone(&b)).unwrap();
        assert_eq!(ha1, ha2);
        assert_ne!(ha1, hb); // same value, different record
        assert_eq!(Handle::<String>::unbound(), Handle::unbound());
        assert_ne!(ha1, Handle::unbound());
    }

    #[test]
    fn mutation_is_visible_through_aliases() {
        let cell = cell("Mars");
        let h1 = Handle::bind(Rc::clone(&cell)).unwrap();
        let h2 = h1.try_clone().unwrap();
        h1.value_mut().unwrap().push_str(" IV");
        assert_eq!(*h2.value().unwrap(), "Mars IV");
    }
}
