//! One compiled query plus its exclusivity flag.

use tether_core::PreparedQuery;

/// A pooled compiled query. `locked` marks it claimed by a live
/// [`crate::Statement`]; the pool never hands out a locked slot.
pub(crate) struct StatementSlot<Q> {
    pub(crate) query: Q,
    pub(crate) locked: bool,
}

impl<Q: PreparedQuery> StatementSlot<Q> {
    pub(crate) fn new(query: Q) -> Self {
        Self {
            query,
            locked: false,
        }
    }

    /// Rewind the cursor and null out every binding. Run on every
    /// lock-to-unlock transition and again on reuse, so a slot always
    /// starts clean no matter how its previous user exited.
    pub(crate) fn scrub(&mut self) {
        self.query.reset();
        self.query.clear_bindings();
    }
}
