//! Primary-key cursor yielding cached handles.

use std::marker::PhantomData;

use tether_core::{Connection, Result, quote_ident};
use tether_statement::Statement;

use crate::handle::Handle;
use crate::record::Record;
use crate::session::Session;

/// Iterates a `select` over a primary-key column, turning each row into an
/// unchecked handle through the session's cache.
///
/// The default statement selects every identifier in the record's table; a
/// custom query may be supplied as long as its first column is the
/// primary key. Ids coming off the cursor are by construction known to the
/// store, which is what makes the unchecked load the right one.
///
/// Iteration ends when the cursor is exhausted; because pooled statements
/// step cyclically, a fresh iteration can be had by constructing a new
/// reader (or reusing this one after it returned `None`, which replays
/// from the first row).
pub struct Reader<'s, C: Connection, T: Record<Conn = C>> {
    session: &'s Session<C>,
    statement: Statement<'s, C>,
    _record: PhantomData<fn() -> T>,
}

impl<'s, C: Connection, T: Record<Conn = C>> Reader<'s, C, T> {
    /// Reader over every row of `T`'s table.
    pub fn new(session: &'s Session<C>) -> Result<Self> {
        let sql = format!(
            "select {} from {}",
            quote_ident(T::PRIMARY_KEY),
            quote_ident(T::TABLE)
        );
        Self::with_query(session, &sql)
    }

    /// Reader over a caller-supplied selection whose first column is `T`'s
    /// primary key.
    pub fn with_query(session: &'s Session<C>, text: &str) -> Result<Self> {
        let statement = session.database().statement(text)?;
        Ok(Self {
            session,
            statement,
            _record: PhantomData,
        })
    }
}

impl<'s, C: Connection, T: Record<Conn = C>> Iterator for Reader<'s, C, T> {
    type Item = Result<Handle<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.statement.step() {
            Ok(true) => Some(
                self.statement
                    .extract::<i64>(0)
                    .and_then(|id| self.session.load_unchecked::<T>(id)),
            ),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Planet, seeded_session};

    #[test]
    fn reads_every_row_into_the_cache() {
        let session = seeded_session();
        let handles: Vec<_> = Reader::<_, Planet>::new(&session)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(session.stats().tracked, 3);

        // Rows already cached come back as the same record.
        let again = session.load_unchecked::<Planet>(1).unwrap();
        assert!(handles.contains(&again));
    }

    #[test]
    fn custom_queries_filter_the_cursor() {
        let session = seeded_session();
        let reader = Reader::<_, Planet>::with_query(
            &session,
            "select planet_id from planets where size = 'medium'",
        )
        .unwrap();
        let handles: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].value().unwrap().name, "Venus");
    }

    #[test]
    fn nested_loads_during_iteration_do_not_disturb_the_cursor() {
        // The reader holds a slot for the id select; each load_unchecked
        // acquires further statements, some with identical text to other
        // live users. Exclusive slots keep the cursors independent.
        let session = seeded_session();
        let names: Vec<String> = Reader::<_, Planet>::new(&session)
            .unwrap()
            .map(|handle| handle.map(|h| h.value().unwrap().name.clone()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(names, ["Mercury", "Venus", "Jupiter"]);
    }
}
