//! Error taxonomy shared across the workspace.
//!
//! One enum covers both subsystems. Cache-consistency violations
//! (`DuplicateIdentity`, `Overflow`) are never absorbed internally; statement
//! errors are surfaced after the slot involved has been restored to a clean,
//! reusable state. Nothing here retries.

use crate::identifiers::Id;
use std::fmt;

/// Convenience alias used by every fallible operation in the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All error conditions reported by the cache and statement subsystems,
/// plus pass-throughs from the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation attempted on a connection that failed its validity check.
    InvalidConnection,
    /// Statement text held more than one statement where exactly one is
    /// tracked per slot.
    TooManyStatements {
        /// The offending statement text.
        statement: String,
    },
    /// Checked lookup found no matching persisted row.
    BadIdentifier {
        /// Table that was consulted.
        table: &'static str,
        /// Identifier that was not found.
        id: Id,
    },
    /// Dereference of a handle with no bound record.
    UnboundHandle,
    /// A counter would exceed its representable range. Counters never wrap.
    Overflow {
        /// Which counter saturated.
        what: &'static str,
    },
    /// A caller expecting no further rows still found one.
    UnexpectedResultRow,
    /// Column extraction requested a type the column does not hold.
    ValueType {
        /// Type the caller asked for.
        expected: &'static str,
        /// Storage class actually present.
        found: &'static str,
    },
    /// Column index outside the result row.
    ResultIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of columns in the row.
        count: usize,
    },
    /// An identifier was assigned to a record while another record already
    /// holds it. Indicates a bug in id allocation upstream.
    DuplicateIdentity {
        /// Table family of the identity map.
        table: &'static str,
        /// The doubly-assigned identifier.
        id: Id,
    },
    /// Bind named a parameter the statement does not have.
    NoParameter {
        /// Parameter name as given, including any prefix sigil.
        name: String,
    },
    /// Column extraction attempted while not positioned on a result row.
    NoResultRow,
    /// A polymorphic lookup found the record, but its concrete variant did
    /// not match the requested type.
    TypeMismatch {
        /// Table family of the identity map.
        table: &'static str,
        /// Identifier of the mismatching record.
        id: Id,
    },
    /// Operation on a record already marked for deletion.
    RecordDeleted,
    /// The backing store rejected statement text at prepare time.
    Prepare {
        /// The offending statement text.
        statement: String,
        /// The store's own description of the failure.
        message: String,
    },
    /// General execution failure reported by the backing store.
    Backend {
        /// The store's own description of the failure.
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConnection => write!(f, "database connection is not valid"),
            Error::TooManyStatements { statement } => {
                write!(f, "more than one statement in {statement:?}")
            }
            Error::BadIdentifier { table, id } => {
                write!(f, "no row with id {id} in table {table:?}")
            }
            Error::UnboundHandle => write!(f, "handle is not bound to a record"),
            Error::Overflow { what } => write!(f, "{what} counter would overflow"),
            Error::UnexpectedResultRow => {
                write!(f, "statement yielded a result row when none was expected")
            }
            Error::ValueType { expected, found } => {
                write!(f, "column holds {found}, not {expected}")
            }
            Error::ResultIndexOutOfRange { index, count } => {
                write!(f, "column index {index} out of range for {count}-column row")
            }
            Error::DuplicateIdentity { table, id } => {
                write!(f, "id {id} already cached for table {table:?}")
            }
            Error::NoParameter { name } => {
                write!(f, "statement has no parameter named {name:?}")
            }
            Error::NoResultRow => write!(f, "no result row available"),
            Error::TypeMismatch { table, id } => {
                write!(f, "record {id} in table {table:?} is not the requested variant")
            }
            Error::RecordDeleted => write!(f, "record is marked for deletion"),
            Error::Prepare { statement, message } => {
                write!(f, "could not prepare {statement:?}: {message}")
            }
            Error::Backend { message } => write!(f, "backing store error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Shorthand for a general backing-store failure.
    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend {
            message: message.into(),
        }
    }
}
