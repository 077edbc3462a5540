//! Error types for strata-db-core

use crate::value::SqlType;
use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// `NoMoreEntries` and `TxNotFound` are signals rather than failures:
/// callers are expected to match on them to detect the end of a scan or
/// an empty transaction window.
#[derive(Error, Debug)]
pub enum Error {
    /// Normal end-of-scan signal from a key reader
    #[error("no more entries")]
    NoMoreEntries,

    /// A referenced transaction does not exist in the snapshot
    #[error("tx not found")]
    TxNotFound,

    /// Stored bytes do not match their declared layout
    #[error("corrupted data: {0}")]
    CorruptedData(&'static str),

    /// The scan context was cancelled or its deadline expired
    #[error("scan cancelled")]
    Cancelled,

    /// The reader was used after `close`
    #[error("key reader already closed")]
    AlreadyClosed,

    /// Invalid caller-supplied arguments
    #[error("illegal arguments: {0}")]
    IllegalArguments(&'static str),

    /// Value type cannot appear in an order-preserving index key
    #[error("type {0} is not key-encodable")]
    UnsupportedKeyType(SqlType),

    /// Comparison attempted across mismatched value types
    #[error("cannot compare {0} with {1}")]
    NotComparable(SqlType, SqlType),

    /// Variable-width value exceeds the column's declared key width
    #[error("value of {len} bytes exceeds maximum key length {max_len}")]
    MaxKeyLenExceeded { len: usize, max_len: usize },
}

impl Error {
    /// Create a corrupted-data error with a static context message
    pub fn corrupted(msg: &'static str) -> Self {
        Error::CorruptedData(msg)
    }
}
