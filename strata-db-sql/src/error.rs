//! Error types for the SQL scan layer

use thiserror::Error;

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, SqlError>;

/// SQL scan errors
///
/// `NoMoreRows` is the normal scan-termination signal; callers must
/// distinguish it from failure. Store-level errors arrive wrapped in
/// `Core`; the reader remaps the two store signals (`NoMoreEntries`,
/// `TxNotFound`) before they ever reach a caller.
#[derive(Error, Debug)]
pub enum SqlError {
    /// Error from strata-db-core
    #[error("core error: {0}")]
    Core(#[from] strata_db_core::Error),

    /// Normal scan termination
    #[error("no more rows")]
    NoMoreRows,

    /// Invalid reader construction arguments
    #[error("illegal arguments: {0}")]
    IllegalArguments(&'static str),

    /// Selector requested from a row that does not carry it
    #[error("invalid column: {0}")]
    InvalidColumn(String),

    /// Tx metadata parser present but failing
    #[error("invalid tx metadata: {0}")]
    InvalidTxMetadata(String),

    /// Period expression references an unbound parameter
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// Period instant expression is malformed for its kind
    #[error("invalid period: {0}")]
    InvalidPeriod(&'static str),
}

impl SqlError {
    /// Create a corrupted-data error (surfaced through the core kind so
    /// operators see one corruption signal regardless of which layer
    /// detected it).
    pub fn corrupted(msg: &'static str) -> Self {
        SqlError::Core(strata_db_core::Error::CorruptedData(msg))
    }

    /// True for the corruption kind, whichever layer produced it.
    pub fn is_corrupted_data(&self) -> bool {
        matches!(self, SqlError::Core(strata_db_core::Error::CorruptedData(_)))
    }
}
