//! Storage iteration traits consumed by the scan core.
//!
//! The scan core does not own a store; it drives one through the traits
//! here. An embedder provides a [`Snapshot`] (one transaction's view of
//! the store) that hands out [`KeyReader`]s: ordered iterators over a
//! byte-key interval described by a [`KeyReaderSpec`].
//!
//! ## Lifecycle
//!
//! A key reader is exclusively owned by the row reader built over it.
//! Call `read` (or `read_between` when a tx window applies) until it
//! returns [`Error::NoMoreEntries`], then `close` to release store
//! resources. `reset` rewinds to the seek position.
//!
//! The traits are async at the I/O seam only: spec construction and
//! bookkeeping stay synchronous.

use crate::context::ScanContext;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ============================================================================
// Specs and entry metadata
// ============================================================================

/// Store-side entry filters applied during iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Skip entries whose expiration instant has passed.
    IgnoreExpired,
    /// Skip entries whose latest visible revision is a delete marker.
    IgnoreDeleted,
}

/// Description of one ordered key traversal.
///
/// `seek_key`/`end_key` bound the interval in scan direction: for a
/// descending scan the seek key is the high end. Both bounds are
/// byte-inclusive; high bounds built by the range builder carry an
/// upper-bound sentinel byte so partial key prefixes stay inclusive.
#[derive(Debug, Clone, Default)]
pub struct KeyReaderSpec {
    pub seek_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub inclusive_seek: bool,
    pub inclusive_end: bool,
    /// Every yielded key must start with this prefix.
    pub prefix: Vec<u8>,
    pub desc_order: bool,
    pub filters: Vec<Filter>,
    /// Yield every revision of each key (ascending revision order)
    /// instead of only the latest visible one.
    pub include_history: bool,
}

/// Opaque per-transaction metadata attached to entries at commit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxMetadata {
    extra: Option<Vec<u8>>,
}

impl TxMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata carrying an engine-defined extra payload.
    pub fn with_extra(extra: Vec<u8>) -> Self {
        Self { extra: Some(extra) }
    }

    /// The engine-defined payload, if the committing transaction set one.
    pub fn extra(&self) -> Option<&[u8]> {
        self.extra.as_deref()
    }
}

/// Lazy handle to one stored entry's value.
///
/// Resolution is deferred so the store can skip payload I/O for entries
/// the caller filters out before reading.
pub trait ValueRef: Send + Sync {
    /// Resolve the payload bytes.
    fn resolve(&self) -> Result<Vec<u8>>;

    /// History counter: how many times this entry's key has been written
    /// up to and including this revision (1-based).
    fn hc(&self) -> u64;

    /// Metadata of the transaction that wrote this revision.
    fn tx_metadata(&self) -> Option<&TxMetadata>;
}

// ============================================================================
// Iteration traits
// ============================================================================

/// Ordered iterator over a key interval of one snapshot.
#[async_trait]
pub trait KeyReader: Send {
    /// Advance one entry in the configured direction.
    ///
    /// Ends with [`Error::NoMoreEntries`]; checks `ctx` before any I/O.
    async fn read(&mut self, ctx: &ScanContext) -> Result<(Vec<u8>, Box<dyn ValueRef>)>;

    /// As [`read`](Self::read), constrained to entries written by
    /// transactions in `[initial_tx_id, final_tx_id]`.
    async fn read_between(
        &mut self,
        ctx: &ScanContext,
        initial_tx_id: u64,
        final_tx_id: u64,
    ) -> Result<(Vec<u8>, Box<dyn ValueRef>)>;

    /// Rewind to the seek position.
    fn reset(&mut self) -> Result<()>;

    /// Release store resources. Tolerates repeated calls.
    fn close(&mut self) -> Result<()>;
}

/// One transaction's view of the store.
pub trait Snapshot: Send + Sync {
    /// Construct an ordered key reader for the given spec.
    fn new_key_reader(&self, spec: KeyReaderSpec) -> Result<Box<dyn KeyReader>>;

    /// Highest committed tx id visible to this snapshot.
    fn current_tx_id(&self) -> u64;

    /// Earliest tx committed at (`inclusive`) or strictly after `ts`.
    /// [`Error::TxNotFound`] if no visible tx qualifies.
    fn first_tx_since(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64>;

    /// Latest tx committed at (`inclusive`) or strictly before `ts`.
    /// [`Error::TxNotFound`] if no visible tx qualifies.
    fn last_tx_until(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64>;
}

// ============================================================================
// Empty reader
// ============================================================================

/// Key reader over a table known to hold no physical entries (virtual
/// catalog tables). Yields nothing, costs nothing.
#[derive(Debug, Default)]
pub struct EmptyKeyReader;

#[async_trait]
impl KeyReader for EmptyKeyReader {
    async fn read(&mut self, ctx: &ScanContext) -> Result<(Vec<u8>, Box<dyn ValueRef>)> {
        ctx.check()?;
        Err(Error::NoMoreEntries)
    }

    async fn read_between(
        &mut self,
        ctx: &ScanContext,
        _initial_tx_id: u64,
        _final_tx_id: u64,
    ) -> Result<(Vec<u8>, Box<dyn ValueRef>)> {
        ctx.check()?;
        Err(Error::NoMoreEntries)
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
