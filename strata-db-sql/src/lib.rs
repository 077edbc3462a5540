//! # Strata DB SQL
//!
//! SQL scan layer for strata-db: turns a logical scan description (a
//! table, a chosen index, per-column bounds, an optional temporal period,
//! a direction, and history/metadata projection flags) into an ordered
//! traversal over the versioned key-value store, decoding each physical
//! entry back into a typed row.
//!
//! This crate provides:
//! - Column descriptors and canonical selectors
//! - `ScanSpecs` and the key-range builder
//! - Temporal `Period`s with lazy tx-window resolution
//! - The `RowReader` capability trait and the raw row reader
//! - Row utilities: compatibility checks, digests, batch readers
//!
//! Planning sits above this crate (callers hand it fully-decided scan
//! specifications); the store sits below it (consumed through the
//! iteration traits of `strata-db-core`).
//!
//! ## Example
//!
//! ```ignore
//! use strata_db_sql::{Period, RawRowReader, RowReader, ScanSpecs, SqlError};
//! use strata_db_core::ScanContext;
//!
//! let mut reader = RawRowReader::new(tx, params, table, Period::none(), "", specs)?;
//! let ctx = ScanContext::none();
//! loop {
//!     match reader.read(&ctx).await {
//!         Ok(row) => handle(row),
//!         Err(SqlError::NoMoreRows) => break,
//!         Err(e) => return Err(e),
//!     }
//! }
//! reader.close()?;
//! ```

pub mod descriptor;
pub mod error;
pub mod period;
pub mod reader;
pub mod row;
pub mod scan;
pub mod tx;

// Re-export main types
pub use descriptor::{encode_selector, ColDescriptor, ColSelector, REV_COLUMN, TX_METADATA_COLUMN};
pub use error::{Result, SqlError};
pub use period::{Instant, InstantExp, InstantKind, Period, PeriodBound, TxRange};
pub use reader::{read_all_rows, read_rows_batch, CloseHook, RawRowReader, RowReader};
pub use row::Row;
pub use scan::{key_reader_spec_from, OrdExp, RangeBound, ScanSpecs, TypedValueRange};
pub use tx::{Params, SqlEngine, SqlOptions, SqlTx, TxMetadataParser};
