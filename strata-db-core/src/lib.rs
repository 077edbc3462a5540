//! # Strata DB Core
//!
//! Core library for the strata-db embedded SQL scan engine.
//!
//! This crate provides:
//! - Typed SQL values: `SqlType`, `SqlValue`
//! - Order-preserving key and self-describing payload codecs
//! - Catalog snapshot types: `Column`, `Table`, `Index`, `Catalog`
//! - Storage iteration traits: `Snapshot`, `KeyReader`, `ValueRef`
//! - A tx-versioned in-memory reference store
//!
//! ## Design Principles
//!
//! 1. **Runtime-agnostic**: no forced executor; async at the I/O seam only
//! 2. **Immutable snapshots**: catalogs and store views never mutate under
//!    a running scan
//! 3. **Signals over failures**: end-of-scan and empty-tx-window are
//!    ordinary error variants callers match on
//!
//! ## Example
//!
//! ```ignore
//! use strata_db_core::{MemoryStore, WriteBatch, Snapshot, KeyReaderSpec, ScanContext};
//!
//! let store = MemoryStore::new();
//! store.commit(WriteBatch::new().set(key, payload));
//! let snapshot = store.snapshot();
//! let mut reader = snapshot.new_key_reader(spec)?;
//! let (key, value) = reader.read(&ScanContext::none()).await?;
//! ```

pub mod catalog;
pub mod codec;
pub mod context;
pub mod error;
pub mod memory;
pub mod storage;
pub mod value;

// Re-export main types
pub use catalog::{Catalog, Column, Index, Table, DEFAULT_MAX_LEN, PG_TYPE_TABLE};
pub use codec::{
    decode_value, decode_value_len, encode_as_key, encode_id, encode_row_payload, encode_value,
    map_key, ENC_ID_LEN, ENC_LEN_LEN, KEY_VAL_PREFIX_UPPER_BOUND, MAPPED_PREFIX, NULL_LEN,
};
pub use context::ScanContext;
pub use error::{Error, Result};
pub use memory::{MemorySnapshot, MemoryStore, WriteBatch};
pub use storage::{EmptyKeyReader, Filter, KeyReader, KeyReaderSpec, Snapshot, TxMetadata, ValueRef};
pub use value::{SqlType, SqlValue};
