//! Engine and transaction handles.
//!
//! `SqlEngine` holds what outlives any single scan: the key-namespace
//! prefix, the catalog, and the optional tx-metadata parser hook.
//! `SqlTx` pairs the engine with one store snapshot and is what row
//! readers borrow their context from. Both are cheap to clone; neither
//! mutates under a running scan.

use crate::error::{Result, SqlError};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use strata_db_core::storage::{KeyReader, KeyReaderSpec, Snapshot};
use strata_db_core::{Catalog, SqlValue, Table};

/// Named parameter bindings, read-only for the lifetime of a reader.
pub type Params = HashMap<String, SqlValue>;

/// Engine hook turning raw tx-metadata extra bytes into a JSON value.
pub type TxMetadataParser =
    Arc<dyn Fn(&[u8]) -> std::result::Result<JsonValue, String> + Send + Sync>;

/// Engine-level configuration.
#[derive(Debug, Clone)]
pub struct SqlOptions {
    /// Key namespace this engine's entries live under; every mapped key
    /// starts with it.
    pub prefix: Vec<u8>,
    /// Row-batch size used by the batched read loop.
    pub batch_size: usize,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            batch_size: 100,
        }
    }
}

/// Long-lived engine state shared by transactions.
pub struct SqlEngine {
    opts: SqlOptions,
    catalog: Catalog,
    parse_tx_metadata: Option<TxMetadataParser>,
}

impl SqlEngine {
    pub fn new(opts: SqlOptions) -> Self {
        Self {
            opts,
            catalog: Catalog::new(),
            parse_tx_metadata: None,
        }
    }

    /// Install the tx-metadata parser hook.
    pub fn with_tx_metadata_parser(mut self, parser: TxMetadataParser) -> Self {
        self.parse_tx_metadata = Some(parser);
        self
    }

    /// Catalog access during schema registration.
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Start a transaction over one store snapshot.
    pub fn begin(self: &Arc<Self>, snapshot: Arc<dyn Snapshot>) -> SqlTx {
        SqlTx {
            engine: self.clone(),
            snapshot,
        }
    }
}

/// One transaction: engine + store snapshot.
#[derive(Clone)]
pub struct SqlTx {
    engine: Arc<SqlEngine>,
    snapshot: Arc<dyn Snapshot>,
}

impl SqlTx {
    pub fn catalog(&self) -> &Catalog {
        self.engine.catalog()
    }

    /// Resolve a table by name.
    pub fn table(&self, name: &str) -> Result<Arc<Table>> {
        self.engine
            .catalog()
            .table(name)
            .cloned()
            .ok_or(SqlError::IllegalArguments("unknown table"))
    }

    pub fn prefix(&self) -> &[u8] {
        &self.engine.opts.prefix
    }

    pub fn batch_size(&self) -> usize {
        self.engine.opts.batch_size
    }

    /// Construct an ordered key reader over this transaction's snapshot.
    pub fn new_key_reader(&self, spec: KeyReaderSpec) -> Result<Box<dyn KeyReader>> {
        Ok(self.snapshot.new_key_reader(spec)?)
    }

    /// Parse tx-metadata extra bytes through the engine hook.
    pub fn parse_tx_metadata(&self, extra: &[u8]) -> Result<JsonValue> {
        let Some(parser) = &self.engine.parse_tx_metadata else {
            return Err(SqlError::InvalidTxMetadata(
                "no tx metadata parser configured".to_string(),
            ));
        };
        parser(extra).map_err(SqlError::InvalidTxMetadata)
    }

    /// Highest committed tx id visible to this transaction.
    pub fn current_tx_id(&self) -> u64 {
        self.snapshot.current_tx_id()
    }

    /// Earliest visible tx committed at/after `ts`.
    pub fn first_tx_since(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64> {
        Ok(self.snapshot.first_tx_since(ts, inclusive)?)
    }

    /// Latest visible tx committed at/before `ts`.
    pub fn last_tx_until(&self, ts: DateTime<Utc>, inclusive: bool) -> Result<u64> {
        Ok(self.snapshot.last_tx_until(ts, inclusive)?)
    }
}
