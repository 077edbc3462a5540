//! Catalog snapshot types.
//!
//! These types describe the tables and indexes a scan runs against. They
//! are immutable snapshots borrowed from the enclosing transaction: the
//! scan core never mutates them, and they must outlive any reader built
//! over them (hence `Arc` throughout).
//!
//! A table keeps the highest column id it ever assigned (`max_col_id`).
//! Stored payloads may still carry values for columns dropped from the
//! current set; ids at or below the watermark decode as "dropped, skip",
//! ids above it are corruption.

use crate::error::{Error, Result};
use crate::value::SqlType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved name of the virtual catalog table: it exists for wire-protocol
/// compatibility and holds no physical rows.
pub const PG_TYPE_TABLE: &str = "pg_type";

/// Default key width for variable-length columns without an explicit one.
pub const DEFAULT_MAX_LEN: usize = 256;

/// Column descriptor within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Table-scoped column id; never reused after a drop.
    pub id: u32,
    /// Column name, unique within the table's current set.
    pub name: String,
    /// Declared SQL type.
    pub ty: SqlType,
    /// Maximum byte width used for key padding of VARCHAR/BLOB values;
    /// ignored by fixed-width types.
    pub max_len: usize,
}

impl Column {
    /// Create a column with the default key width.
    pub fn new(id: u32, name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            id,
            name: name.into(),
            ty,
            max_len: DEFAULT_MAX_LEN,
        }
    }

    /// Override the key width (VARCHAR/BLOB).
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

/// Index over a table: an ordered tuple of columns whose key encodings
/// define the physical order of its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Table-scoped index id; id 0 is the primary index by convention.
    pub id: u32,
    /// Indexed columns in declared order.
    pub cols: Vec<Column>,
}

/// Immutable table snapshot.
#[derive(Debug, Clone)]
pub struct Table {
    id: u32,
    name: String,
    /// Current columns, sorted by id ascending.
    cols: Vec<Column>,
    /// Highest column id ever assigned, dropped columns included.
    max_col_id: u32,
    indexes: Vec<Arc<Index>>,
}

impl Table {
    /// Build a table snapshot. Columns are sorted by id; duplicate ids
    /// are rejected. `max_col_id` starts at the highest present id.
    pub fn new(id: u32, name: impl Into<String>, cols: Vec<Column>) -> Result<Self> {
        let mut cols = cols;
        cols.sort_by_key(|c| c.id);
        if cols.windows(2).any(|w| w[0].id == w[1].id) {
            return Err(Error::IllegalArguments("duplicate column id in table"));
        }
        let max_col_id = cols.last().map(|c| c.id).unwrap_or(0);

        Ok(Self {
            id,
            name: name.into(),
            cols,
            max_col_id,
            indexes: Vec::new(),
        })
    }

    /// Attach an index; declared columns must belong to the table.
    pub fn with_index(mut self, index: Index) -> Result<Self> {
        if index.cols.is_empty() {
            return Err(Error::IllegalArguments("index must cover at least one column"));
        }
        for col in &index.cols {
            if self.column_by_id(col.id).is_none() {
                return Err(Error::IllegalArguments("index column not in table"));
            }
        }
        self.indexes.push(Arc::new(index));
        Ok(self)
    }

    /// Drop a column from the current set; the id watermark is retained
    /// so stored payloads still decode.
    pub fn drop_column(&mut self, name: &str) -> Result<()> {
        let before = self.cols.len();
        self.cols.retain(|c| c.name != name);
        if self.cols.len() == before {
            return Err(Error::IllegalArguments("no such column to drop"));
        }
        Ok(())
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current columns, sorted by id ascending.
    pub fn cols(&self) -> &[Column] {
        &self.cols
    }

    /// Highest column id ever assigned to this table.
    pub fn max_col_id(&self) -> u32 {
        self.max_col_id
    }

    /// Look up a current column by id; dropped ids return `None`.
    pub fn column_by_id(&self, id: u32) -> Option<&Column> {
        self.cols
            .binary_search_by_key(&id, |c| c.id)
            .ok()
            .map(|i| &self.cols[i])
    }

    /// Look up an attached index by id.
    pub fn index(&self, id: u32) -> Option<&Arc<Index>> {
        self.indexes.iter().find(|ix| ix.id == id)
    }

    /// The primary index (id 0).
    pub fn primary_index(&self) -> Option<&Arc<Index>> {
        self.index(0)
    }

    /// True for virtual catalog tables that hold no physical rows.
    pub fn is_virtual(&self) -> bool {
        self.name == PG_TYPE_TABLE
    }
}

/// Catalog snapshot: the tables visible to one transaction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, Arc<Table>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table snapshot, replacing any previous version of it.
    pub fn put_table(&mut self, table: Table) -> Arc<Table> {
        let table = Arc::new(table);
        self.tables.insert(table.name().to_string(), table.clone());
        table
    }

    pub fn table(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.get(name)
    }
}
