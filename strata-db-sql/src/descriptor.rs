//! Column descriptors and selectors.
//!
//! A selector is the canonical string address of a column within a row:
//! `aggFn(table.column)`, with an empty aggregation for plain columns:
//! e.g. `(t.id)` or `COUNT(t.id)`. Readers key their selector maps by it,
//! and upper layers address row values through it.

use serde::{Deserialize, Serialize};
use strata_db_core::SqlType;

/// Synthetic revision column projected by history scans.
pub const REV_COLUMN: &str = "_rev";

/// Synthetic tx-metadata column projected on request.
pub const TX_METADATA_COLUMN: &str = "_md";

/// Encode the canonical selector string.
pub fn encode_selector(agg_fn: &str, table: &str, column: &str) -> String {
    format!("{agg_fn}({table}.{column})")
}

/// Fully-resolved column address within a projected row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColDescriptor {
    /// Aggregation tag; empty for plain columns.
    pub agg_fn: String,
    /// Table alias the column is projected under.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Projected SQL type.
    pub ty: SqlType,
}

impl ColDescriptor {
    /// Plain (non-aggregated) descriptor.
    pub fn new(table: impl Into<String>, column: impl Into<String>, ty: SqlType) -> Self {
        Self {
            agg_fn: String::new(),
            table: table.into(),
            column: column.into(),
            ty,
        }
    }

    /// Canonical selector of this descriptor.
    pub fn selector(&self) -> String {
        encode_selector(&self.agg_fn, &self.table, &self.column)
    }
}

/// Possibly-unqualified column reference, resolved against a default
/// table alias at use sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColSelector {
    /// Aggregation tag; empty for plain columns.
    pub agg_fn: String,
    /// Explicit table alias; `None` resolves to the scan's alias.
    pub table: Option<String>,
    /// Column name.
    pub column: String,
}

impl ColSelector {
    /// Unqualified plain column reference.
    pub fn col(column: impl Into<String>) -> Self {
        Self {
            agg_fn: String::new(),
            table: None,
            column: column.into(),
        }
    }

    /// Resolve to a canonical selector under `default_table`.
    pub fn resolve(&self, default_table: &str) -> String {
        let table = self.table.as_deref().unwrap_or(default_table);
        encode_selector(&self.agg_fn, table, &self.column)
    }
}
