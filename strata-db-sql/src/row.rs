//! Row value model.
//!
//! A row is two consistent views over the same typed values: an ordered
//! position vector (one slot per projected column) and a selector map
//! addressing the same values by canonical selector string. Rows are
//! immutable once produced; the caller owns them.

use crate::descriptor::{ColDescriptor, ColSelector};
use crate::error::{Result, SqlError};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::HashMap;
use strata_db_core::codec::encode_value;
use strata_db_core::SqlValue;

/// One projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Values in projection order; position `i` corresponds to the i-th
    /// column descriptor of the producing reader.
    pub values_by_position: Vec<SqlValue>,
    /// The same values addressed by canonical selector.
    pub values_by_selector: HashMap<String, SqlValue>,
}

impl Row {
    /// Rows are selector-compatible when both carry every requested
    /// selector and the corresponding values compare equal. A selector
    /// missing from either row is an error, not a mismatch.
    pub fn compatible(
        &self,
        other: &Row,
        selectors: &[ColSelector],
        table: &str,
    ) -> Result<bool> {
        for sel in selectors {
            let selector = sel.resolve(table);

            let v1 = self
                .values_by_selector
                .get(&selector)
                .ok_or_else(|| SqlError::InvalidColumn(selector.clone()))?;
            let v2 = other
                .values_by_selector
                .get(&selector)
                .ok_or_else(|| SqlError::InvalidColumn(selector.clone()))?;

            if v1.cmp_same_type(v2)? != Ordering::Equal {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Stable SHA-256 digest of the row: for each position, the position
    /// index as `u32` BE, then (for non-NULL values only) the value's
    /// self-describing encoding. Order- and type-sensitive.
    pub fn digest(&self, cols: &[ColDescriptor]) -> Result<[u8; 32]> {
        if cols.len() != self.values_by_position.len() {
            return Err(SqlError::IllegalArguments(
                "digest column list does not match row width",
            ));
        }

        let mut hasher = Sha256::new();
        for (i, value) in self.values_by_position.iter().enumerate() {
            hasher.update((i as u32).to_be_bytes());
            if value.is_null() {
                continue;
            }
            hasher.update(encode_value(value));
        }

        Ok(hasher.finalize().into())
    }
}
