//! Scan specifications and the key-range builder.
//!
//! A `ScanSpecs` describes one physical traversal: which index, which
//! per-column bounds, which direction, and which synthetic columns the
//! reader should project. The range builder lowers it to a concrete
//! `[seek_key, end_key]` byte interval for the store's key iterator.
//!
//! ## Range derivation
//!
//! Starting from the shared `[prefix][tag][table id][index id]` prefix,
//! the builder walks the index columns in declared order, extending a low
//! key and a high key with each column's encoded bound. A side freezes as
//! soon as a column lacks that bound (or any range at all); frozen sides
//! ignore later columns; a gap in the range map ends key refinement.
//!
//! The high key always gains the upper-bound sentinel byte, so every key
//! beginning with the composed prefix compares `<=` to it: partial key
//! prefixes stay inclusive. Bound inclusivity flags are carried on the
//! spec for the predicate layer above; the byte interval itself is always
//! inclusive, exactly like the seek/end flags handed to the store.

use crate::descriptor::ColSelector;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use strata_db_core::codec::{encode_as_key, encode_id, map_key, KEY_VAL_PREFIX_UPPER_BOUND, MAPPED_PREFIX};
use strata_db_core::storage::{Filter, KeyReaderSpec};
use strata_db_core::{Index, SqlValue, Table};

/// One side of a typed column range.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: SqlValue,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn inclusive(value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
            inclusive: true,
        }
    }

    pub fn exclusive(value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
            inclusive: false,
        }
    }
}

/// Optional low/high bounds over one column; an absent side is open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypedValueRange {
    pub l: Option<RangeBound>,
    pub h: Option<RangeBound>,
}

impl TypedValueRange {
    /// Point range `[v, v]`.
    pub fn point(value: impl Into<SqlValue> + Clone) -> Self {
        Self {
            l: Some(RangeBound::inclusive(value.clone())),
            h: Some(RangeBound::inclusive(value)),
        }
    }

    /// Half-open range `(-inf, v]` / `(-inf, v)`.
    pub fn up_to(bound: RangeBound) -> Self {
        Self {
            l: None,
            h: Some(bound),
        }
    }

    /// Half-open range `[v, +inf)` / `(v, +inf)`.
    pub fn starting_at(bound: RangeBound) -> Self {
        Self {
            l: Some(bound),
            h: None,
        }
    }
}

/// Ordering expression carried through from the planner; the reader does
/// not interpret these, it only hands them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrdExp {
    pub selector: ColSelector,
    pub desc: bool,
}

/// Physical scan description handed to a row reader.
#[derive(Debug, Clone)]
pub struct ScanSpecs {
    /// Index driving the traversal; must belong to the scanned table.
    pub index: Arc<Index>,
    /// Typed bounds per column id of the index's columns.
    pub ranges_by_col_id: HashMap<u32, TypedValueRange>,
    /// Project every revision of each row with its `_rev` counter.
    pub include_history: bool,
    /// Project the committing transaction's metadata as `_md`.
    pub include_tx_metadata: bool,
    /// Scan in descending index order.
    pub desc_order: bool,
    /// Carried through for the grouping layer; opaque here.
    pub group_by_sort_exps: Vec<OrdExp>,
    /// Carried through for the ordering layer; opaque here.
    pub order_by_sort_exps: Vec<OrdExp>,
}

impl ScanSpecs {
    /// Plain full-index scan.
    pub fn over(index: Arc<Index>) -> Self {
        Self {
            index,
            ranges_by_col_id: HashMap::new(),
            include_history: false,
            include_tx_metadata: false,
            desc_order: false,
            group_by_sort_exps: Vec::new(),
            order_by_sort_exps: Vec::new(),
        }
    }

    /// Number of synthetic columns projected ahead of table columns.
    pub fn extra_cols(&self) -> usize {
        usize::from(self.include_history) + usize::from(self.include_tx_metadata)
    }
}

/// Lower a scan specification to a key-reader spec over the index's
/// physical key space.
pub fn key_reader_spec_from(
    sql_prefix: &[u8],
    table: &Table,
    specs: &ScanSpecs,
) -> Result<KeyReaderSpec> {
    let prefix = map_key(
        sql_prefix,
        MAPPED_PREFIX,
        &[&encode_id(table.id()), &encode_id(specs.index.id)],
    );

    let mut lo_key = prefix.clone();
    let mut lo_frozen = false;

    let mut hi_key = prefix.clone();
    let mut hi_frozen = false;

    // The two keys are scan prefixes for the beginning and end of the
    // index range; each indexed column makes them more concrete until a
    // side freezes.
    for col in &specs.index.cols {
        let Some(col_range) = specs.ranges_by_col_id.get(&col.id) else {
            break;
        };

        if !hi_frozen {
            match &col_range.h {
                None => hi_frozen = true,
                Some(bound) => {
                    let enc = encode_as_key(&bound.value, col.ty, col.max_len)?;
                    hi_key.extend_from_slice(&enc);
                }
            }
        }

        if !lo_frozen {
            match &col_range.l {
                None => lo_frozen = true,
                Some(bound) => {
                    let enc = encode_as_key(&bound.value, col.ty, col.max_len)?;
                    lo_key.extend_from_slice(&enc);
                }
            }
        }
    }

    // Keep the high key inclusive of every key sharing its prefix.
    hi_key.push(KEY_VAL_PREFIX_UPPER_BOUND);

    let (seek_key, end_key) = if specs.desc_order {
        (hi_key, lo_key)
    } else {
        (lo_key, hi_key)
    };

    tracing::trace!(
        table = table.name(),
        index = specs.index.id,
        seek_len = seek_key.len(),
        end_len = end_key.len(),
        desc = specs.desc_order,
        "derived key range"
    );

    Ok(KeyReaderSpec {
        seek_key,
        end_key,
        inclusive_seek: true,
        inclusive_end: true,
        prefix,
        desc_order: specs.desc_order,
        filters: vec![Filter::IgnoreExpired, Filter::IgnoreDeleted],
        include_history: specs.include_history,
    })
}
