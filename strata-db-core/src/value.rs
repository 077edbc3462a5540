//! SqlValue - typed SQL value domain
//!
//! A `SqlValue` is the tagged union carried through scan results: one value
//! per projected column position. NULL carries its column type so that
//! projection positions stay type-tagged even when empty.
//!
//! ## Ordering
//!
//! Values compare within a single type only. `cmp_same_type` implements the
//! total order used by row compatibility checks and (indirectly) by the
//! order-preserving key encoding in `codec`:
//!
//! 1. NULLs sort before any non-NULL value (NULLS FIRST); two NULLs are
//!    equal regardless of their carried types.
//! 2. Floats use IEEE-754 total ordering, matching their key encoding.
//! 3. JSON compares by canonical serialization.
//!
//! Cross-type comparison is an error; coercion is the query layer's job,
//! not the scan core's.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// SQL column/value type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    /// 64-bit signed integer
    Integer,
    /// 64-bit IEEE-754 float
    Float,
    /// UTF-8 string, bounded by the column's max length when indexed
    Varchar,
    /// Boolean
    Boolean,
    /// Raw bytes, bounded by the column's max length when indexed
    Blob,
    /// UTC instant with microsecond precision
    Timestamp,
    /// JSON document
    Json,
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SqlType::Integer => "INTEGER",
            SqlType::Float => "FLOAT",
            SqlType::Varchar => "VARCHAR",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Blob => "BLOB",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Json => "JSON",
        };
        f.write_str(s)
    }
}

/// Typed SQL value
///
/// Rows hold one `SqlValue` per projected column position. Values are
/// immutable once produced by a reader.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// 64-bit signed integer (INTEGER)
    Integer(i64),
    /// 64-bit float (FLOAT)
    Float(f64),
    /// UTF-8 string (VARCHAR)
    Varchar(String),
    /// Boolean (BOOLEAN)
    Boolean(bool),
    /// Raw bytes (BLOB)
    Blob(Vec<u8>),
    /// UTC instant, microsecond precision (TIMESTAMP)
    Timestamp(DateTime<Utc>),
    /// JSON document (JSON)
    Json(serde_json::Value),
    /// NULL tagged with its column type
    Null(SqlType),
}

impl SqlValue {
    /// The SQL type of this value; for NULL, the carried type.
    pub fn ty(&self) -> SqlType {
        match self {
            SqlValue::Integer(_) => SqlType::Integer,
            SqlValue::Float(_) => SqlType::Float,
            SqlValue::Varchar(_) => SqlType::Varchar,
            SqlValue::Boolean(_) => SqlType::Boolean,
            SqlValue::Blob(_) => SqlType::Blob,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::Json(_) => SqlType::Json,
            SqlValue::Null(t) => *t,
        }
    }

    /// Returns true for NULL of any type
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Total comparison against a value of the same type.
    ///
    /// NULLs sort first; two NULLs compare equal whatever their carried
    /// types (the query layer owns three-valued NULL semantics, the core
    /// only needs a total order for matching and sorting checks).
    pub fn cmp_same_type(&self, other: &SqlValue) -> Result<Ordering> {
        match (self, other) {
            (SqlValue::Null(_), SqlValue::Null(_)) => Ok(Ordering::Equal),
            (SqlValue::Null(_), _) => Ok(Ordering::Less),
            (_, SqlValue::Null(_)) => Ok(Ordering::Greater),
            (SqlValue::Integer(a), SqlValue::Integer(b)) => Ok(a.cmp(b)),
            (SqlValue::Float(a), SqlValue::Float(b)) => Ok(a.total_cmp(b)),
            (SqlValue::Varchar(a), SqlValue::Varchar(b)) => Ok(a.cmp(b)),
            (SqlValue::Boolean(a), SqlValue::Boolean(b)) => Ok(a.cmp(b)),
            (SqlValue::Blob(a), SqlValue::Blob(b)) => Ok(a.cmp(b)),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => Ok(a.cmp(b)),
            // JSON has no natural order; canonical serialization gives a
            // deterministic one, which is all the scan core needs.
            (SqlValue::Json(a), SqlValue::Json(b)) => Ok(a.to_string().cmp(&b.to_string())),
            _ => Err(Error::NotComparable(self.ty(), other.ty())),
        }
    }
}

// Display is only used for diagnostics and tracing; the wire formats live
// in `codec`.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Integer(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Varchar(v) => write!(f, "'{v}'"),
            SqlValue::Boolean(v) => write!(f, "{v}"),
            SqlValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
            SqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            SqlValue::Json(v) => write!(f, "{v}"),
            SqlValue::Null(_) => f.write_str("NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Varchar(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Varchar(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}
