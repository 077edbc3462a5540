//! Key and payload codecs for mapped SQL entries.
//!
//! Two related encodings share this module:
//!
//! - **Value-as-key**: order-preserving bytes for index keys. Ascending
//!   byte-lexicographic order over the encoding matches ascending typed
//!   order, so the store's key iterator yields rows in index order.
//! - **Value-as-payload**: self-describing bytes for stored row payloads.
//!   Each value starts with its own length so a decoder can skip columns
//!   it does not know how to (or need to) decode.
//!
//! ## Key layout
//!
//! | Type        | Encoding                                                    |
//! |-------------|-------------------------------------------------------------|
//! | INTEGER     | 8 bytes BE, sign bit flipped                                |
//! | TIMESTAMP   | microseconds as INTEGER                                     |
//! | FLOAT       | 8 bytes BE, IEEE-754 total-order transform                  |
//! | BOOLEAN     | 1 byte (0x00 / 0x01)                                        |
//! | VARCHAR     | bytes zero-padded to `max_len`, then `u32` BE actual length |
//! | BLOB        | as VARCHAR                                                  |
//! | JSON, NULL  | not key-encodable                                           |
//!
//! Index entry keys are `[engine prefix][MAPPED_PREFIX][table id][index id]
//! [key-encoded indexed columns…]`; ids are `u32` BE. High bounds append
//! [`KEY_VAL_PREFIX_UPPER_BOUND`] so a partial key prefix stays inclusive.
//!
//! ## Payload layout
//!
//! ```text
//! [u32 column-count] { [u32 col-id] [u32 len | NULL_LEN] [len bytes] }*
//! ```
//!
//! A length header of [`NULL_LEN`] marks an explicit NULL with no payload
//! bytes; writers normally just omit NULL columns from the entry.
//!
//! All malformed lengths, truncated buffers, and declared/actual size
//! mismatches fail with [`Error::CorruptedData`].

use crate::error::{Error, Result};
use crate::value::{SqlType, SqlValue};
use chrono::DateTime;

// ============================================================================
// Constants
// ============================================================================

/// Size of a `u32` length header.
pub const ENC_LEN_LEN: usize = 4;

/// Size of an encoded table/index/column id.
pub const ENC_ID_LEN: usize = 4;

/// Key-space tag for mapped SQL index entries.
pub const MAPPED_PREFIX: u8 = 0x02;

/// Upper-bound sentinel: strictly greater than any byte a key encoding
/// starts with, appended to high keys so prefix scans stay inclusive.
pub const KEY_VAL_PREFIX_UPPER_BOUND: u8 = 0xFF;

/// Length-header sentinel marking an explicit NULL payload value.
pub const NULL_LEN: u32 = u32::MAX;

/// Hard cap on a single declared value length; anything larger is treated
/// as corruption rather than attempted as an allocation.
pub const MAX_VALUE_LEN: usize = 32 << 20;

// ============================================================================
// Ids and key assembly
// ============================================================================

/// Encode a table/index/column id as 4 bytes BE.
pub fn encode_id(id: u32) -> [u8; ENC_ID_LEN] {
    id.to_be_bytes()
}

/// Assemble a mapped key: `[prefix][tag][segment…]`.
pub fn map_key(prefix: &[u8], tag: u8, segments: &[&[u8]]) -> Vec<u8> {
    let total = prefix.len() + 1 + segments.iter().map(|s| s.len()).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(prefix);
    out.push(tag);
    for s in segments {
        out.extend_from_slice(s);
    }
    out
}

// ============================================================================
// Value-as-key (order-preserving)
// ============================================================================

/// Encode a value as order-preserving index key bytes.
///
/// `max_len` bounds VARCHAR/BLOB values and fixes their encoded width so
/// that short values never compare greater than longer values sharing
/// their prefix. Fixed-width types ignore `max_len`.
pub fn encode_as_key(value: &SqlValue, ty: SqlType, max_len: usize) -> Result<Vec<u8>> {
    if !value.is_null() && value.ty() != ty {
        return Err(Error::IllegalArguments("value type does not match column type"));
    }

    match value {
        SqlValue::Null(_) => Err(Error::UnsupportedKeyType(ty)),
        SqlValue::Integer(v) => Ok(ordered_i64_bytes(*v).to_vec()),
        SqlValue::Timestamp(v) => Ok(ordered_i64_bytes(v.timestamp_micros()).to_vec()),
        SqlValue::Float(v) => Ok(ordered_f64_bytes(*v).to_vec()),
        SqlValue::Boolean(v) => Ok(vec![u8::from(*v)]),
        SqlValue::Varchar(s) => padded_key_bytes(s.as_bytes(), max_len),
        SqlValue::Blob(b) => padded_key_bytes(b, max_len),
        SqlValue::Json(_) => Err(Error::UnsupportedKeyType(SqlType::Json)),
    }
}

/// Sign-flipped big-endian: byte order matches signed integer order.
fn ordered_i64_bytes(v: i64) -> [u8; 8] {
    ((v as u64) ^ (1 << 63)).to_be_bytes()
}

/// IEEE-754 total-order transform: negative floats flip all bits,
/// non-negative floats flip the sign bit.
fn ordered_f64_bytes(v: f64) -> [u8; 8] {
    let bits = v.to_bits();
    let ordered = if bits & (1 << 63) != 0 {
        !bits
    } else {
        bits ^ (1 << 63)
    };
    ordered.to_be_bytes()
}

/// Zero-pad to `max_len`, then append the actual length as `u32` BE so
/// equal-prefix values order by length.
fn padded_key_bytes(raw: &[u8], max_len: usize) -> Result<Vec<u8>> {
    if raw.len() > max_len {
        return Err(Error::MaxKeyLenExceeded {
            len: raw.len(),
            max_len,
        });
    }
    let mut out = vec![0u8; max_len + ENC_LEN_LEN];
    out[..raw.len()].copy_from_slice(raw);
    out[max_len..].copy_from_slice(&(raw.len() as u32).to_be_bytes());
    Ok(out)
}

// ============================================================================
// Value-as-payload (self-describing)
// ============================================================================

/// Encode a value as `[u32 len][payload]`; NULL encodes as the
/// [`NULL_LEN`] header alone.
pub fn encode_value(value: &SqlValue) -> Vec<u8> {
    let payload: Vec<u8> = match value {
        SqlValue::Null(_) => return NULL_LEN.to_be_bytes().to_vec(),
        SqlValue::Integer(v) => v.to_be_bytes().to_vec(),
        SqlValue::Float(v) => v.to_bits().to_be_bytes().to_vec(),
        SqlValue::Varchar(s) => s.as_bytes().to_vec(),
        SqlValue::Boolean(v) => vec![u8::from(*v)],
        SqlValue::Blob(b) => b.clone(),
        SqlValue::Timestamp(v) => v.timestamp_micros().to_be_bytes().to_vec(),
        SqlValue::Json(v) => v.to_string().into_bytes(),
    };

    let mut out = Vec::with_capacity(ENC_LEN_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Decode one self-describing value of the given type from the front of
/// `buf`. Returns the value and the total bytes consumed (header included).
pub fn decode_value(buf: &[u8], ty: SqlType) -> Result<(SqlValue, usize)> {
    let (len, header) = decode_value_len(buf)?;
    if buf[..header] == NULL_LEN.to_be_bytes() {
        return Ok((SqlValue::Null(ty), header));
    }
    let payload = &buf[header..header + len];

    let value = match ty {
        SqlType::Integer => SqlValue::Integer(i64::from_be_bytes(fixed8(payload)?)),
        SqlType::Float => SqlValue::Float(f64::from_bits(u64::from_be_bytes(fixed8(payload)?))),
        SqlType::Boolean => match payload {
            [0] => SqlValue::Boolean(false),
            [1] => SqlValue::Boolean(true),
            _ => return Err(Error::corrupted("boolean payload must be one byte 0/1")),
        },
        SqlType::Varchar => SqlValue::Varchar(
            std::str::from_utf8(payload)
                .map_err(|_| Error::corrupted("varchar payload is not valid UTF-8"))?
                .to_string(),
        ),
        SqlType::Blob => SqlValue::Blob(payload.to_vec()),
        SqlType::Timestamp => {
            let micros = i64::from_be_bytes(fixed8(payload)?);
            let ts = DateTime::from_timestamp_micros(micros)
                .ok_or(Error::CorruptedData("timestamp out of range"))?;
            SqlValue::Timestamp(ts)
        }
        SqlType::Json => SqlValue::Json(
            serde_json::from_slice(payload)
                .map_err(|_| Error::corrupted("json payload failed to parse"))?,
        ),
    };

    Ok((value, header + len))
}

/// Length-only decode: returns `(payload length, header size)` without
/// interpreting the payload. Used to skip values of dropped columns.
pub fn decode_value_len(buf: &[u8]) -> Result<(usize, usize)> {
    if buf.len() < ENC_LEN_LEN {
        return Err(Error::corrupted("value header truncated"));
    }
    let declared = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if declared == NULL_LEN {
        return Ok((0, ENC_LEN_LEN));
    }
    let len = declared as usize;
    if len > MAX_VALUE_LEN {
        return Err(Error::corrupted("declared value length exceeds maximum"));
    }
    if buf.len() < ENC_LEN_LEN + len {
        return Err(Error::corrupted("value payload truncated"));
    }
    Ok((len, ENC_LEN_LEN))
}

fn fixed8(payload: &[u8]) -> Result<[u8; 8]> {
    payload
        .try_into()
        .map_err(|_| Error::corrupted("fixed-width payload must be 8 bytes"))
}

/// Assemble a row payload from `(column id, value)` pairs:
/// `[u32 count][{u32 col-id, encoded value}…]`. NULL values are omitted,
/// matching what writers persist.
pub fn encode_row_payload(cols: &[(u32, SqlValue)]) -> Vec<u8> {
    let present: Vec<&(u32, SqlValue)> = cols.iter().filter(|(_, v)| !v.is_null()).collect();

    let mut out = Vec::new();
    out.extend_from_slice(&(present.len() as u32).to_be_bytes());
    for (id, value) in present {
        out.extend_from_slice(&encode_id(*id));
        out.extend_from_slice(&encode_value(value));
    }
    out
}
