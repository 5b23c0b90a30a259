//! Self-contained snapshot of one node body and its binary encoding.
//!
//! Layout: version byte, node id (u64 LE), label, offset entries, slots,
//! node properties, then a little-endian CRC32 of everything before it.
//! Counts and lengths are unsigned varints; integers inside values are
//! ZigZag varints.

use serde::{Deserialize, Serialize};

use super::adjacency::Slot;
use super::value::Value;
use crate::primitives::bytes::{buf, var};
use crate::types::checksum::image_crc32;
use crate::types::{NodeId, Result, StoreError};

const IMAGE_VERSION: u8 = 1;

const TAG_ABSENT: u8 = 0x00;
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_BYTES: u8 = 0x05;
const TAG_DATE: u8 = 0x06;
const TAG_DATETIME: u8 = 0x07;
const TAG_NULL: u8 = 0x0F;
const TAG_NODE: u8 = 0x10;

/// Everything needed to rebuild a node body exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeImage {
    /// Node id.
    pub id: NodeId,
    /// Node type label.
    pub label: String,
    /// Interleaved `(start, length)` offset table entries.
    pub offsets: Vec<u64>,
    /// Adjacency buffer, spare capacity included.
    pub slots: Vec<Slot>,
    /// One entry per declared node property key, in declaration order.
    pub properties: Vec<Option<Value>>,
}

/// Encodes `image` followed by its CRC32 trailer.
pub fn encode(image: &NodeImage) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + image.slots.len() * 4);
    out.push(IMAGE_VERSION);
    out.extend_from_slice(&image.id.0.to_le_bytes());
    buf::put_len_prefixed(&mut out, image.label.as_bytes());

    var::put_u64(image.offsets.len() as u64, &mut out);
    for &entry in &image.offsets {
        var::put_u64(entry, &mut out);
    }

    var::put_u64(image.slots.len() as u64, &mut out);
    for slot in &image.slots {
        match slot {
            Slot::Empty => out.push(TAG_ABSENT),
            Slot::Node(id) => {
                out.push(TAG_NODE);
                var::put_u64(id.0, &mut out);
            }
            Slot::Value(value) => write_value(&mut out, value),
        }
    }

    var::put_u64(image.properties.len() as u64, &mut out);
    for property in &image.properties {
        match property {
            None => out.push(TAG_ABSENT),
            Some(value) => write_value(&mut out, value),
        }
    }

    let crc = image_crc32(image.id.0, &out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Decodes bytes produced by [`encode`], verifying the trailer first.
pub fn decode(bytes: &[u8]) -> Result<NodeImage> {
    if bytes.len() < 1 + 8 + 4 {
        return Err(StoreError::Corruption("node image too short"));
    }
    let (payload, trailer) = bytes.split_at(bytes.len() - 4);
    let mut crc = [0u8; 4];
    crc.copy_from_slice(trailer);

    let mut cursor = buf::Cursor::new(payload);
    if cursor.u8()? != IMAGE_VERSION {
        return Err(StoreError::Corruption("unsupported node image version"));
    }
    let id = NodeId(cursor.u64_le()?);
    if image_crc32(id.0, payload) != u32::from_le_bytes(crc) {
        return Err(StoreError::Corruption("node image checksum mismatch"));
    }
    let label = String::from_utf8(cursor.len_prefixed()?.to_vec())
        .map_err(|_| StoreError::Corruption("invalid UTF-8 label"))?;

    let count = bounded_count(&mut cursor)?;
    let mut offsets = Vec::with_capacity(count);
    for _ in 0..count {
        offsets.push(cursor.var_u64()?);
    }

    let count = bounded_count(&mut cursor)?;
    let mut slots = Vec::with_capacity(count);
    for _ in 0..count {
        let slot = match cursor.u8()? {
            TAG_ABSENT => Slot::Empty,
            TAG_NODE => Slot::Node(NodeId(cursor.var_u64()?)),
            tag => Slot::Value(read_value(&mut cursor, tag)?),
        };
        slots.push(slot);
    }

    let count = bounded_count(&mut cursor)?;
    let mut properties = Vec::with_capacity(count);
    for _ in 0..count {
        let property = match cursor.u8()? {
            TAG_ABSENT => None,
            TAG_NODE => return Err(StoreError::Corruption("node reference in property slot")),
            tag => Some(read_value(&mut cursor, tag)?),
        };
        properties.push(property);
    }

    cursor.ensure_consumed()?;
    Ok(NodeImage {
        id,
        label,
        offsets,
        slots,
        properties,
    })
}

/// Every encoded element takes at least one byte, so a count larger than
/// the remaining input is corrupt. Guards the preallocations above.
fn bounded_count(cursor: &mut buf::Cursor<'_>) -> Result<usize> {
    let count = cursor.var_usize()?;
    if count > cursor.remaining() {
        return Err(StoreError::Corruption("element count exceeds payload"));
    }
    Ok(count)
}

/// Canonical byte form of a single value, used as an index key.
pub(crate) fn value_key(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(v) => {
            out.push(TAG_BOOL);
            out.push(u8::from(*v));
        }
        Value::Int(v) => {
            out.push(TAG_INT);
            var::put_i64(*v, out);
        }
        Value::Float(v) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&v.to_bits().to_le_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STRING);
            buf::put_len_prefixed(out, s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            buf::put_len_prefixed(out, b);
        }
        Value::Date(v) => {
            out.push(TAG_DATE);
            var::put_i64(*v, out);
        }
        Value::DateTime(v) => {
            out.push(TAG_DATETIME);
            var::put_i64(*v, out);
        }
    }
}

fn read_value(cursor: &mut buf::Cursor<'_>, tag: u8) -> Result<Value> {
    Ok(match tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => match cursor.u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            _ => return Err(StoreError::Corruption("invalid boolean encoding")),
        },
        TAG_INT => Value::Int(cursor.var_i64()?),
        TAG_FLOAT => Value::Float(f64::from_bits(cursor.u64_le()?)),
        TAG_STRING => Value::Str(
            String::from_utf8(cursor.len_prefixed()?.to_vec())
                .map_err(|_| StoreError::Corruption("invalid UTF-8 string"))?,
        ),
        TAG_BYTES => Value::Bytes(cursor.len_prefixed()?.to_vec()),
        TAG_DATE => Value::Date(cursor.var_i64()?),
        TAG_DATETIME => Value::DateTime(cursor.var_i64()?),
        _ => return Err(StoreError::Corruption("unknown value tag")),
    })
}
