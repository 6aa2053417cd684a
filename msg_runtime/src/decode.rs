//! Decoder — bytes → DynamicMessage for a given descriptor.
//!
//! Rules:
//!   - Known field with the expected wire type → field map
//!   - Repeated numeric fields accept packed and unpacked elements
//!   - Singular scalar seen twice: last occurrence wins
//!   - Singular message seen twice: the occurrences are merged
//!   - Anything else (unknown number, unexpected wire type) → unknown data
//!   - Message-set descriptors: `group 1 { type_id, message }` items become
//!     length-delimited unknown entries under `type_id`
//!   - Required fields are NOT checked here; see `engine::is_initialized`

use std::sync::Arc;

use msg_schema::{FieldDescriptor, FieldKind, MessageDescriptor, MAX_FIELD_NUMBER};
use prost::encoding::{decode_key, decode_varint, WireType};
use tracing::{debug, warn};

use crate::config::DecodeOptions;
use crate::dynamic::DynamicMessage;
use crate::error::{Error, Result};
use crate::field_map::{FieldMap, FieldValue};
use crate::message::Message;
use crate::unknown::UnknownFieldSet;
use crate::value::Value;
use crate::wire::{unzigzag32, unzigzag64, wire_type};

/// Decode one whole message from `bytes`.
pub fn decode(
    descriptor: &Arc<MessageDescriptor>,
    bytes: &[u8],
    options: &DecodeOptions,
) -> Result<DynamicMessage> {
    check_len(bytes.len(), options)?;
    debug!(message = descriptor.full_name(), len = bytes.len(), "decoding message");
    let mut buf = bytes;
    decode_message(descriptor, &mut buf, options, options.recursion_limit)
}

/// Decode one varint-length-prefixed message from the front of `buf` and
/// advance past it. Repeated calls walk a stream of frames.
pub fn decode_length_delimited(
    descriptor: &Arc<MessageDescriptor>,
    buf: &mut &[u8],
    options: &DecodeOptions,
) -> Result<DynamicMessage> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Malformed(format!("frame length {} does not fit in memory", len)))?;
    check_len(len, options)?;
    let mut frame = take(buf, len)?;
    decode_message(descriptor, &mut frame, options, options.recursion_limit)
}

fn check_len(len: usize, options: &DecodeOptions) -> Result<()> {
    if len > options.max_message_len {
        return Err(Error::MessageTooLarge {
            len,
            max: options.max_message_len,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

fn decode_message(
    descriptor: &Arc<MessageDescriptor>,
    buf: &mut &[u8],
    options: &DecodeOptions,
    depth: u32,
) -> Result<DynamicMessage> {
    decode_onto(descriptor, buf, options, depth, FieldMap::new(), UnknownFieldSet::new())
}

/// Decode `buf` on top of already-decoded content. Scalars overwrite,
/// repeated fields append, singular messages merge recursively.
fn decode_onto(
    descriptor: &Arc<MessageDescriptor>,
    buf: &mut &[u8],
    options: &DecodeOptions,
    depth: u32,
    mut fields: FieldMap,
    mut unknown: UnknownFieldSet,
) -> Result<DynamicMessage> {
    while !buf.is_empty() {
        let (number, wire) = decode_key(buf)?;

        if descriptor.message_set_wire_format() && number == 1 && wire == WireType::StartGroup {
            decode_message_set_item(buf, &mut unknown, options, depth)?;
            continue;
        }

        match descriptor.field(number) {
            Some(field) if accepts(field, wire) => {
                decode_field(field, wire, buf, &mut fields, options, depth)?
            }
            _ => decode_unknown(number, wire, buf, &mut unknown, options, depth)?,
        }
    }

    Ok(DynamicMessage::from_parts(Arc::clone(descriptor), fields, unknown))
}

fn accepts(field: &FieldDescriptor, wire: WireType) -> bool {
    wire == wire_type(field.kind().wire_kind())
        || (field.is_repeated() && field.kind().is_packable() && wire == WireType::LengthDelimited)
}

fn decode_field(
    field: &Arc<FieldDescriptor>,
    wire: WireType,
    buf: &mut &[u8],
    fields: &mut FieldMap,
    options: &DecodeOptions,
    depth: u32,
) -> Result<()> {
    let packed_block = field.kind().is_packable() && wire == WireType::LengthDelimited;
    if packed_block {
        let len = read_len(buf)?;
        let mut block = take(buf, len)?;
        while !block.is_empty() {
            let value = read_value(field, &mut block, options, depth)?;
            fields.push(field, value);
        }
        return Ok(());
    }

    if field.kind() == FieldKind::Message && !field.is_repeated() {
        let base = fields
            .singular(field.number())
            .and_then(Value::as_message)
            .map(|m| (m.fields().clone(), m.unknown_fields().clone()));
        let value = read_message(field, buf, options, depth, base)?;
        fields.insert(field, FieldValue::Singular(value));
        return Ok(());
    }

    let value = read_value(field, buf, options, depth)?;
    if field.is_repeated() {
        fields.push(field, value);
    } else {
        fields.insert(field, FieldValue::Singular(value));
    }
    Ok(())
}

fn read_value(
    field: &FieldDescriptor,
    buf: &mut &[u8],
    options: &DecodeOptions,
    depth: u32,
) -> Result<Value> {
    let value = match field.kind() {
        FieldKind::Int32 => Value::I32(decode_varint(buf)? as i32),
        FieldKind::Int64 => Value::I64(decode_varint(buf)? as i64),
        FieldKind::UInt32 => Value::U32(decode_varint(buf)? as u32),
        FieldKind::UInt64 => Value::U64(decode_varint(buf)?),
        FieldKind::SInt32 => Value::I32(unzigzag32(decode_varint(buf)? as u32)),
        FieldKind::SInt64 => Value::I64(unzigzag64(decode_varint(buf)?)),
        FieldKind::Bool => Value::Bool(decode_varint(buf)? != 0),
        FieldKind::Enum => Value::Enum(decode_varint(buf)? as i32),
        FieldKind::Fixed32 => Value::U32(read_fixed32(buf)?),
        FieldKind::SFixed32 => Value::I32(read_fixed32(buf)? as i32),
        FieldKind::Float => Value::Float(f32::from_bits(read_fixed32(buf)?)),
        FieldKind::Fixed64 => Value::U64(read_fixed64(buf)?),
        FieldKind::SFixed64 => Value::I64(read_fixed64(buf)? as i64),
        FieldKind::Double => Value::Double(f64::from_bits(read_fixed64(buf)?)),
        FieldKind::String => {
            let len = read_len(buf)?;
            let bytes = take(buf, len)?;
            let s = std::str::from_utf8(bytes).map_err(|_| {
                Error::Malformed(format!("field {} is not valid UTF-8", field.name()))
            })?;
            Value::String(s.to_string())
        }
        FieldKind::Bytes => {
            let len = read_len(buf)?;
            Value::Bytes(take(buf, len)?.to_vec())
        }
        FieldKind::Message => read_message(field, buf, options, depth, None)?,
    };
    Ok(value)
}

/// One length-delimited embedded message, optionally merged onto the
/// fields and unknown data of an earlier occurrence.
fn read_message(
    field: &FieldDescriptor,
    buf: &mut &[u8],
    options: &DecodeOptions,
    depth: u32,
    base: Option<(FieldMap, UnknownFieldSet)>,
) -> Result<Value> {
    let nested = field.message_type().ok_or_else(|| {
        Error::Malformed(format!("field {} has no message type", field.name()))
    })?;
    let depth = descend(depth, options)?;
    let len = read_len(buf)?;
    let mut body = take(buf, len)?;
    let (fields, unknown) = base.unwrap_or_default();
    Ok(Value::message(decode_onto(nested, &mut body, options, depth, fields, unknown)?))
}

// ---------------------------------------------------------------------------
// Unknown data
// ---------------------------------------------------------------------------

fn decode_unknown(
    number: u32,
    wire: WireType,
    buf: &mut &[u8],
    unknown: &mut UnknownFieldSet,
    options: &DecodeOptions,
    depth: u32,
) -> Result<()> {
    match wire {
        WireType::Varint => unknown.add_varint(number, decode_varint(buf)?),
        WireType::SixtyFourBit => unknown.add_fixed64(number, read_fixed64(buf)?),
        WireType::ThirtyTwoBit => unknown.add_fixed32(number, read_fixed32(buf)?),
        WireType::LengthDelimited => {
            let len = read_len(buf)?;
            unknown.add_length_delimited(number, take(buf, len)?.to_vec());
        }
        WireType::StartGroup => {
            let depth = descend(depth, options)?;
            let group = decode_group(number, buf, options, depth)?;
            unknown.add_group(number, group);
        }
        WireType::EndGroup => {
            return Err(Error::Malformed(format!(
                "end-group tag for field {} without matching start",
                number
            )));
        }
    }
    Ok(())
}

fn decode_group(
    number: u32,
    buf: &mut &[u8],
    options: &DecodeOptions,
    depth: u32,
) -> Result<UnknownFieldSet> {
    let mut group = UnknownFieldSet::new();
    loop {
        if buf.is_empty() {
            return Err(Error::Malformed(format!("group {} is not terminated", number)));
        }
        let (n, wire) = decode_key(buf)?;
        if wire == WireType::EndGroup {
            if n != number {
                return Err(Error::Malformed(format!(
                    "group {} closed by end-group tag {}",
                    number, n
                )));
            }
            return Ok(group);
        }
        decode_unknown(n, wire, buf, &mut group, options, depth)?;
    }
}

/// Parse one message-set item after its start-group tag has been read.
fn decode_message_set_item(
    buf: &mut &[u8],
    unknown: &mut UnknownFieldSet,
    options: &DecodeOptions,
    depth: u32,
) -> Result<()> {
    let mut type_id = None;
    let mut payload = None;
    let mut ignored = UnknownFieldSet::new();

    loop {
        if buf.is_empty() {
            return Err(Error::Malformed("message set item is not terminated".to_string()));
        }
        match decode_key(buf)? {
            (1, WireType::EndGroup) => break,
            (2, WireType::Varint) => type_id = Some(decode_varint(buf)?),
            (3, WireType::LengthDelimited) => {
                let len = read_len(buf)?;
                payload = Some(take(buf, len)?.to_vec());
            }
            (n, wire) => decode_unknown(n, wire, buf, &mut ignored, options, depth)?,
        }
    }

    match (type_id, payload) {
        (Some(id), Some(bytes)) if (1..=MAX_FIELD_NUMBER as u64).contains(&id) => {
            unknown.add_length_delimited(id as u32, bytes);
            Ok(())
        }
        _ => Err(Error::Malformed(
            "message set item needs a valid type_id and a message".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

fn descend(depth: u32, options: &DecodeOptions) -> Result<u32> {
    if depth == 0 {
        warn!(limit = options.recursion_limit, "recursion limit reached while decoding");
        return Err(Error::RecursionLimit {
            limit: options.recursion_limit,
        });
    }
    Ok(depth - 1)
}

fn take<'a>(buf: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if buf.len() < n {
        return Err(Error::Malformed(format!(
            "truncated input: need {} bytes, {} left",
            n,
            buf.len()
        )));
    }
    let (head, rest) = buf.split_at(n);
    *buf = rest;
    Ok(head)
}

fn read_len(buf: &mut &[u8]) -> Result<usize> {
    let len = decode_varint(buf)?;
    usize::try_from(len).map_err(|_| Error::Malformed(format!("length {} is too large", len)))
}

fn read_fixed32(buf: &mut &[u8]) -> Result<u32> {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(take(buf, 4)?);
    Ok(u32::from_le_bytes(raw))
}

fn read_fixed64(buf: &mut &[u8]) -> Result<u64> {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(take(buf, 8)?);
    Ok(u64::from_le_bytes(raw))
}
