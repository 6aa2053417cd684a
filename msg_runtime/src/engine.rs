//! Generic message engine.
//!
//! Written once against the `Message` contract; never against a concrete
//! type. Every operation borrows the message for its duration only.
//!
//! - `is_initialized` / `initialization_errors` / `check_initialized`
//! - `serialized_size`: memoized in the message's `SizeCache`
//! - `write_to` / `encode`: field-map order, then unknown data
//! - `encode_to_vec`: pre-sized buffer, size/write cross-check (panics)
//! - `message_eq` / `message_hash`: schema identity + field map; unknown
//!   data is ignored
//! - `fingerprint`: SHA-256 of the encoded bytes (unknown data included)

use std::io::Write;
use std::sync::Arc;

use msg_schema::{FieldKind, MessageDescriptor};
use prost::encoding::encoded_len_varint;
use sha2::{Digest, Sha256};
use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::field_map::FieldValue;
use crate::message::Message;
use crate::value::Value;
use crate::wire::{self, CodedOutput};

const HASH_SEED: u64 = 41;
const HASH_SCHEMA_MULTIPLIER: u64 = 19;
const HASH_FIELDS_MULTIPLIER: u64 = 53;

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// False iff a required field is absent here or in any nested message.
/// Depth-first, stops at the first failure.
pub fn is_initialized<M: Message + ?Sized>(message: &M) -> bool {
    let fields = message.fields();
    if message
        .descriptor()
        .required_fields()
        .any(|f| !fields.contains(f.number()))
    {
        return false;
    }

    fields.iter().all(|(field, value)| {
        if field.kind() != FieldKind::Message {
            return true;
        }
        match value {
            FieldValue::Singular(v) => value_initialized(v),
            FieldValue::Repeated(values) => values.iter().all(value_initialized),
        }
    })
}

fn value_initialized(value: &Value) -> bool {
    match value {
        Value::Message(m) => is_initialized(&**m),
        _ => true,
    }
}

/// Paths of every missing required field, e.g. `header.id`, `items[1].sku`.
/// A message's own missing fields come before those of its children.
pub fn initialization_errors<M: Message + ?Sized>(message: &M) -> Vec<String> {
    let mut missing = Vec::new();
    collect_missing(message, "", &mut missing);
    missing
}

fn collect_missing<M: Message + ?Sized>(message: &M, prefix: &str, missing: &mut Vec<String>) {
    let fields = message.fields();
    for f in message.descriptor().required_fields() {
        if !fields.contains(f.number()) {
            missing.push(format!("{}{}", prefix, f.name()));
        }
    }

    for (field, value) in fields.iter() {
        match value {
            FieldValue::Singular(Value::Message(child)) => {
                let path = format!("{}{}.", prefix, field.name());
                collect_missing(&**child, &path, missing);
            }
            FieldValue::Repeated(values) => {
                for (i, v) in values.iter().enumerate() {
                    if let Value::Message(child) = v {
                        let path = format!("{}{}[{}].", prefix, field.name(), i);
                        collect_missing(&**child, &path, missing);
                    }
                }
            }
            FieldValue::Singular(_) => {}
        }
    }
}

/// `Err(Uninitialized)` listing every missing path, for callers that
/// treat missing required fields as fatal.
pub fn check_initialized<M: Message + ?Sized>(message: &M) -> Result<()> {
    if is_initialized(message) {
        return Ok(());
    }
    Err(Error::Uninitialized {
        message: message.full_name().to_string(),
        missing: initialization_errors(message),
    })
}

// ---------------------------------------------------------------------------
// Size
// ---------------------------------------------------------------------------

/// Encoded length in bytes. Computed on the first call after construction
/// or mutation, then served from the message's size cache.
pub fn serialized_size<M: Message + ?Sized>(message: &M) -> usize {
    if let Some(size) = message.size_cache().get() {
        return size;
    }

    let mut size = 0;
    for (field, value) in message.fields().iter() {
        size += match value {
            FieldValue::Singular(v) => wire::field_len(field, v),
            FieldValue::Repeated(values) if field.is_packed() => wire::packed_len(field, values),
            FieldValue::Repeated(values) => values.iter().map(|v| wire::field_len(field, v)).sum(),
        };
    }

    let unknown = message.unknown_fields();
    size += if message.descriptor().message_set_wire_format() {
        unknown.serialized_size_as_message_set()
    } else {
        unknown.serialized_size()
    };

    trace!(message = message.full_name(), size, "computed serialized size");
    message.size_cache().set(size);
    size
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Emit every present field in field-map order, then the unknown data.
/// A sink failure is returned immediately; bytes already written stay.
pub fn write_to<M: Message + ?Sized, W: Write>(message: &M, out: &mut CodedOutput<W>) -> Result<()> {
    for (field, value) in message.fields().iter() {
        match value {
            FieldValue::Singular(v) => wire::write_field(field, v, out)?,
            FieldValue::Repeated(values) if field.is_packed() => wire::write_packed(field, values, out)?,
            FieldValue::Repeated(values) => {
                for v in values {
                    wire::write_field(field, v, out)?;
                }
            }
        }
    }

    let unknown = message.unknown_fields();
    if message.descriptor().message_set_wire_format() {
        unknown.write_as_message_set_to(out)
    } else {
        unknown.write_to(out)
    }
}

pub fn encode<M: Message + ?Sized, W: Write>(message: &M, writer: W) -> Result<()> {
    let mut out = CodedOutput::new(writer);
    write_to(message, &mut out)
}

/// Varint length prefix, then the message. Frames can be concatenated.
pub fn encode_length_delimited<M: Message + ?Sized, W: Write>(message: &M, writer: W) -> Result<()> {
    let mut out = CodedOutput::new(writer);
    out.write_varint(serialized_size(message) as u64)?;
    write_to(message, &mut out)
}

/// Encode into a buffer sized exactly to `serialized_size`.
///
/// Panics if the bytes written differ from the predicted size: a field's
/// size and write disagree, and the output cannot be trusted.
pub fn encode_to_vec<M: Message + ?Sized>(message: &M) -> Vec<u8> {
    let expected = serialized_size(message);
    build_buffer(message, expected, |out| write_to(message, out))
}

pub fn encode_length_delimited_to_vec<M: Message + ?Sized>(message: &M) -> Vec<u8> {
    let size = serialized_size(message);
    let expected = encoded_len_varint(size as u64) + size;
    build_buffer(message, expected, |out| {
        out.write_varint(size as u64)?;
        write_to(message, out)
    })
}

fn build_buffer<M, F>(message: &M, expected: usize, write: F) -> Vec<u8>
where
    M: Message + ?Sized,
    F: FnOnce(&mut CodedOutput<&mut Vec<u8>>) -> Result<()>,
{
    let mut buf = Vec::with_capacity(expected);
    let written = {
        let mut out = CodedOutput::new(&mut buf);
        write(&mut out).expect("writing to a Vec<u8> cannot fail");
        out.written()
    };
    if written != expected {
        error!(
            message = message.full_name(),
            expected,
            written,
            "serialized size does not match bytes written"
        );
        panic!(
            "{}: serialized size predicted {} bytes but {} were written",
            message.full_name(),
            expected,
            written
        );
    }
    buf
}

// ---------------------------------------------------------------------------
// Equality & hashing
// ---------------------------------------------------------------------------

/// Same schema (descriptor identity) and equal field maps.
pub fn message_eq<A, B>(a: &A, b: &B) -> bool
where
    A: Message + ?Sized,
    B: Message + ?Sized,
{
    Arc::ptr_eq(a.descriptor(), b.descriptor()) && a.fields() == b.fields()
}

/// Consistent with `message_eq`: equal messages hash equal.
pub fn message_hash<M: Message + ?Sized>(message: &M) -> u64 {
    let mut hash = HASH_SEED;
    hash = hash
        .wrapping_mul(HASH_SCHEMA_MULTIPLIER)
        .wrapping_add(schema_identity_hash(message.descriptor()));
    hash = hash
        .wrapping_mul(HASH_FIELDS_MULTIPLIER)
        .wrapping_add(message.fields().structural_hash());
    hash
}

fn schema_identity_hash(descriptor: &Arc<MessageDescriptor>) -> u64 {
    Arc::as_ptr(descriptor) as usize as u64
}

/// SHA-256 of the encoded message. Lowercase hex.
pub fn fingerprint<M: Message + ?Sized>(message: &M) -> String {
    let digest = Sha256::digest(encode_to_vec(message));
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
