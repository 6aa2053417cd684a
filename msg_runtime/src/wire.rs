//! Wire codec — byte production and size measurement for single fields.
//!
//! Varints and keys come from `prost::encoding`. Every `*_len` function
//! here has a `write_*` twin and the two agree byte for byte; the engine's
//! size/write cross-check depends on it.

use std::io::{self, Write};

use msg_schema::{FieldDescriptor, FieldKind, WireKind};
use prost::encoding::{encode_key, encode_varint, encoded_len_varint, key_len, WireType};

use crate::engine;
use crate::error::Result;
use crate::value::Value;

// ── Output sink ────────────────────────────────────────────────────

/// Byte sink over any `io::Write`, counting what it has written.
///
/// Errors from the writer are returned as-is; nothing is buffered.
/// `written` counts every byte the writer accepted, including those of a
/// call that later failed part-way.
#[derive(Debug)]
pub struct CodedOutput<W> {
    inner: W,
    written: usize,
    scratch: Vec<u8>,
}

impl<W: Write> CodedOutput<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            written: 0,
            scratch: Vec::with_capacity(10),
        }
    }

    /// Bytes the writer has accepted so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        write_all_counted(&mut self.inner, &mut self.written, bytes)?;
        Ok(())
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.scratch.clear();
        encode_varint(value, &mut self.scratch);
        self.flush_scratch()
    }

    pub fn write_tag(&mut self, number: u32, wire_type: WireType) -> Result<()> {
        self.scratch.clear();
        encode_key(number, wire_type, &mut self.scratch);
        self.flush_scratch()
    }

    pub fn write_fixed32(&mut self, value: u32) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    pub fn write_fixed64(&mut self, value: u64) -> Result<()> {
        self.write_raw(&value.to_le_bytes())
    }

    /// Length prefix followed by the bytes.
    pub fn write_length_delimited(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_varint(bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    fn flush_scratch(&mut self) -> Result<()> {
        write_all_counted(&mut self.inner, &mut self.written, &self.scratch)?;
        Ok(())
    }
}

/// `Write::write_all`, adding each accepted chunk to `written` as it lands.
fn write_all_counted<W: Write>(inner: &mut W, written: &mut usize, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        match inner.write(bytes) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "writer accepted no bytes",
                ))
            }
            Ok(n) => {
                *written += n;
                bytes = &bytes[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

// ── Kinds ──────────────────────────────────────────────────────────

pub fn wire_type(kind: WireKind) -> WireType {
    match kind {
        WireKind::Varint => WireType::Varint,
        WireKind::Fixed64 => WireType::SixtyFourBit,
        WireKind::LengthDelimited => WireType::LengthDelimited,
        WireKind::Fixed32 => WireType::ThirtyTwoBit,
    }
}

pub fn zigzag32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn unzigzag32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

pub fn unzigzag64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

// ── Values ─────────────────────────────────────────────────────────

/// Encoded size of one value without its key. Length-delimited values
/// include their length prefix.
pub fn value_len(kind: FieldKind, value: &Value) -> usize {
    match (kind, value) {
        (FieldKind::Double, Value::Double(_))
        | (FieldKind::Fixed64, Value::U64(_))
        | (FieldKind::SFixed64, Value::I64(_)) => 8,
        (FieldKind::Float, Value::Float(_))
        | (FieldKind::Fixed32, Value::U32(_))
        | (FieldKind::SFixed32, Value::I32(_)) => 4,
        (FieldKind::Int32, Value::I32(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldKind::Int64, Value::I64(v)) => encoded_len_varint(*v as u64),
        (FieldKind::UInt32, Value::U32(v)) => encoded_len_varint(*v as u64),
        (FieldKind::UInt64, Value::U64(v)) => encoded_len_varint(*v),
        (FieldKind::SInt32, Value::I32(v)) => encoded_len_varint(zigzag32(*v) as u64),
        (FieldKind::SInt64, Value::I64(v)) => encoded_len_varint(zigzag64(*v)),
        (FieldKind::Bool, Value::Bool(_)) => 1,
        (FieldKind::Enum, Value::Enum(v)) => encoded_len_varint(*v as i64 as u64),
        (FieldKind::String, Value::String(s)) => delimited_len(s.len()),
        (FieldKind::Bytes, Value::Bytes(b)) => delimited_len(b.len()),
        (FieldKind::Message, Value::Message(m)) => delimited_len(engine::serialized_size(&**m)),
        (kind, value) => kind_mismatch(kind, value),
    }
}

pub fn write_value<W: Write>(kind: FieldKind, value: &Value, out: &mut CodedOutput<W>) -> Result<()> {
    match (kind, value) {
        (FieldKind::Double, Value::Double(v)) => out.write_fixed64(v.to_bits()),
        (FieldKind::Float, Value::Float(v)) => out.write_fixed32(v.to_bits()),
        (FieldKind::Fixed64, Value::U64(v)) => out.write_fixed64(*v),
        (FieldKind::SFixed64, Value::I64(v)) => out.write_fixed64(*v as u64),
        (FieldKind::Fixed32, Value::U32(v)) => out.write_fixed32(*v),
        (FieldKind::SFixed32, Value::I32(v)) => out.write_fixed32(*v as u32),
        (FieldKind::Int32, Value::I32(v)) => out.write_varint(*v as i64 as u64),
        (FieldKind::Int64, Value::I64(v)) => out.write_varint(*v as u64),
        (FieldKind::UInt32, Value::U32(v)) => out.write_varint(*v as u64),
        (FieldKind::UInt64, Value::U64(v)) => out.write_varint(*v),
        (FieldKind::SInt32, Value::I32(v)) => out.write_varint(zigzag32(*v) as u64),
        (FieldKind::SInt64, Value::I64(v)) => out.write_varint(zigzag64(*v)),
        (FieldKind::Bool, Value::Bool(v)) => out.write_varint(*v as u64),
        (FieldKind::Enum, Value::Enum(v)) => out.write_varint(*v as i64 as u64),
        (FieldKind::String, Value::String(s)) => out.write_length_delimited(s.as_bytes()),
        (FieldKind::Bytes, Value::Bytes(b)) => out.write_length_delimited(b),
        (FieldKind::Message, Value::Message(m)) => {
            out.write_varint(engine::serialized_size(&**m) as u64)?;
            engine::write_to(&**m, out)
        }
        (kind, value) => kind_mismatch(kind, value),
    }
}

// ── Fields ─────────────────────────────────────────────────────────

/// Key plus value for one (unpacked) element of `field`.
pub fn field_len(field: &FieldDescriptor, value: &Value) -> usize {
    key_len(field.number()) + value_len(field.kind(), value)
}

pub fn write_field<W: Write>(
    field: &FieldDescriptor,
    value: &Value,
    out: &mut CodedOutput<W>,
) -> Result<()> {
    out.write_tag(field.number(), wire_type(field.kind().wire_kind()))?;
    write_value(field.kind(), value, out)
}

/// One key, one length prefix, then every element without keys.
pub fn packed_len(field: &FieldDescriptor, values: &[Value]) -> usize {
    if values.is_empty() {
        return 0;
    }
    let payload = packed_payload_len(field.kind(), values);
    key_len(field.number()) + delimited_len(payload)
}

pub fn write_packed<W: Write>(
    field: &FieldDescriptor,
    values: &[Value],
    out: &mut CodedOutput<W>,
) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    out.write_tag(field.number(), WireType::LengthDelimited)?;
    out.write_varint(packed_payload_len(field.kind(), values) as u64)?;
    for v in values {
        write_value(field.kind(), v, out)?;
    }
    Ok(())
}

fn packed_payload_len(kind: FieldKind, values: &[Value]) -> usize {
    values.iter().map(|v| value_len(kind, v)).sum()
}

fn delimited_len(len: usize) -> usize {
    encoded_len_varint(len as u64) + len
}

/// The field map's producer guarantees values match their descriptors.
fn kind_mismatch(kind: FieldKind, value: &Value) -> ! {
    panic!(
        "field map holds a {} value in a field declared as {}",
        value.type_name(),
        kind
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use msg_schema::{FieldSpec, MessageDescriptor};
    use std::sync::Arc;

    fn field(kind: FieldKind) -> Arc<FieldDescriptor> {
        let desc = MessageDescriptor::builder("t.W")
            .field(FieldSpec::optional("f", 1, kind))
            .build()
            .unwrap();
        Arc::clone(desc.field(1).unwrap())
    }

    fn encode_one(kind: FieldKind, value: Value) -> Vec<u8> {
        let f = field(kind);
        let mut out = CodedOutput::new(Vec::new());
        write_field(&f, &value, &mut out).unwrap();
        assert_eq!(out.written(), field_len(&f, &value));
        out.into_inner()
    }

    #[test]
    fn zigzag_matches_reference_values() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag32(i32::MIN), u32::MAX);
        assert_eq!(zigzag64(-2), 3);
        assert_eq!(unzigzag32(zigzag32(-12345)), -12345);
        assert_eq!(unzigzag64(zigzag64(i64::MIN)), i64::MIN);
    }

    #[test]
    fn negative_int32_sign_extends_to_ten_bytes() {
        let bytes = encode_one(FieldKind::Int32, Value::I32(-1));
        assert_eq!(bytes.len(), 11);
        assert_eq!(bytes[0], 0x08);
        assert_eq!(bytes[10], 0x01);
    }

    #[test]
    fn sint32_uses_zigzag() {
        assert_eq!(encode_one(FieldKind::SInt32, Value::I32(-1)), vec![0x08, 0x01]);
    }

    #[test]
    fn fixed_kinds_are_little_endian() {
        assert_eq!(
            encode_one(FieldKind::Fixed32, Value::U32(1)),
            vec![0x0d, 1, 0, 0, 0]
        );
        assert_eq!(
            encode_one(FieldKind::Double, Value::Double(1.0)),
            vec![0x09, 0, 0, 0, 0, 0, 0, 0xf0, 0x3f]
        );
    }

    #[test]
    fn string_is_length_prefixed() {
        assert_eq!(
            encode_one(FieldKind::String, Value::from("abc")),
            vec![0x0a, 0x03, b'a', b'b', b'c']
        );
    }

    #[test]
    fn packed_block_matches_reference() {
        let desc = MessageDescriptor::builder("t.P")
            .field(FieldSpec::repeated("v", 4, FieldKind::Int32).packed())
            .build()
            .unwrap();
        let f = desc.field(4).unwrap();
        let values = vec![Value::I32(3), Value::I32(270), Value::I32(86942)];
        let mut out = CodedOutput::new(Vec::new());
        write_packed(f, &values, &mut out).unwrap();
        assert_eq!(out.written(), packed_len(f, &values));
        assert_eq!(out.into_inner(), vec![0x22, 0x06, 0x03, 0x8e, 0x02, 0x9e, 0xa7, 0x05]);
        assert_eq!(packed_len(f, &[]), 0);
    }

    /// Takes at most two bytes per call and `capacity` bytes overall.
    struct Trickle {
        taken: Vec<u8>,
        capacity: usize,
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.taken.len() == self.capacity {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "full"));
            }
            let n = buf.len().min(2).min(self.capacity - self.taken.len());
            self.taken.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn partial_write_counts_accepted_bytes() {
        let mut out = CodedOutput::new(Trickle {
            taken: Vec::new(),
            capacity: 3,
        });
        out.write_raw(&[9]).unwrap();
        assert!(out.write_raw(&[1, 2, 3, 4, 5]).is_err());
        assert_eq!(out.written(), 3);
        assert_eq!(out.into_inner().taken, vec![9, 1, 2]);
    }

    #[test]
    fn short_writes_are_resumed() {
        let mut out = CodedOutput::new(Trickle {
            taken: Vec::new(),
            capacity: 16,
        });
        out.write_length_delimited(b"hello").unwrap();
        assert_eq!(out.written(), 6);
        assert_eq!(out.into_inner().taken, b"\x05hello".to_vec());
    }

    #[test]
    #[should_panic(expected = "declared as int64")]
    fn mismatched_value_panics() {
        value_len(FieldKind::Int64, &Value::U32(1));
    }
}
