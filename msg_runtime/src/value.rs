//! Field values.
//!
//! One `Value` per singular field or per element of a repeated field.
//! Storage is by Rust type; the wire encoding (zig-zag, fixed width, ...)
//! comes from the field's declared `FieldKind`.
//!
//! Floats compare and hash by bit pattern, so `NaN == NaN` and
//! `0.0 != -0.0`. That keeps `Eq` and `Hash` consistent.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use msg_schema::FieldKind;

use crate::engine;
use crate::message::Message;

#[derive(Debug, Clone)]
pub enum Value {
    Double(f64),
    Float(f32),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Enum(i32),
    Message(Arc<dyn Message>),
}

impl Value {
    /// Wrap a message so it can be stored in another message's field.
    pub fn message<M: Message + 'static>(message: M) -> Self {
        Value::Message(Arc::new(message))
    }

    /// Whether this value can be stored in a field of `kind`.
    pub fn matches(&self, kind: FieldKind) -> bool {
        matches!(
            (kind, self),
            (FieldKind::Double, Value::Double(_))
                | (FieldKind::Float, Value::Float(_))
                | (
                    FieldKind::Int32 | FieldKind::SInt32 | FieldKind::SFixed32,
                    Value::I32(_)
                )
                | (
                    FieldKind::Int64 | FieldKind::SInt64 | FieldKind::SFixed64,
                    Value::I64(_)
                )
                | (FieldKind::UInt32 | FieldKind::Fixed32, Value::U32(_))
                | (FieldKind::UInt64 | FieldKind::Fixed64, Value::U64(_))
                | (FieldKind::Bool, Value::Bool(_))
                | (FieldKind::String, Value::String(_))
                | (FieldKind::Bytes, Value::Bytes(_))
                | (FieldKind::Enum, Value::Enum(_))
                | (FieldKind::Message, Value::Message(_))
        )
    }

    /// Variant name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::Float(_) => "float",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Enum(_) => "enum",
            Value::Message(_) => "message",
        }
    }

    pub fn as_message(&self) -> Option<&dyn Message> {
        match self {
            Value::Message(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Any integer variant widened to i64 (u64 above i64::MAX wraps).
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I32(v) | Value::Enum(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U32(v) => Some(v as i64),
            Value::U64(v) => Some(v as i64),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => engine::message_eq(&**a, &**b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Double(v) => v.to_bits().hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::I32(v) | Value::Enum(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            Value::Bool(v) => v.hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Message(m) => engine::message_hash(&**m).hash(state),
        }
    }
}

// ── Conversions ────────────────────────────────────────────────────

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Arc<dyn Message>> for Value {
    fn from(v: Arc<dyn Message>) -> Self {
        Value::Message(v)
    }
}
