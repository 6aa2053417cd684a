/// Message Schema — Descriptors
///
/// Pure data. Built once, shared by every message instance of a type.
/// Descriptor identity is `Arc` pointer identity: two descriptors built
/// separately from the same definition are different schemas.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Highest field number the wire format can carry (2^29 - 1).
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Field numbers reserved by the wire format implementation.
pub const RESERVED_FIELD_NUMBERS: std::ops::RangeInclusive<u32> = 19_000..=19_999;

// ── Kinds ──────────────────────────────────────────────────────────

/// Value kind of a field, as declared in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
    Enum,
    Message,
}

/// Wire representation of a single encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireKind {
    Varint,
    Fixed64,
    LengthDelimited,
    Fixed32,
}

impl FieldKind {
    /// Wire kind used for one unpacked element of this kind.
    pub fn wire_kind(self) -> WireKind {
        match self {
            FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::UInt32
            | FieldKind::UInt64
            | FieldKind::SInt32
            | FieldKind::SInt64
            | FieldKind::Bool
            | FieldKind::Enum => WireKind::Varint,
            FieldKind::Double | FieldKind::Fixed64 | FieldKind::SFixed64 => WireKind::Fixed64,
            FieldKind::Float | FieldKind::Fixed32 | FieldKind::SFixed32 => WireKind::Fixed32,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message => {
                WireKind::LengthDelimited
            }
        }
    }

    /// Whether repeated fields of this kind may use packed encoding.
    pub fn is_packable(self) -> bool {
        self.wire_kind() != WireKind::LengthDelimited
    }

    /// Lowercase schema name (`"sint64"`, `"message"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt32 => "uint32",
            FieldKind::UInt64 => "uint64",
            FieldKind::SInt32 => "sint32",
            FieldKind::SInt64 => "sint64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::SFixed32 => "sfixed32",
            FieldKind::SFixed64 => "sfixed64",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Enum => "enum",
            FieldKind::Message => "message",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Singular,
    Repeated,
}

// ── Field Descriptor ───────────────────────────────────────────────

/// One declared field of a message type.
#[derive(Debug)]
pub struct FieldDescriptor {
    name: String,
    number: u32,
    kind: FieldKind,
    cardinality: Cardinality,
    required: bool,
    packed: bool,
    message_type: Option<Arc<MessageDescriptor>>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Repeated numeric field written as one length-delimited block.
    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Nested type of a `Message` field; `None` for every other kind.
    pub fn message_type(&self) -> Option<&Arc<MessageDescriptor>> {
        self.message_type.as_ref()
    }
}

/// Declaration of a field, consumed by [`MessageDescriptorBuilder`].
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    pub required: bool,
    pub packed: bool,
    pub message_type: Option<Arc<MessageDescriptor>>,
}

impl FieldSpec {
    pub fn optional(name: &str, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            number,
            kind,
            cardinality: Cardinality::Singular,
            required: false,
            packed: false,
            message_type: None,
        }
    }

    pub fn required(name: &str, number: u32, kind: FieldKind) -> Self {
        Self {
            required: true,
            ..Self::optional(name, number, kind)
        }
    }

    pub fn repeated(name: &str, number: u32, kind: FieldKind) -> Self {
        Self {
            cardinality: Cardinality::Repeated,
            ..Self::optional(name, number, kind)
        }
    }

    pub fn packed(mut self) -> Self {
        self.packed = true;
        self
    }

    pub fn of_type(mut self, message_type: &Arc<MessageDescriptor>) -> Self {
        self.message_type = Some(Arc::clone(message_type));
        self
    }
}

// ── Message Descriptor ─────────────────────────────────────────────

/// Schema of one message type: its fields in field-number order.
#[derive(Debug)]
pub struct MessageDescriptor {
    full_name: String,
    message_set_wire_format: bool,
    fields: Vec<Arc<FieldDescriptor>>,
    by_number: BTreeMap<u32, usize>,
    by_name: BTreeMap<String, usize>,
}

impl MessageDescriptor {
    pub fn builder(full_name: &str) -> MessageDescriptorBuilder {
        MessageDescriptorBuilder {
            full_name: full_name.to_string(),
            message_set_wire_format: false,
            fields: Vec::new(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Unknown data of this type is written in message-set layout.
    pub fn message_set_wire_format(&self) -> bool {
        self.message_set_wire_format
    }

    /// All declared fields, sorted by field number.
    pub fn fields(&self) -> &[Arc<FieldDescriptor>] {
        &self.fields
    }

    pub fn field(&self, number: u32) -> Option<&Arc<FieldDescriptor>> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&Arc<FieldDescriptor>> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Declared required fields, in field-number order.
    pub fn required_fields(&self) -> impl Iterator<Item = &Arc<FieldDescriptor>> {
        self.fields.iter().filter(|f| f.is_required())
    }
}

/// Validating builder for [`MessageDescriptor`].
#[derive(Debug)]
pub struct MessageDescriptorBuilder {
    full_name: String,
    message_set_wire_format: bool,
    fields: Vec<FieldSpec>,
}

impl MessageDescriptorBuilder {
    pub fn message_set_wire_format(mut self, enabled: bool) -> Self {
        self.message_set_wire_format = enabled;
        self
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Validate every field declaration and freeze the descriptor.
    pub fn build(self) -> Result<Arc<MessageDescriptor>, SchemaError> {
        let mut specs = self.fields;
        specs.sort_by_key(|s| s.number);

        let mut fields = Vec::with_capacity(specs.len());
        let mut by_number = BTreeMap::new();
        let mut by_name = BTreeMap::new();

        for spec in specs {
            validate_field(&self.full_name, &spec)?;

            if by_number.insert(spec.number, fields.len()).is_some() {
                return Err(SchemaError::DuplicateFieldNumber {
                    message: self.full_name,
                    number: spec.number,
                });
            }
            if by_name.insert(spec.name.clone(), fields.len()).is_some() {
                return Err(SchemaError::DuplicateFieldName {
                    message: self.full_name,
                    name: spec.name,
                });
            }

            fields.push(Arc::new(FieldDescriptor {
                name: spec.name,
                number: spec.number,
                kind: spec.kind,
                cardinality: spec.cardinality,
                required: spec.required,
                packed: spec.packed,
                message_type: spec.message_type,
            }));
        }

        Ok(Arc::new(MessageDescriptor {
            full_name: self.full_name,
            message_set_wire_format: self.message_set_wire_format,
            fields,
            by_number,
            by_name,
        }))
    }
}

fn validate_field(message: &str, spec: &FieldSpec) -> Result<(), SchemaError> {
    let invalid = |reason: &str| SchemaError::InvalidField {
        message: message.to_string(),
        field: spec.name.clone(),
        reason: reason.to_string(),
    };

    if spec.name.is_empty() {
        return Err(invalid("field name is empty"));
    }
    if spec.number == 0 || spec.number > MAX_FIELD_NUMBER {
        return Err(SchemaError::FieldNumberOutOfRange {
            message: message.to_string(),
            number: spec.number,
        });
    }
    if RESERVED_FIELD_NUMBERS.contains(&spec.number) {
        return Err(SchemaError::ReservedFieldNumber {
            message: message.to_string(),
            number: spec.number,
        });
    }
    if spec.required && spec.cardinality == Cardinality::Repeated {
        return Err(invalid("repeated fields cannot be required"));
    }
    if spec.packed
        && (spec.cardinality != Cardinality::Repeated || !spec.kind.is_packable())
    {
        return Err(invalid("only repeated numeric fields can be packed"));
    }
    match (spec.kind, &spec.message_type) {
        (FieldKind::Message, None) => Err(invalid("message field has no message type")),
        (kind, Some(_)) if kind != FieldKind::Message => {
            Err(invalid("only message fields carry a message type"))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Arc<MessageDescriptor> {
        MessageDescriptor::builder("geo.Point")
            .field(FieldSpec::required("y", 2, FieldKind::SInt32))
            .field(FieldSpec::required("x", 1, FieldKind::SInt32))
            .field(FieldSpec::optional("label", 3, FieldKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn fields_are_sorted_by_number() {
        let desc = point();
        let numbers: Vec<u32> = desc.fields().iter().map(|f| f.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(desc.field(2).unwrap().name(), "y");
        assert_eq!(desc.field_by_name("label").unwrap().number(), 3);
        assert!(desc.field(4).is_none());
    }

    #[test]
    fn required_fields_are_listed_in_order() {
        let desc = point();
        let names: Vec<&str> = desc.required_fields().map(|f| f.name()).collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn separately_built_descriptors_are_distinct() {
        assert!(!Arc::ptr_eq(&point(), &point()));
    }

    #[test]
    fn duplicate_number_is_rejected() {
        let err = MessageDescriptor::builder("t.Dup")
            .field(FieldSpec::optional("a", 1, FieldKind::Int32))
            .field(FieldSpec::optional("b", 1, FieldKind::Int32))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFieldNumber { number: 1, .. }));
    }

    #[test]
    fn reserved_and_out_of_range_numbers_are_rejected() {
        let reserved = MessageDescriptor::builder("t.R")
            .field(FieldSpec::optional("a", 19_500, FieldKind::Int32))
            .build()
            .unwrap_err();
        assert!(matches!(reserved, SchemaError::ReservedFieldNumber { .. }));

        let zero = MessageDescriptor::builder("t.Z")
            .field(FieldSpec::optional("a", 0, FieldKind::Int32))
            .build()
            .unwrap_err();
        assert!(matches!(zero, SchemaError::FieldNumberOutOfRange { .. }));
    }

    #[test]
    fn packed_requires_repeated_numeric() {
        let err = MessageDescriptor::builder("t.P")
            .field(FieldSpec::repeated("names", 1, FieldKind::String).packed())
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));

        let ok = MessageDescriptor::builder("t.P")
            .field(FieldSpec::repeated("samples", 1, FieldKind::SInt64).packed())
            .build()
            .unwrap();
        assert!(ok.field(1).unwrap().is_packed());
    }

    #[test]
    fn message_field_needs_type() {
        let err = MessageDescriptor::builder("t.M")
            .field(FieldSpec::optional("child", 1, FieldKind::Message))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidField { .. }));

        let child = point();
        let ok = MessageDescriptor::builder("t.M")
            .field(FieldSpec::optional("child", 1, FieldKind::Message).of_type(&child))
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(ok.field(1).unwrap().message_type().unwrap(), &child));
    }

    #[test]
    fn wire_kinds_follow_value_kinds() {
        assert_eq!(FieldKind::SInt64.wire_kind(), WireKind::Varint);
        assert_eq!(FieldKind::Double.wire_kind(), WireKind::Fixed64);
        assert_eq!(FieldKind::SFixed32.wire_kind(), WireKind::Fixed32);
        assert_eq!(FieldKind::Message.wire_kind(), WireKind::LengthDelimited);
        assert!(!FieldKind::Bytes.is_packable());
    }
}
