//! DynamicMessage — a message of any schema, built at runtime.
//!
//! Every mutator checks the value against the field's descriptor and
//! invalidates the size cache. Nested messages are attached behind `Arc`
//! and cannot be changed afterwards, so a child can never leave its
//! parent's cached size stale.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use msg_schema::{FieldDescriptor, FieldKind, MessageDescriptor};

use crate::config::DecodeOptions;
use crate::decode;
use crate::engine;
use crate::error::{Error, Result};
use crate::field_map::{FieldMap, FieldValue};
use crate::message::Message;
use crate::size_cache::SizeCache;
use crate::text;
use crate::unknown::UnknownFieldSet;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct DynamicMessage {
    descriptor: Arc<MessageDescriptor>,
    fields: FieldMap,
    unknown: UnknownFieldSet,
    size_cache: SizeCache,
}

impl DynamicMessage {
    /// An empty message: no field present, no unknown data.
    pub fn new(descriptor: &Arc<MessageDescriptor>) -> Self {
        Self::from_parts(Arc::clone(descriptor), FieldMap::new(), UnknownFieldSet::new())
    }

    pub(crate) fn from_parts(
        descriptor: Arc<MessageDescriptor>,
        fields: FieldMap,
        unknown: UnknownFieldSet,
    ) -> Self {
        Self {
            descriptor,
            fields,
            unknown,
            size_cache: SizeCache::new(),
        }
    }

    /// Parse with default `DecodeOptions`.
    pub fn decode(descriptor: &Arc<MessageDescriptor>, bytes: &[u8]) -> Result<Self> {
        decode::decode(descriptor, bytes, &DecodeOptions::default())
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Value of a present singular field, by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let field = self.descriptor.field_by_name(name)?;
        self.fields.singular(field.number())
    }

    /// Elements of a repeated field, by name; empty if absent or unknown.
    pub fn get_repeated(&self, name: &str) -> &[Value] {
        match self.descriptor.field_by_name(name) {
            Some(field) => self.fields.repeated(field.number()),
            None => &[],
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.descriptor
            .field_by_name(name)
            .is_some_and(|f| self.fields.contains(f.number()))
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Set a singular field.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let field = self.lookup(name)?;
        self.set_field(&field, value.into())
    }

    pub fn set_by_number(&mut self, number: u32, value: impl Into<Value>) -> Result<&mut Self> {
        let field = self.lookup_number(number)?;
        self.set_field(&field, value.into())
    }

    /// Replace all elements of a repeated field. An empty list clears it.
    pub fn set_repeated(&mut self, name: &str, values: Vec<Value>) -> Result<&mut Self> {
        let field = self.lookup(name)?;
        self.require_repeated(&field, true)?;
        for v in &values {
            self.check_value(&field, v)?;
        }
        self.size_cache.invalidate();
        self.fields.insert(&field, FieldValue::Repeated(values));
        Ok(self)
    }

    /// Append one element to a repeated field.
    pub fn push(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let field = self.lookup(name)?;
        self.require_repeated(&field, true)?;
        let value = value.into();
        self.check_value(&field, &value)?;
        self.size_cache.invalidate();
        self.fields.push(&field, value);
        Ok(self)
    }

    /// Attach a nested message to a singular or repeated message field.
    pub fn set_message<M: Message + 'static>(&mut self, name: &str, message: M) -> Result<&mut Self> {
        let field = self.lookup(name)?;
        let value = Value::message(message);
        if field.is_repeated() {
            self.check_value(&field, &value)?;
            self.size_cache.invalidate();
            self.fields.push(&field, value);
            Ok(self)
        } else {
            self.set_field(&field, value)
        }
    }

    /// Make a field absent.
    pub fn clear(&mut self, name: &str) -> Result<&mut Self> {
        let field = self.lookup(name)?;
        self.size_cache.invalidate();
        self.fields.remove(field.number());
        Ok(self)
    }

    /// Unknown data, for in-place edits. The size cache is dropped up front.
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        self.size_cache.invalidate();
        &mut self.unknown
    }

    pub fn merge_unknown(&mut self, other: &UnknownFieldSet) {
        self.size_cache.invalidate();
        self.unknown.merge(other);
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn set_field(&mut self, field: &Arc<FieldDescriptor>, value: Value) -> Result<&mut Self> {
        self.require_repeated(field, false)?;
        self.check_value(field, &value)?;
        self.size_cache.invalidate();
        self.fields.insert(field, FieldValue::Singular(value));
        Ok(self)
    }

    fn lookup(&self, name: &str) -> Result<Arc<FieldDescriptor>> {
        self.descriptor
            .field_by_name(name)
            .cloned()
            .ok_or_else(|| Error::NoSuchField {
                message: self.descriptor.full_name().to_string(),
                field: name.to_string(),
            })
    }

    fn lookup_number(&self, number: u32) -> Result<Arc<FieldDescriptor>> {
        self.descriptor
            .field(number)
            .cloned()
            .ok_or_else(|| Error::NoSuchField {
                message: self.descriptor.full_name().to_string(),
                field: number.to_string(),
            })
    }

    fn require_repeated(&self, field: &FieldDescriptor, repeated: bool) -> Result<()> {
        if field.is_repeated() == repeated {
            return Ok(());
        }
        Err(Error::CardinalityMismatch {
            message: self.descriptor.full_name().to_string(),
            field: field.name().to_string(),
            reason: if repeated {
                "field is singular; use set"
            } else {
                "field is repeated; use push or set_repeated"
            },
        })
    }

    fn check_value(&self, field: &FieldDescriptor, value: &Value) -> Result<()> {
        let type_ok = value.matches(field.kind())
            && match (value, field.message_type()) {
                (Value::Message(m), Some(expected)) => Arc::ptr_eq(m.descriptor(), expected),
                _ => field.kind() != FieldKind::Message,
            };
        if type_ok {
            return Ok(());
        }
        Err(Error::TypeMismatch {
            message: self.descriptor.full_name().to_string(),
            field: field.name().to_string(),
            expected: field.kind(),
        })
    }
}

impl Message for DynamicMessage {
    fn descriptor(&self) -> &Arc<MessageDescriptor> {
        &self.descriptor
    }

    fn fields(&self) -> &FieldMap {
        &self.fields
    }

    fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    fn size_cache(&self) -> &SizeCache {
        &self.size_cache
    }
}

impl PartialEq for DynamicMessage {
    fn eq(&self, other: &Self) -> bool {
        engine::message_eq(self, other)
    }
}

impl Eq for DynamicMessage {}

impl Hash for DynamicMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        engine::message_hash(self).hash(state);
    }
}

impl fmt::Display for DynamicMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageExt;
    use msg_schema::FieldSpec;

    fn person() -> Arc<MessageDescriptor> {
        MessageDescriptor::builder("people.Person")
            .field(FieldSpec::required("name", 1, FieldKind::String))
            .field(FieldSpec::optional("age", 2, FieldKind::UInt32))
            .field(FieldSpec::repeated("emails", 3, FieldKind::String))
            .build()
            .unwrap()
    }

    #[test]
    fn set_and_get_by_name() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        p.set("name", "Ada").unwrap().set("age", 36u32).unwrap();
        p.push("emails", "ada@example.com").unwrap();
        assert_eq!(p.get("name").and_then(Value::as_str), Some("Ada"));
        assert_eq!(p.get_repeated("emails").len(), 1);
        assert!(p.has("age"));
        assert!(p.get("missing").is_none());
    }

    #[test]
    fn wrong_type_is_rejected() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        let err = p.set("age", -1i32).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: FieldKind::UInt32, .. }));
        assert!(!p.has("age"));
    }

    #[test]
    fn wrong_cardinality_is_rejected() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        assert!(matches!(
            p.set("emails", "x").unwrap_err(),
            Error::CardinalityMismatch { .. }
        ));
        assert!(matches!(
            p.push("name", "x").unwrap_err(),
            Error::CardinalityMismatch { .. }
        ));
    }

    #[test]
    fn unknown_field_name_is_rejected() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        assert!(matches!(
            p.set("nickname", "x").unwrap_err(),
            Error::NoSuchField { .. }
        ));
    }

    #[test]
    fn nested_message_must_have_declared_type() {
        let desc = person();
        let team = MessageDescriptor::builder("people.Team")
            .field(FieldSpec::repeated("members", 1, FieldKind::Message).of_type(&desc))
            .build()
            .unwrap();
        let other = MessageDescriptor::builder("people.Other").build().unwrap();

        let mut t = DynamicMessage::new(&team);
        assert!(t.set_message("members", DynamicMessage::new(&other)).is_err());
        t.set_message("members", DynamicMessage::new(&desc)).unwrap();
        assert_eq!(t.repeated_len(1), 1);
    }

    #[test]
    fn every_mutation_invalidates_cached_size() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        p.set("name", "A").unwrap();
        let before = p.serialized_size();
        assert_eq!(p.size_cache().get(), Some(before));

        p.set("age", 1u32).unwrap();
        assert_eq!(p.size_cache().get(), None);
        assert_eq!(p.serialized_size(), before + 2);

        p.clear("age").unwrap();
        assert_eq!(p.serialized_size(), before);

        p.unknown_fields_mut().add_varint(99, 1);
        assert_eq!(p.size_cache().get(), None);
        assert_eq!(p.serialized_size(), before + 3);
    }

    #[test]
    fn display_uses_text_form() {
        let desc = person();
        let mut p = DynamicMessage::new(&desc);
        p.set("name", "Ada").unwrap();
        assert_eq!(p.to_string(), "name: \"Ada\"\n");
    }
}
