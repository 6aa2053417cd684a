//! Field map — the present fields of one message, in field-number order.
//!
//! Absence means "not set". Repeated entries are never stored empty.
//! Iteration order is the wire order used by both size and write.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use msg_schema::FieldDescriptor;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldValue {
    Singular(Value),
    Repeated(Vec<Value>),
}

#[derive(Debug, Clone)]
struct Entry {
    field: Arc<FieldDescriptor>,
    value: FieldValue,
}

#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: BTreeMap<u32, Entry>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn get(&self, number: u32) -> Option<&FieldValue> {
        self.entries.get(&number).map(|e| &e.value)
    }

    /// Value of a present singular field.
    pub fn singular(&self, number: u32) -> Option<&Value> {
        match self.get(number)? {
            FieldValue::Singular(v) => Some(v),
            FieldValue::Repeated(_) => None,
        }
    }

    /// Elements of a repeated field; empty if absent.
    pub fn repeated(&self, number: u32) -> &[Value] {
        match self.get(number) {
            Some(FieldValue::Repeated(values)) => values,
            _ => &[],
        }
    }

    /// Present fields with their descriptors, in field-number order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<FieldDescriptor>, &FieldValue)> {
        self.entries.values().map(|e| (&e.field, &e.value))
    }

    /// Store a value, replacing any previous one. An empty repeated value
    /// clears the field instead.
    pub fn insert(&mut self, field: &Arc<FieldDescriptor>, value: FieldValue) {
        if matches!(&value, FieldValue::Repeated(v) if v.is_empty()) {
            self.entries.remove(&field.number());
            return;
        }
        self.entries.insert(
            field.number(),
            Entry {
                field: Arc::clone(field),
                value,
            },
        );
    }

    /// Append one element to a repeated field, creating it if absent.
    pub fn push(&mut self, field: &Arc<FieldDescriptor>, value: Value) {
        let entry = self.entries.entry(field.number()).or_insert_with(|| Entry {
            field: Arc::clone(field),
            value: FieldValue::Repeated(Vec::new()),
        });
        match &mut entry.value {
            FieldValue::Repeated(values) => values.push(value),
            singular => *singular = FieldValue::Repeated(vec![value]),
        }
    }

    pub fn remove(&mut self, number: u32) -> Option<FieldValue> {
        self.entries.remove(&number).map(|e| e.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Order-independent hash of the present fields and their values.
    pub fn structural_hash(&self) -> u64 {
        self.entries.iter().fold(0u64, |acc, (number, entry)| {
            acc.wrapping_add(hash_one(number) ^ hash_one(&entry.value))
        })
    }
}

/// Same present fields with equal values. Descriptors are compared through
/// the owning message's schema, not here.
impl PartialEq for FieldMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((na, a), (nb, b))| na == nb && a.value == b.value)
    }
}

impl Eq for FieldMap {}

fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
