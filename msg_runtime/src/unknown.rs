//! Unknown fields — data a schema did not recognise, kept for re-emission.
//!
//! Entries are grouped by field number; within a number each wire kind
//! keeps its values in arrival order. Two layouts are supported:
//!
//! - normal: every value as a regular field
//! - message set: only length-delimited values, each wrapped in an item
//!   group `{ type_id = 2, message = 3 }` under field 1

use std::collections::BTreeMap;
use std::io::Write;

use prost::encoding::{encoded_len_varint, key_len, WireType};

use crate::error::Result;
use crate::wire::CodedOutput;

const MESSAGE_SET_ITEM: u32 = 1;
const MESSAGE_SET_TYPE_ID: u32 = 2;
const MESSAGE_SET_MESSAGE: u32 = 3;

// ── Field ──────────────────────────────────────────────────────────

/// All unknown values seen for one field number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownField {
    pub varint: Vec<u64>,
    pub fixed32: Vec<u32>,
    pub fixed64: Vec<u64>,
    pub length_delimited: Vec<Vec<u8>>,
    pub group: Vec<UnknownFieldSet>,
}

impl UnknownField {
    pub fn is_empty(&self) -> bool {
        self.varint.is_empty()
            && self.fixed32.is_empty()
            && self.fixed64.is_empty()
            && self.length_delimited.is_empty()
            && self.group.is_empty()
    }

    pub fn serialized_size(&self, number: u32) -> usize {
        let key = key_len(number);
        let varint: usize = self
            .varint
            .iter()
            .map(|&v| key + encoded_len_varint(v))
            .sum();
        let fixed = (key + 4) * self.fixed32.len() + (key + 8) * self.fixed64.len();
        let delimited: usize = self
            .length_delimited
            .iter()
            .map(|b| key + encoded_len_varint(b.len() as u64) + b.len())
            .sum();
        let group: usize = self
            .group
            .iter()
            .map(|g| 2 * key + g.serialized_size())
            .sum();
        varint + fixed + delimited + group
    }

    pub fn write_to<W: Write>(&self, number: u32, out: &mut CodedOutput<W>) -> Result<()> {
        for &v in &self.varint {
            out.write_tag(number, WireType::Varint)?;
            out.write_varint(v)?;
        }
        for &v in &self.fixed32 {
            out.write_tag(number, WireType::ThirtyTwoBit)?;
            out.write_fixed32(v)?;
        }
        for &v in &self.fixed64 {
            out.write_tag(number, WireType::SixtyFourBit)?;
            out.write_fixed64(v)?;
        }
        for b in &self.length_delimited {
            out.write_tag(number, WireType::LengthDelimited)?;
            out.write_length_delimited(b)?;
        }
        for g in &self.group {
            out.write_tag(number, WireType::StartGroup)?;
            g.write_to(out)?;
            out.write_tag(number, WireType::EndGroup)?;
        }
        Ok(())
    }

    /// Size of this field's length-delimited values as message-set items.
    pub fn serialized_size_as_message_set_item(&self, number: u32) -> usize {
        let framing = 2 * key_len(MESSAGE_SET_ITEM)
            + key_len(MESSAGE_SET_TYPE_ID)
            + encoded_len_varint(number as u64)
            + key_len(MESSAGE_SET_MESSAGE);
        self.length_delimited
            .iter()
            .map(|b| framing + encoded_len_varint(b.len() as u64) + b.len())
            .sum()
    }

    pub fn write_as_message_set_item_to<W: Write>(
        &self,
        number: u32,
        out: &mut CodedOutput<W>,
    ) -> Result<()> {
        for b in &self.length_delimited {
            out.write_tag(MESSAGE_SET_ITEM, WireType::StartGroup)?;
            out.write_tag(MESSAGE_SET_TYPE_ID, WireType::Varint)?;
            out.write_varint(number as u64)?;
            out.write_tag(MESSAGE_SET_MESSAGE, WireType::LengthDelimited)?;
            out.write_length_delimited(b)?;
            out.write_tag(MESSAGE_SET_ITEM, WireType::EndGroup)?;
        }
        Ok(())
    }
}

// ── Set ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnknownFieldSet {
    fields: BTreeMap<u32, UnknownField>,
}

impl UnknownFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, number: u32) -> Option<&UnknownField> {
        self.fields.get(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &UnknownField)> {
        self.fields.iter().map(|(&n, f)| (n, f))
    }

    pub fn add_varint(&mut self, number: u32, value: u64) {
        self.field_mut(number).varint.push(value);
    }

    pub fn add_fixed32(&mut self, number: u32, value: u32) {
        self.field_mut(number).fixed32.push(value);
    }

    pub fn add_fixed64(&mut self, number: u32, value: u64) {
        self.field_mut(number).fixed64.push(value);
    }

    pub fn add_length_delimited(&mut self, number: u32, value: Vec<u8>) {
        self.field_mut(number).length_delimited.push(value);
    }

    pub fn add_group(&mut self, number: u32, group: UnknownFieldSet) {
        self.field_mut(number).group.push(group);
    }

    /// Append every value of `other` after the values already held.
    pub fn merge(&mut self, other: &UnknownFieldSet) {
        for (&number, theirs) in &other.fields {
            let ours = self.field_mut(number);
            ours.varint.extend_from_slice(&theirs.varint);
            ours.fixed32.extend_from_slice(&theirs.fixed32);
            ours.fixed64.extend_from_slice(&theirs.fixed64);
            ours.length_delimited
                .extend(theirs.length_delimited.iter().cloned());
            ours.group.extend(theirs.group.iter().cloned());
        }
    }

    pub fn remove(&mut self, number: u32) -> Option<UnknownField> {
        self.fields.remove(&number)
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn serialized_size(&self) -> usize {
        self.fields
            .iter()
            .map(|(&n, f)| f.serialized_size(n))
            .sum()
    }

    pub fn write_to<W: Write>(&self, out: &mut CodedOutput<W>) -> Result<()> {
        for (&n, f) in &self.fields {
            f.write_to(n, out)?;
        }
        Ok(())
    }

    pub fn serialized_size_as_message_set(&self) -> usize {
        self.fields
            .iter()
            .map(|(&n, f)| f.serialized_size_as_message_set_item(n))
            .sum()
    }

    pub fn write_as_message_set_to<W: Write>(&self, out: &mut CodedOutput<W>) -> Result<()> {
        for (&n, f) in &self.fields {
            f.write_as_message_set_item_to(n, out)?;
        }
        Ok(())
    }

    fn field_mut(&mut self, number: u32) -> &mut UnknownField {
        self.fields.entry(number).or_default()
    }
}
