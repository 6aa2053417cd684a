//! The capability contract every message type satisfies.
//!
//! A message exposes four things: its descriptor, its field map, its
//! unknown-data bucket and its size cache. Every cross-cutting behaviour
//! (size, write, validation, equality, hashing, text) is derived from
//! those by `engine` and surfaced on all messages through `MessageExt`.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use msg_schema::MessageDescriptor;

use crate::engine;
use crate::error::Result;
use crate::field_map::FieldMap;
use crate::size_cache::SizeCache;
use crate::text;
use crate::unknown::UnknownFieldSet;
use crate::value::Value;

pub trait Message: fmt::Debug + Send + Sync {
    fn descriptor(&self) -> &Arc<MessageDescriptor>;

    fn fields(&self) -> &FieldMap;

    fn unknown_fields(&self) -> &UnknownFieldSet;

    /// Must be invalidated by the implementor whenever `fields()` or
    /// `unknown_fields()` change.
    fn size_cache(&self) -> &SizeCache;

    fn full_name(&self) -> &str {
        self.descriptor().full_name()
    }

    fn has_field(&self, number: u32) -> bool {
        self.fields().contains(number)
    }

    fn field(&self, number: u32) -> Option<&Value> {
        self.fields().singular(number)
    }

    fn repeated_len(&self, number: u32) -> usize {
        self.fields().repeated(number).len()
    }

    fn repeated_field(&self, number: u32, index: usize) -> Option<&Value> {
        self.fields().repeated(number).get(index)
    }
}

/// Engine operations as methods on every message.
pub trait MessageExt: Message {
    fn is_initialized(&self) -> bool {
        engine::is_initialized(self)
    }

    fn initialization_errors(&self) -> Vec<String> {
        engine::initialization_errors(self)
    }

    fn check_initialized(&self) -> Result<()> {
        engine::check_initialized(self)
    }

    fn serialized_size(&self) -> usize {
        engine::serialized_size(self)
    }

    fn encode<W: Write>(&self, writer: W) -> Result<()> {
        engine::encode(self, writer)
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        engine::encode_to_vec(self)
    }

    fn encode_length_delimited<W: Write>(&self, writer: W) -> Result<()> {
        engine::encode_length_delimited(self, writer)
    }

    fn encode_length_delimited_to_vec(&self) -> Vec<u8> {
        engine::encode_length_delimited_to_vec(self)
    }

    fn message_eq<O: Message + ?Sized>(&self, other: &O) -> bool {
        engine::message_eq(self, other)
    }

    fn message_hash(&self) -> u64 {
        engine::message_hash(self)
    }

    fn fingerprint(&self) -> String {
        engine::fingerprint(self)
    }

    fn to_text(&self) -> String {
        text::render(self)
    }
}

impl<M: Message + ?Sized> MessageExt for M {}
