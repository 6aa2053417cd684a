#![forbid(unsafe_code)]

//! Message runtime — one generic engine for every message shape.
//!
//! A message type only describes itself (`Message`: descriptor, field map,
//! unknown data, size cache). Size computation, serialization, required
//! field validation, equality, hashing and text rendering are derived
//! from that description by `engine`, never by per-type code.
//!
//! Byte-level encoding is delegated to `wire` (built on `prost::encoding`)
//! and out-of-schema data to `unknown`.

pub mod config;
pub mod decode;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod field_map;
pub mod message;
pub mod size_cache;
pub mod text;
pub mod unknown;
pub mod value;
pub mod wire;

pub use config::DecodeOptions;
pub use dynamic::DynamicMessage;
pub use error::{Error, Result};
pub use field_map::{FieldMap, FieldValue};
pub use message::{Message, MessageExt};
pub use size_cache::SizeCache;
pub use unknown::{UnknownField, UnknownFieldSet};
pub use value::Value;

pub use msg_schema;
