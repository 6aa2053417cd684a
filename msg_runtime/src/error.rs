//! Runtime error type.
//!
//! Sink failures and decode failures are carried unmodified. A mismatch
//! between predicted and written size is NOT an error value: it is a bug in
//! a size/write pair and panics in `engine::encode_to_vec`.

use std::io;

use msg_schema::{FieldKind, SchemaError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("message nesting exceeds recursion limit of {limit}")]
    RecursionLimit { limit: u32 },

    #[error("message of {len} bytes exceeds limit of {max} bytes")]
    MessageTooLarge { len: usize, max: usize },

    #[error("{message} has no field {field}")]
    NoSuchField { message: String, field: String },

    #[error("{message}.{field}: expected {expected} value")]
    TypeMismatch {
        message: String,
        field: String,
        expected: FieldKind,
    },

    #[error("{message}.{field}: {reason}")]
    CardinalityMismatch {
        message: String,
        field: String,
        reason: &'static str,
    },

    #[error("{message} is missing required fields: {}", missing.join(", "))]
    Uninitialized {
        message: String,
        missing: Vec<String>,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, Error>;
