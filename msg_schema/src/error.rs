//! Schema construction errors.

use thiserror::Error;

/// All possible descriptor and schema-loading failures.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{message}: field number {number} is outside 1..=536870911")]
    FieldNumberOutOfRange { message: String, number: u32 },

    #[error("{message}: field number {number} is reserved")]
    ReservedFieldNumber { message: String, number: u32 },

    #[error("{message}: field number {number} declared twice")]
    DuplicateFieldNumber { message: String, number: u32 },

    #[error("{message}: field name {name:?} declared twice")]
    DuplicateFieldName { message: String, name: String },

    #[error("{message}.{field}: {reason}")]
    InvalidField {
        message: String,
        field: String,
        reason: String,
    },

    #[error("message type {0:?} declared twice")]
    DuplicateMessage(String),

    #[error("{message}.{field}: unknown message type {type_name:?}")]
    UnresolvedType {
        message: String,
        field: String,
        type_name: String,
    },

    #[error("message types form a cycle through {0:?}")]
    RecursiveType(String),

    #[error("schema document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("schema file could not be read: {0}")]
    Io(#[from] std::io::Error),
}
