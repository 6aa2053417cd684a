#![forbid(unsafe_code)]

//! Message schema — immutable descriptors consumed by the message runtime.
//!
//! Descriptors are built once (in code via `MessageDescriptor::builder`,
//! or from a JSON schema document via `DescriptorPool`) and shared by
//! every message instance through `Arc`.

pub mod descriptor;
pub mod error;
pub mod schema;

pub use descriptor::{
    Cardinality, FieldDescriptor, FieldKind, FieldSpec, MessageDescriptor,
    MessageDescriptorBuilder, WireKind, MAX_FIELD_NUMBER,
};
pub use error::SchemaError;
pub use schema::{DescriptorPool, FieldDef, Label, MessageDef, SchemaDef};
