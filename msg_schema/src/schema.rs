//! Schema loading — JSON schema document → descriptor pool.
//!
//! - `SchemaDef` / `MessageDef` / `FieldDef`: strict serde model of the
//!   document (`deny_unknown_fields`, no silent defaults beyond the
//!   documented ones)
//! - `DescriptorPool::from_json` / `from_file`: parse, resolve message
//!   type references, build frozen descriptors
//!
//! Message types are built dependency-first, so a nested type always
//! exists before the field that refers to it. Recursive types are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::descriptor::{FieldKind, FieldSpec, MessageDescriptor};
use crate::error::SchemaError;

// ── Document Model ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDef {
    pub messages: Vec<MessageDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageDef {
    pub name: String,
    #[serde(default)]
    pub message_set_wire_format: bool,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    #[serde(default)]
    pub label: Label,
    #[serde(default)]
    pub packed: bool,
    /// Full name of the nested type; only for `"kind": "message"`.
    #[serde(default)]
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

// ── Pool ───────────────────────────────────────────────────────────

/// Every message type of one schema document, by full name.
#[derive(Debug, Default)]
pub struct DescriptorPool {
    messages: BTreeMap<String, Arc<MessageDescriptor>>,
}

impl DescriptorPool {
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let def: SchemaDef = serde_json::from_str(json)?;
        Self::from_def(&def)
    }

    pub fn from_file(path: &Path) -> Result<Self, SchemaError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Resolve and build every message declared in `def`.
    pub fn from_def(def: &SchemaDef) -> Result<Self, SchemaError> {
        let mut decls: BTreeMap<&str, &MessageDef> = BTreeMap::new();
        for m in &def.messages {
            if decls.insert(m.name.as_str(), m).is_some() {
                return Err(SchemaError::DuplicateMessage(m.name.clone()));
            }
        }

        let mut pool = DescriptorPool::default();
        let mut visiting = BTreeSet::new();
        for name in decls.keys() {
            pool.resolve(name, &decls, &mut visiting)?;
        }

        debug!(messages = pool.messages.len(), "descriptor pool built");
        Ok(pool)
    }

    pub fn get(&self, full_name: &str) -> Option<&Arc<MessageDescriptor>> {
        self.messages.get(full_name)
    }

    /// Full names of all message types, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.messages.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn resolve(
        &mut self,
        name: &str,
        decls: &BTreeMap<&str, &MessageDef>,
        visiting: &mut BTreeSet<String>,
    ) -> Result<Arc<MessageDescriptor>, SchemaError> {
        if let Some(built) = self.messages.get(name) {
            return Ok(Arc::clone(built));
        }
        if !visiting.insert(name.to_string()) {
            return Err(SchemaError::RecursiveType(name.to_string()));
        }

        let def = decls[name];
        let mut builder = MessageDescriptor::builder(&def.name)
            .message_set_wire_format(def.message_set_wire_format);

        for f in &def.fields {
            let mut spec = match f.label {
                Label::Optional => FieldSpec::optional(&f.name, f.number, f.kind),
                Label::Required => FieldSpec::required(&f.name, f.number, f.kind),
                Label::Repeated => FieldSpec::repeated(&f.name, f.number, f.kind),
            };
            spec.packed = f.packed;

            match (&f.type_name, f.kind) {
                (Some(type_name), FieldKind::Message) => {
                    if !decls.contains_key(type_name.as_str()) {
                        return Err(SchemaError::UnresolvedType {
                            message: def.name.clone(),
                            field: f.name.clone(),
                            type_name: type_name.clone(),
                        });
                    }
                    let nested = self.resolve(type_name, decls, visiting)?;
                    spec = spec.of_type(&nested);
                }
                (Some(_), _) => {
                    return Err(SchemaError::InvalidField {
                        message: def.name.clone(),
                        field: f.name.clone(),
                        reason: "type_name is only valid on message fields".to_string(),
                    });
                }
                (None, _) => {}
            }
            builder = builder.field(spec);
        }

        let built = builder.build()?;
        visiting.remove(name);
        self.messages.insert(name.to_string(), Arc::clone(&built));
        Ok(built)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
