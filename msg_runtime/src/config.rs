//! Decoder configuration.
//!
//! Strict deserialization: unknown keys are rejected, missing keys take
//! the documented defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default nesting limit for messages and groups.
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

/// Default upper bound on a single encoded message (64 MiB).
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeOptions {
    /// Maximum depth of nested messages and groups.
    pub recursion_limit: u32,
    /// Inputs (or length-delimited frames) longer than this are refused.
    pub max_message_len: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl DecodeOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn missing_keys_take_defaults() {
        let opts = DecodeOptions::from_json(r#"{"recursion_limit": 8}"#).unwrap();
        assert_eq!(opts.recursion_limit, 8);
        assert_eq!(opts.max_message_len, DEFAULT_MAX_MESSAGE_LEN);
        assert_eq!(DecodeOptions::from_json("{}").unwrap(), DecodeOptions::default());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = DecodeOptions::from_json(r#"{"recursion": 8}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn file_roundtrip() {
        let dir = std::env::temp_dir().join("msg_runtime_config_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("decode.json");
        let opts = DecodeOptions {
            recursion_limit: 4,
            max_message_len: 1024,
        };
        std::fs::write(&path, serde_json::to_string(&opts).unwrap()).unwrap();
        assert_eq!(DecodeOptions::from_file(&path).unwrap(), opts);
    }
}
