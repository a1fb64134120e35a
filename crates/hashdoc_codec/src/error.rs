//! Error types for the key codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding store keys.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The key does not carry the expected `prefix:keyField:` lead.
    #[error("key {key:?} does not match layout {prefix}:{key_field}:...")]
    KeyMismatch {
        /// The key that failed to decode.
        key: String,
        /// Expected type prefix.
        prefix: String,
        /// Expected key field name.
        key_field: String,
    },
}

impl CodecError {
    /// Creates a key mismatch error.
    pub fn key_mismatch(
        key: impl Into<String>,
        prefix: impl Into<String>,
        key_field: impl Into<String>,
    ) -> Self {
        Self::KeyMismatch {
            key: key.into(),
            prefix: prefix.into(),
            key_field: key_field.into(),
        }
    }
}
