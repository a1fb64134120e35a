//! Error types for HashDoc core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in HashDoc core operations.
///
/// All variants are raised synchronously at the point of violation; none
/// are retried internally. Store transport failures pass through as
/// [`CoreError::Store`] untranslated.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store adapter error.
    #[error("store error: {0}")]
    Store(#[from] hashdoc_store::StoreError),

    /// Key codec error.
    #[error("codec error: {0}")]
    Codec(#[from] hashdoc_codec::CodecError),

    /// Insert attempted with an empty primary key.
    #[error("record has no primary key: field {field:?} is empty")]
    KeyMissing {
        /// The primary-key field name.
        field: String,
    },

    /// The primary key contains the key-segment separator.
    #[error("invalid primary key {value:?}: must not contain ':'")]
    InvalidKey {
        /// The offending key value.
        value: String,
    },

    /// Insert attempted where a record already exists.
    #[error("duplicate record at store key {key}")]
    DuplicateKey {
        /// The occupied store key.
        key: String,
    },

    /// A predicate referenced an attribute outside the key field and the
    /// declared queryable set.
    #[error("attribute {name:?} is not searchable on type {prefix:?}")]
    AttributeNotSearchable {
        /// The attribute that was referenced.
        name: String,
        /// The entity type prefix.
        prefix: String,
    },

    /// A `*_or_fail` lookup matched nothing.
    #[error("no {prefix:?} record found")]
    NotFound {
        /// The entity type prefix.
        prefix: String,
    },
}

impl CoreError {
    /// Creates a key missing error.
    pub fn key_missing(field: impl Into<String>) -> Self {
        Self::KeyMissing {
            field: field.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(value: impl Into<String>) -> Self {
        Self::InvalidKey {
            value: value.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Creates an attribute-not-searchable error.
    pub fn attribute_not_searchable(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::AttributeNotSearchable {
            name: name.into(),
            prefix: prefix.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(prefix: impl Into<String>) -> Self {
        Self::NotFound {
            prefix: prefix.into(),
        }
    }
}
