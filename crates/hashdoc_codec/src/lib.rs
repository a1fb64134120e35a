//! # HashDoc Codec
//!
//! Store-key codec and query pattern builder for HashDoc.
//!
//! This crate holds the deterministic mapping between a record's identity
//! plus queryable attribute values and its store key, and the symmetric
//! glob-pattern construction used for predicate scans. Everything here is
//! pure string work - no I/O.
//!
//! ## Key grammar
//!
//! ```text
//! prefix:keyField:keyValue[:attr1:val1:attr2:val2:...]
//! ```
//!
//! Attribute segments appear only for queryable attributes, in ascending
//! name order, with absent/empty values rendered as the `null` token.
//! Key construction and pattern construction must share this layout
//! exactly, or matches silently fail.
//!
//! ## Usage
//!
//! ```
//! use hashdoc_codec::{build_pattern, decode_primary_key, encode_key};
//! use std::collections::{BTreeMap, BTreeSet};
//!
//! let queryable = BTreeSet::from(["status".to_string()]);
//! let values = BTreeMap::from([("status".to_string(), "pending".to_string())]);
//!
//! let key = encode_key("orders", "id", "o1", &queryable, &values);
//! assert_eq!(key, "orders:id:o1:status:pending");
//! assert_eq!(decode_primary_key(&key, "orders", "id").unwrap(), "o1");
//!
//! let pattern = build_pattern("orders", "id", &queryable, &values);
//! assert_eq!(pattern, "orders:id:*:status:pending");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod pattern;

pub use error::{CodecError, CodecResult};
pub use key::{decode_primary_key, encode_key, NULL_TOKEN, SEPARATOR};
pub use pattern::{build_pattern, decompose_pattern, has_glob_metachars, PatternParts};
