//! Store-key encoding and decoding.
//!
//! A store key is `prefix:keyField:keyValue`, followed by one
//! `:name:value` pair per queryable attribute in ascending name order.
//! Attributes with no value (absent or empty string) render as the
//! literal token [`NULL_TOKEN`]; the two cases are indistinguishable in
//! the persisted key.

use crate::error::{CodecError, CodecResult};
use std::collections::{BTreeMap, BTreeSet};

/// Segment separator inside store keys.
pub const SEPARATOR: char = ':';

/// Token standing in for an absent or empty attribute value.
pub const NULL_TOKEN: &str = "null";

/// Encodes a record's identity and queryable attribute values into its
/// store key.
///
/// The queryable set is a `BTreeSet`, so attribute segments always emerge
/// in ascending lexicographic order regardless of how `values` was built.
/// Key construction and pattern construction share this ordering; if they
/// ever diverged, matches would silently fail.
#[must_use]
pub fn encode_key(
    prefix: &str,
    key_field: &str,
    key_value: &str,
    queryable: &BTreeSet<String>,
    values: &BTreeMap<String, String>,
) -> String {
    let mut key = String::with_capacity(prefix.len() + key_field.len() + key_value.len() + 2);
    key.push_str(prefix);
    key.push(SEPARATOR);
    key.push_str(key_field);
    key.push(SEPARATOR);
    key.push_str(key_value);

    for attr in queryable {
        let value = values
            .get(attr)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .unwrap_or(NULL_TOKEN);
        key.push(SEPARATOR);
        key.push_str(attr);
        key.push(SEPARATOR);
        key.push_str(value);
    }

    key
}

/// Extracts the primary-key value from a store key.
///
/// Exact inverse of [`encode_key`]'s key-field segment for every key this
/// codec produces. Trailing attribute segments are not decoded; callers
/// read those from the fetched hash fields.
///
/// # Errors
///
/// Returns [`CodecError::KeyMismatch`] when the key does not start with
/// `prefix:keyField:`.
pub fn decode_primary_key(key: &str, prefix: &str, key_field: &str) -> CodecResult<String> {
    let lead = format!("{prefix}{SEPARATOR}{key_field}{SEPARATOR}");
    let rest = key
        .strip_prefix(&lead)
        .ok_or_else(|| CodecError::key_mismatch(key, prefix, key_field))?;
    let value = match rest.find(SEPARATOR) {
        Some(end) => &rest[..end],
        None => rest,
    };
    Ok(value.to_string())
}
