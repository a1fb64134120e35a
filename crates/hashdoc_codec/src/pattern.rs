//! Scan-pattern construction and decomposition.
//!
//! Patterns share [`super::key::encode_key`]'s segment layout, with `*`
//! standing in for any unconstrained attribute. Constraint values may
//! themselves carry glob wildcards for partial matching.

use crate::key::{NULL_TOKEN, SEPARATOR};
use std::collections::{BTreeMap, BTreeSet};

/// Builds a store-scannable glob pattern from a set of constraints.
///
/// Produces the same segment layout as `encode_key`, substituting `*` for
/// the key field and any queryable attribute without an entry in
/// `constraints`, and the constraint value verbatim otherwise. A
/// constraint of `"21*"` matches stored values `21`, `212`, `219` but not
/// `2`; a constraint equal to [`NULL_TOKEN`] matches records whose
/// attribute is absent or empty.
///
/// Glob metacharacters (`*`, `?`, `[`) inside a constraint value are NOT
/// escaped: the store will interpret them as wildcards, not literals.
#[must_use]
pub fn build_pattern(
    prefix: &str,
    key_field: &str,
    queryable: &BTreeSet<String>,
    constraints: &BTreeMap<String, String>,
) -> String {
    let key_part = constraints.get(key_field).map(String::as_str).unwrap_or("*");

    let mut pattern = String::new();
    pattern.push_str(prefix);
    pattern.push(SEPARATOR);
    pattern.push_str(key_field);
    pattern.push(SEPARATOR);
    pattern.push_str(key_part);

    for attr in queryable {
        let value = constraints.get(attr).map(String::as_str).unwrap_or("*");
        pattern.push(SEPARATOR);
        pattern.push_str(attr);
        pattern.push(SEPARATOR);
        pattern.push_str(value);
    }

    pattern
}

/// Returns true when `value` contains store glob metacharacters.
#[must_use]
pub fn has_glob_metachars(value: &str) -> bool {
    value.contains(['*', '?', '[', '\\'])
}

/// A pattern split back into its layout parts.
///
/// Produced by [`decompose_pattern`]. Values are verbatim pattern
/// segments: `"*"` for an unconstrained slot, possibly-wildcarded
/// fragments otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternParts {
    /// Leading type prefix segment.
    pub prefix: String,
    /// Constraint on the key-field segment (`"*"` when unconstrained).
    pub key_constraint: String,
    /// Constraint per queryable attribute, in attribute order.
    pub constraints: BTreeMap<String, String>,
}

impl PatternParts {
    /// Returns true when the constraint for `attr` pins a single concrete
    /// value an index set could serve: wildcard-free and not the null
    /// token (absent values have no per-value index set).
    #[must_use]
    pub fn is_index_servable(&self, attr: &str) -> bool {
        self.constraints
            .get(attr)
            .is_some_and(|v| v != "*" && v != NULL_TOKEN && !has_glob_metachars(v))
    }
}

/// Splits a pattern produced by [`build_pattern`] back into its parts,
/// validated against a known key layout.
///
/// Returns `None` when the segment count or the attribute-name segments
/// do not line up with `key_field` + `queryable` - the caller then treats
/// the pattern as opaque. Layout knowledge always comes from the caller's
/// schema; nothing is inferred from the key string itself.
#[must_use]
pub fn decompose_pattern(
    pattern: &str,
    key_field: &str,
    queryable: &BTreeSet<String>,
) -> Option<PatternParts> {
    let segments: Vec<&str> = pattern.split(SEPARATOR).collect();
    if segments.len() != 3 + 2 * queryable.len() {
        return None;
    }
    if segments[1] != key_field {
        return None;
    }

    let mut constraints = BTreeMap::new();
    for (slot, attr) in queryable.iter().enumerate() {
        let name = segments[3 + 2 * slot];
        let value = segments[4 + 2 * slot];
        if name != attr {
            return None;
        }
        constraints.insert(attr.clone(), value.to_string());
    }

    Some(PatternParts {
        prefix: segments[0].to_string(),
        key_constraint: segments[2].to_string(),
        constraints,
    })
}
