//! Entity type schemas.

use hashdoc_codec::{build_pattern, encode_key};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// How a record obtains its primary key on first save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// Generate a time-ordered random identifier (UUIDv7, simple form)
    /// when the key field is empty.
    #[default]
    Generated,
    /// The caller must supply the key; an empty key field fails the save.
    Required,
}

/// A named category of records.
///
/// A schema carries everything the engine needs to lay out store keys
/// for one entity type: the type prefix, the primary-key field name, the
/// key strategy, and the ordered set of queryable attribute names.
/// Queryable attributes participate in both key construction and
/// predicate matching; the set may be empty.
///
/// The prefix, key field, and attribute names must not contain `:` - they
/// become key segments verbatim.
#[derive(Debug, Clone)]
pub struct Schema {
    prefix: String,
    key_field: String,
    key_strategy: KeyStrategy,
    queryable: BTreeSet<String>,
}

impl Schema {
    /// Starts building a schema for the given type prefix.
    #[must_use]
    pub fn builder(prefix: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            prefix: prefix.into(),
            key_field: "id".to_string(),
            key_strategy: KeyStrategy::default(),
            queryable: BTreeSet::new(),
        }
    }

    /// Returns the type prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the primary-key field name.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Returns the key strategy.
    #[must_use]
    pub fn key_strategy(&self) -> KeyStrategy {
        self.key_strategy
    }

    /// Returns the queryable attribute names in ascending order.
    #[must_use]
    pub fn queryable(&self) -> &BTreeSet<String> {
        &self.queryable
    }

    /// Returns true when `name` may appear in a predicate: the key field
    /// or a declared queryable attribute.
    #[must_use]
    pub fn is_searchable(&self, name: &str) -> bool {
        name == self.key_field || self.queryable.contains(name)
    }

    /// Generates a fresh primary key under the `Generated` strategy.
    ///
    /// UUIDv7 in simple form: random, time-ordered, and free of `:`.
    #[must_use]
    pub fn generate_key(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }

    /// Computes the store key for a record with the given key value and
    /// attribute values.
    #[must_use]
    pub fn store_key(&self, key_value: &str, values: &BTreeMap<String, String>) -> String {
        encode_key(
            &self.prefix,
            &self.key_field,
            key_value,
            &self.queryable,
            values,
        )
    }

    /// Computes the scan pattern for a set of predicate constraints.
    #[must_use]
    pub fn scan_pattern(&self, constraints: &BTreeMap<String, String>) -> String {
        build_pattern(&self.prefix, &self.key_field, &self.queryable, constraints)
    }
}

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    prefix: String,
    key_field: String,
    key_strategy: KeyStrategy,
    queryable: BTreeSet<String>,
}

impl SchemaBuilder {
    /// Sets the primary-key field name (default `"id"`).
    #[must_use]
    pub fn key_field(mut self, name: impl Into<String>) -> Self {
        self.key_field = name.into();
        self
    }

    /// Sets the key strategy (default [`KeyStrategy::Generated`]).
    #[must_use]
    pub fn key_strategy(mut self, strategy: KeyStrategy) -> Self {
        self.key_strategy = strategy;
        self
    }

    /// Declares one queryable attribute.
    #[must_use]
    pub fn queryable(mut self, name: impl Into<String>) -> Self {
        self.queryable.insert(name.into());
        self
    }

    /// Finishes the schema.
    #[must_use]
    pub fn build(self) -> Schema {
        Schema {
            prefix: self.prefix,
            key_field: self.key_field,
            key_strategy: self.key_strategy,
            queryable: self.queryable,
        }
    }
}
