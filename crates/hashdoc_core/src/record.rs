//! Record instances.

use crate::schema::Schema;
use crate::value::Scalar;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A mutable record of one entity type.
///
/// Attributes are string-typed - the store holds nothing else; richer
/// typing is applied at the [`Scalar`] boundary. A record tracks the
/// snapshot of its attributes as of the last load or save (`original`)
/// to compute dirty state, and whether a hash has been written for it
/// (`exists`).
///
/// Lifecycle: constructed Transient (`exists = false`), a successful
/// save makes it Persisted (`exists = true`), a delete makes it Deleted
/// (`exists = false`, terminal for this instance - load a fresh one to
/// continue).
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<Schema>,
    attributes: BTreeMap<String, String>,
    original: BTreeMap<String, String>,
    exists: bool,
}

impl Record {
    /// Creates an unattached record with no attributes.
    #[must_use]
    pub fn transient(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            attributes: BTreeMap::new(),
            original: BTreeMap::new(),
            exists: false,
        }
    }

    /// Creates a record hydrated from fetched hash fields.
    ///
    /// The record is Persisted and clean: `original` starts as the
    /// fetched attributes.
    #[must_use]
    pub(crate) fn hydrated(schema: Arc<Schema>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            schema,
            original: attributes.clone(),
            attributes,
            exists: true,
        }
    }

    /// Returns the record's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns true when a hash has been written for this record.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Returns an attribute value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Sets an attribute from a scalar, rendering it to its stored form.
    pub fn set_scalar(&mut self, name: impl Into<String>, value: &Scalar) {
        self.attributes.insert(name.into(), value.render());
    }

    /// Removes an attribute.
    pub fn unset(&mut self, name: &str) {
        self.attributes.remove(name);
    }

    /// Returns the current attributes.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Returns the snapshot as of the last load or save.
    #[must_use]
    pub fn original(&self) -> &BTreeMap<String, String> {
        &self.original
    }

    /// Returns the primary-key value, when present and non-empty.
    #[must_use]
    pub fn primary_key(&self) -> Option<&str> {
        self.get(self.schema.key_field()).filter(|v| !v.is_empty())
    }

    /// Returns true when any attribute differs from the snapshot.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.attributes != self.original
    }

    /// Returns the attributes that were added or changed since the
    /// snapshot. On a Transient record this is every attribute.
    #[must_use]
    pub fn dirty(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .filter(|(name, value)| self.original.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Returns the attribute names removed since the snapshot.
    #[must_use]
    pub fn removed(&self) -> Vec<String> {
        self.original
            .keys()
            .filter(|name| !self.attributes.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Marks the record Persisted and resets the snapshot to the current
    /// attributes.
    pub(crate) fn sync_original(&mut self) {
        self.original = self.attributes.clone();
        self.exists = true;
    }

    /// Marks the record Deleted. The snapshot is cleared so a later save
    /// of this instance is treated as a fresh insert.
    pub(crate) fn mark_deleted(&mut self) {
        self.original.clear();
        self.exists = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::builder("orders").queryable("status").build())
    }

    #[test]
    fn transient_record_is_fully_dirty() {
        let mut record = Record::transient(schema());
        assert!(!record.exists());
        assert!(!record.is_dirty());

        record.set("id", "o1");
        record.set("status", "pending");

        assert!(record.is_dirty());
        assert_eq!(record.dirty().len(), 2);
        assert!(record.removed().is_empty());
    }

    #[test]
    fn sync_original_clears_dirty_state() {
        let mut record = Record::transient(schema());
        record.set("id", "o1");
        record.sync_original();

        assert!(record.exists());
        assert!(!record.is_dirty());
        assert!(record.dirty().is_empty());
    }

    #[test]
    fn dirty_tracks_changes_and_additions() {
        let mut record = Record::hydrated(
            schema(),
            BTreeMap::from([
                ("id".to_string(), "o1".to_string()),
                ("status".to_string(), "pending".to_string()),
            ]),
        );

        record.set("status", "done");
        record.set("note", "rush");

        let dirty = record.dirty();
        assert_eq!(dirty.get("status").map(String::as_str), Some("done"));
        assert_eq!(dirty.get("note").map(String::as_str), Some("rush"));
        assert!(!dirty.contains_key("id"));
    }

    #[test]
    fn removed_tracks_unset_attributes() {
        let mut record = Record::hydrated(
            schema(),
            BTreeMap::from([
                ("id".to_string(), "o1".to_string()),
                ("note".to_string(), "rush".to_string()),
            ]),
        );

        record.unset("note");
        assert_eq!(record.removed(), vec!["note".to_string()]);
        assert!(record.is_dirty());
    }

    #[test]
    fn primary_key_requires_nonempty_value() {
        let mut record = Record::transient(schema());
        assert_eq!(record.primary_key(), None);

        record.set("id", "");
        assert_eq!(record.primary_key(), None);

        record.set("id", "o1");
        assert_eq!(record.primary_key(), Some("o1"));
    }

    #[test]
    fn scalar_setter_renders_stored_form() {
        let mut record = Record::transient(schema());
        record.set_scalar("status", &Scalar::Bool(true));
        record.set_scalar("total", &Scalar::Integer(42));

        assert_eq!(record.get("status"), Some("1"));
        assert_eq!(record.get("total"), Some("42"));
    }

    #[test]
    fn mark_deleted_resets_to_insertable() {
        let mut record = Record::hydrated(
            schema(),
            BTreeMap::from([("id".to_string(), "o1".to_string())]),
        );
        record.mark_deleted();

        assert!(!record.exists());
        assert!(record.original().is_empty());
        // Everything still present counts as dirty for a re-insert.
        assert_eq!(record.dirty().len(), 1);
    }
}
