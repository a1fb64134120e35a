//! Collection handles and the record persistence protocol.

use crate::error::{CoreError, CoreResult};
use crate::hook::{Hooks, Lifecycle};
use crate::query::Query;
use crate::record::Record;
use crate::schema::{KeyStrategy, Schema};
use hashdoc_codec::SEPARATOR;
use hashdoc_store::{StoreAdapter, StoreOp};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A handle to one entity type on one store.
///
/// Collections are constructed with an explicit store reference - there
/// is no process-wide registry of adapters. A collection is cheap to
/// clone and safe to share across threads; each operation is a single
/// blocking round-trip sequence against the adapter.
///
/// # Example
///
/// ```
/// use hashdoc_core::{Collection, Schema};
/// use hashdoc_store::InMemoryStore;
/// use std::sync::Arc;
///
/// let schema = Schema::builder("orders").queryable("status").build();
/// let orders = Collection::new(schema, Arc::new(InMemoryStore::new()));
///
/// let mut record = orders.new_record();
/// record.set("id", "o1");
/// record.set("status", "pending");
/// orders.save(&mut record).unwrap();
///
/// let found = orders.find("o1").unwrap().unwrap();
/// assert_eq!(found.get("status"), Some("pending"));
/// ```
#[derive(Clone)]
pub struct Collection {
    schema: Arc<Schema>,
    store: Arc<dyn StoreAdapter>,
    hooks: Arc<Hooks>,
}

impl Collection {
    /// Creates a collection with no lifecycle hooks.
    #[must_use]
    pub fn new(schema: Schema, store: Arc<dyn StoreAdapter>) -> Self {
        Self::with_hooks(schema, store, Hooks::new())
    }

    /// Creates a collection with an explicit hook set.
    #[must_use]
    pub fn with_hooks(schema: Schema, store: Arc<dyn StoreAdapter>, hooks: Hooks) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
            hooks: Arc::new(hooks),
        }
    }

    /// Returns the collection's schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn schema_arc(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    pub(crate) fn store(&self) -> &dyn StoreAdapter {
        self.store.as_ref()
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Creates a new Transient record of this type.
    #[must_use]
    pub fn new_record(&self) -> Record {
        Record::transient(Arc::clone(&self.schema))
    }

    /// Starts a query against this collection.
    #[must_use]
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Finds a record by primary key.
    pub fn find(&self, id: &str) -> CoreResult<Option<Record>> {
        self.query().find(id)
    }

    /// Finds a record by primary key, failing with
    /// [`CoreError::NotFound`] when absent.
    pub fn find_or_fail(&self, id: &str) -> CoreResult<Record> {
        self.query().find_or_fail(id)
    }

    /// Saves a record: inserts a Transient one, updates a Persisted one.
    ///
    /// Inserting validates the primary key (generating one under
    /// [`KeyStrategy::Generated`]) and fails with
    /// [`CoreError::DuplicateKey`] when the computed store key is
    /// occupied. Updating is a no-op when nothing is dirty; a dirty key
    /// field or queryable attribute changes the store key itself and is
    /// written as a delete-old/insert-new move. No lock is held across
    /// the move - a concurrent reader can observe neither or both keys.
    pub fn save(&self, record: &mut Record) -> CoreResult<()> {
        self.hooks.fire(Lifecycle::Saving, record);
        if record.exists() {
            self.update(record)?;
        } else {
            self.insert(record)?;
        }
        self.hooks.fire(Lifecycle::Saved, record);
        Ok(())
    }

    fn insert(&self, record: &mut Record) -> CoreResult<()> {
        let key_field = self.schema.key_field();
        let key_value = match record.primary_key() {
            Some(value) => value.to_string(),
            None => match self.schema.key_strategy() {
                KeyStrategy::Generated => {
                    let generated = self.schema.generate_key();
                    record.set(key_field, generated.clone());
                    generated
                }
                KeyStrategy::Required => return Err(CoreError::key_missing(key_field)),
            },
        };
        if key_value.contains(SEPARATOR) {
            return Err(CoreError::invalid_key(key_value));
        }

        let store_key = self.schema.store_key(&key_value, record.attributes());
        if self.store.exists(&store_key)? {
            return Err(CoreError::duplicate_key(store_key));
        }

        self.hooks.fire(Lifecycle::Creating, record);
        // The key field is written as a hash field too, so the hash is
        // never empty even for schemas with no other attributes.
        self.store.set_fields(&store_key, record.attributes())?;
        debug!(key = %store_key, "inserted record");

        record.sync_original();
        self.hooks.fire(Lifecycle::Created, record);
        Ok(())
    }

    fn update(&self, record: &mut Record) -> CoreResult<()> {
        if !record.is_dirty() {
            return Ok(());
        }
        self.hooks.fire(Lifecycle::Updating, record);

        let key_field = self.schema.key_field();
        let dirty = record.dirty();
        let removed = record.removed();
        let key_shape_changed = dirty.contains_key(key_field)
            || removed.iter().any(|name| name == key_field)
            || self
                .schema
                .queryable()
                .iter()
                .any(|attr| dirty.contains_key(attr) || removed.contains(attr));

        let old_key_value = record
            .original()
            .get(key_field)
            .cloned()
            .unwrap_or_default();
        let old_key = self.schema.store_key(&old_key_value, record.original());

        if key_shape_changed {
            // The store has no atomic rename, so a changed key is a
            // logical move: drop the old hash, write the full set fresh.
            let new_key_value = record
                .primary_key()
                .ok_or_else(|| CoreError::key_missing(key_field))?
                .to_string();
            if new_key_value.contains(SEPARATOR) {
                return Err(CoreError::invalid_key(new_key_value));
            }
            let new_key = self.schema.store_key(&new_key_value, record.attributes());

            self.store.pipeline(&[
                StoreOp::DeleteKey {
                    key: old_key.clone(),
                },
                StoreOp::SetFields {
                    key: new_key.clone(),
                    fields: record.attributes().clone(),
                },
            ])?;
            debug!(old = %old_key, new = %new_key, "moved record");
        } else {
            let mut ops = Vec::new();
            if !dirty.is_empty() {
                ops.push(StoreOp::SetFields {
                    key: old_key.clone(),
                    fields: dirty,
                });
            }
            if !removed.is_empty() {
                ops.push(StoreOp::DeleteFields {
                    key: old_key.clone(),
                    fields: removed,
                });
            }
            self.store.pipeline(&ops)?;
            debug!(key = %old_key, "updated record in place");
        }

        record.sync_original();
        self.hooks.fire(Lifecycle::Updated, record);
        Ok(())
    }

    /// Deletes a Persisted record's hash. No-op on a Transient record.
    pub fn delete(&self, record: &mut Record) -> CoreResult<()> {
        if !record.exists() {
            return Ok(());
        }
        self.hooks.fire(Lifecycle::Deleting, record);

        let key_value = record
            .original()
            .get(self.schema.key_field())
            .cloned()
            .unwrap_or_default();
        let key = self.schema.store_key(&key_value, record.original());
        self.store.delete_key(&key)?;
        debug!(key = %key, "deleted record");

        record.mark_deleted();
        self.hooks.fire(Lifecycle::Deleted, record);
        Ok(())
    }

    /// Re-fetches a Persisted record and resets its snapshot. A record
    /// whose hash has vanished is marked Deleted. No-op on Transient.
    pub fn refresh(&self, record: &mut Record) -> CoreResult<()> {
        if !record.exists() {
            return Ok(());
        }
        let Some(id) = record.primary_key().map(str::to_string) else {
            return Ok(());
        };
        match self.find(&id)? {
            Some(fresh) => *record = fresh,
            None => record.mark_deleted(),
        }
        Ok(())
    }

    /// Applies a batch of field writes and deletes under one store key
    /// as a single pipelined unit. A `None` delta deletes the field.
    pub fn insert_or_update(
        &self,
        store_key: &str,
        deltas: &BTreeMap<String, Option<String>>,
    ) -> CoreResult<()> {
        let mut sets = BTreeMap::new();
        let mut dels = Vec::new();
        for (field, delta) in deltas {
            match delta {
                Some(value) => {
                    sets.insert(field.clone(), value.clone());
                }
                None => dels.push(field.clone()),
            }
        }

        let mut ops = Vec::new();
        if !sets.is_empty() {
            ops.push(StoreOp::SetFields {
                key: store_key.to_string(),
                fields: sets,
            });
        }
        if !dels.is_empty() {
            ops.push(StoreOp::DeleteFields {
                key: store_key.to_string(),
                fields: dels,
            });
        }
        self.store.pipeline(&ops)?;
        Ok(())
    }

    /// Removes a store key outright.
    pub fn destroy_key(&self, store_key: &str) -> CoreResult<()> {
        self.store.delete_key(store_key)?;
        Ok(())
    }

    /// Sets a store key's time-to-live in seconds.
    pub fn expire_key(&self, store_key: &str, seconds: u64) -> CoreResult<()> {
        self.store.set_expiry(store_key, seconds)?;
        Ok(())
    }

    /// Returns a store key's remaining time-to-live, when it has one.
    pub fn key_expiry(&self, store_key: &str) -> CoreResult<Option<u64>> {
        Ok(self.store.get_expiry(store_key)?)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("prefix", &self.schema.prefix())
            .field("queryable", &self.schema.queryable())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdoc_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn orders(store: &Arc<InMemoryStore>) -> Collection {
        let schema = Schema::builder("orders")
            .key_strategy(KeyStrategy::Required)
            .queryable("status")
            .build();
        Collection::new(schema, Arc::clone(store) as Arc<dyn StoreAdapter>)
    }

    fn pending_order(orders: &Collection, id: &str) -> Record {
        let mut record = orders.new_record();
        record.set("id", id);
        record.set("status", "pending");
        record.set("note", "rush");
        orders.save(&mut record).unwrap();
        record
    }

    #[test]
    fn insert_writes_encoded_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        pending_order(&orders, "o1");

        assert!(store.exists("orders:id:o1:status:pending").unwrap());
        let fields = store.get_fields("orders:id:o1:status:pending").unwrap();
        assert_eq!(fields.get("id").map(String::as_str), Some("o1"));
        assert_eq!(fields.get("note").map(String::as_str), Some("rush"));
    }

    #[test]
    fn insert_requires_key_under_required_strategy() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = orders.new_record();
        record.set("status", "pending");

        let err = orders.save(&mut record).unwrap_err();
        assert!(matches!(err, CoreError::KeyMissing { .. }));
        assert!(!record.exists());
    }

    #[test]
    fn insert_generates_key_under_generated_strategy() {
        let store = Arc::new(InMemoryStore::new());
        let schema = Schema::builder("orders").build();
        let orders = Collection::new(schema, Arc::clone(&store) as Arc<dyn StoreAdapter>);

        let mut record = orders.new_record();
        orders.save(&mut record).unwrap();

        let id = record.primary_key().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(store.exists(&format!("orders:id:{id}")).unwrap());
    }

    #[test]
    fn insert_rejects_separator_in_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = orders.new_record();
        record.set("id", "o:1");

        let err = orders.save(&mut record).unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }

    #[test]
    fn insert_rejects_duplicate_store_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        pending_order(&orders, "o1");

        let mut dup = orders.new_record();
        dup.set("id", "o1");
        dup.set("status", "pending");
        let err = orders.save(&mut dup).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateKey { .. }));
    }

    #[test]
    fn clean_update_is_a_noop() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        orders.save(&mut record).unwrap();
        assert!(store.exists("orders:id:o1:status:pending").unwrap());
    }

    #[test]
    fn non_queryable_update_stays_in_place() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.set("note", "gift");
        orders.save(&mut record).unwrap();

        assert!(store.exists("orders:id:o1:status:pending").unwrap());
        assert_eq!(
            store
                .get_field("orders:id:o1:status:pending", "note")
                .unwrap()
                .as_deref(),
            Some("gift")
        );
    }

    #[test]
    fn queryable_change_moves_the_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.set("status", "done");
        orders.save(&mut record).unwrap();

        assert!(!store.exists("orders:id:o1:status:pending").unwrap());
        assert!(store.exists("orders:id:o1:status:done").unwrap());
        // Non-key attributes survive the move.
        assert_eq!(
            store
                .get_field("orders:id:o1:status:done", "note")
                .unwrap()
                .as_deref(),
            Some("rush")
        );
    }

    #[test]
    fn nullability_flip_moves_the_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.unset("status");
        orders.save(&mut record).unwrap();
        assert!(!store.exists("orders:id:o1:status:pending").unwrap());
        assert!(store.exists("orders:id:o1:status:null").unwrap());

        record.set("status", "pending");
        orders.save(&mut record).unwrap();
        assert!(!store.exists("orders:id:o1:status:null").unwrap());
        assert!(store.exists("orders:id:o1:status:pending").unwrap());
    }

    #[test]
    fn key_field_change_moves_the_key() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.set("id", "o2");
        orders.save(&mut record).unwrap();

        assert!(!store.exists("orders:id:o1:status:pending").unwrap());
        assert!(store.exists("orders:id:o2:status:pending").unwrap());
    }

    #[test]
    fn removed_attribute_deletes_its_field() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.unset("note");
        orders.save(&mut record).unwrap();

        assert_eq!(
            store
                .get_field("orders:id:o1:status:pending", "note")
                .unwrap(),
            None
        );
    }

    #[test]
    fn delete_removes_hash_and_marks_record() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        orders.delete(&mut record).unwrap();
        assert!(!record.exists());
        assert!(!store.exists("orders:id:o1:status:pending").unwrap());

        // Deleting again is a no-op.
        orders.delete(&mut record).unwrap();
    }

    #[test]
    fn refresh_resnapshots_from_store() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        record.set("note", "local only");
        orders.refresh(&mut record).unwrap();
        assert_eq!(record.get("note"), Some("rush"));
        assert!(!record.is_dirty());
    }

    #[test]
    fn refresh_of_vanished_record_marks_deleted() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = pending_order(&orders, "o1");

        store.delete_key("orders:id:o1:status:pending").unwrap();
        orders.refresh(&mut record).unwrap();
        assert!(!record.exists());
    }

    #[test]
    fn refresh_is_a_noop_on_transient() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        let mut record = orders.new_record();
        record.set("id", "o1");

        orders.refresh(&mut record).unwrap();
        assert!(!record.exists());
        assert_eq!(record.get("id"), Some("o1"));
    }

    #[test]
    fn insert_or_update_mixes_sets_and_deletes() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        pending_order(&orders, "o1");

        let deltas = BTreeMap::from([
            ("note".to_string(), None),
            ("total".to_string(), Some("42".to_string())),
        ]);
        orders
            .insert_or_update("orders:id:o1:status:pending", &deltas)
            .unwrap();

        let fields = store.get_fields("orders:id:o1:status:pending").unwrap();
        assert_eq!(fields.get("total").map(String::as_str), Some("42"));
        assert!(!fields.contains_key("note"));
    }

    #[test]
    fn expiry_passthroughs() {
        let store = Arc::new(InMemoryStore::new());
        let orders = orders(&store);
        pending_order(&orders, "o1");

        let key = "orders:id:o1:status:pending";
        assert_eq!(orders.key_expiry(key).unwrap(), None);
        orders.expire_key(key, 120).unwrap();
        assert_eq!(orders.key_expiry(key).unwrap(), Some(120));

        orders.destroy_key(key).unwrap();
        assert!(!store.exists(key).unwrap());
    }

    #[test]
    fn lifecycle_hooks_fire_in_protocol_order() {
        let store = Arc::new(InMemoryStore::new());
        let log: Arc<std::sync::Mutex<Vec<&'static str>>> =
            Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut hooks = Hooks::new();
        for (event, label) in [
            (Lifecycle::Saving, "saving"),
            (Lifecycle::Creating, "creating"),
            (Lifecycle::Created, "created"),
            (Lifecycle::Updating, "updating"),
            (Lifecycle::Updated, "updated"),
            (Lifecycle::Saved, "saved"),
            (Lifecycle::Deleting, "deleting"),
            (Lifecycle::Deleted, "deleted"),
        ] {
            let log = Arc::clone(&log);
            hooks = hooks.on(event, move |_| log.lock().unwrap().push(label));
        }

        let schema = Schema::builder("orders")
            .key_strategy(KeyStrategy::Required)
            .queryable("status")
            .build();
        let orders =
            Collection::with_hooks(schema, Arc::clone(&store) as Arc<dyn StoreAdapter>, hooks);

        let mut record = orders.new_record();
        record.set("id", "o1");
        record.set("status", "pending");
        orders.save(&mut record).unwrap();
        record.set("status", "done");
        orders.save(&mut record).unwrap();
        orders.delete(&mut record).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "saving", "creating", "created", "saved", //
                "saving", "updating", "updated", "saved", //
                "deleting", "deleted",
            ]
        );
    }

    #[test]
    fn hook_observes_generated_key() {
        let store = Arc::new(InMemoryStore::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let hooks = Hooks::new().on(Lifecycle::Created, move |record| {
            if record.primary_key().is_some() {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });
        let orders = Collection::with_hooks(
            Schema::builder("orders").build(),
            Arc::clone(&store) as Arc<dyn StoreAdapter>,
            hooks,
        );

        let mut record = orders.new_record();
        orders.save(&mut record).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
