//! Secondary-index layer.
//!
//! [`IndexedStore`] wraps a base adapter and maintains, per registered
//! entity type, sorted sets of store keys scored by insertion time:
//! `idx:{prefix}` holds every record of a type, and
//! `idx:{prefix}:{attribute}:{value}` the records carrying one indexed
//! attribute value. Scans whose pattern maps onto a registered key layout
//! are served from those sets instead of walking the keyspace - the
//! optimization sharded deployments need, where a pattern scan touches
//! every shard.
//!
//! Index updates are separate calls around the base write, not atomic
//! with it. An expired hash leaves its index entries behind; they are
//! harmless for queries (vanished keys hydrate to nothing) and are
//! dropped by the next delete that touches the key.

use crate::schema::Schema;
use crate::value::index_value;
use hashdoc_codec::{decompose_pattern, has_glob_metachars, SEPARATOR};
use hashdoc_store::{
    glob_match, ScanPage, SortedSetOps, StoreAdapter, StoreOp, StoreResult,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Explicit registry of entity type schemas, keyed by prefix.
///
/// Every index operation consults this registry for the attribute list
/// of the type it is touching. Nothing is ever inferred from the shape
/// of a key string.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its prefix.
    #[must_use]
    pub fn register(mut self, schema: Schema) -> Self {
        self.types
            .insert(schema.prefix().to_string(), Arc::new(schema));
        self
    }

    /// Looks up a schema by type prefix.
    #[must_use]
    pub fn get(&self, prefix: &str) -> Option<&Arc<Schema>> {
        self.types.get(prefix)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true when no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A store adapter that maintains secondary indexes over a base adapter.
///
/// Writes to keys of registered types update the index sets before the
/// base write; deletes read the hash first to learn which entries exist,
/// remove them, then delete the hash. Keys of unregistered types pass
/// through untouched. See the module docs for the index layout.
#[derive(Debug)]
pub struct IndexedStore<S> {
    base: S,
    registry: SchemaRegistry,
}

fn type_set(prefix: &str) -> String {
    format!("idx:{prefix}")
}

fn attr_set(prefix: &str, attr: &str, value: &str) -> String {
    format!("idx:{prefix}:{attr}:{value}")
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .unwrap_or(0.0)
}

impl<S: StoreAdapter + SortedSetOps> IndexedStore<S> {
    /// Wraps a base store with an index layer over the given registry.
    #[must_use]
    pub fn new(base: S, registry: SchemaRegistry) -> Self {
        Self { base, registry }
    }

    /// Returns the wrapped base store.
    #[must_use]
    pub fn base(&self) -> &S {
        &self.base
    }

    /// Returns the schema registry.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn schema_for_key(&self, key: &str) -> Option<&Arc<Schema>> {
        let prefix = key.find(SEPARATOR).map_or(key, |end| &key[..end]);
        self.registry.get(prefix)
    }

    fn index_writes(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        let Some(schema) = self.schema_for_key(key) else {
            return Ok(());
        };
        let score = epoch_seconds();
        for (field, value) in fields {
            if !schema.queryable().contains(field) {
                continue;
            }
            let Some(normalized) = index_value(value) else {
                continue;
            };
            self.base
                .sorted_set_add(&attr_set(schema.prefix(), field, &normalized), key, score)?;
        }
        self.base
            .sorted_set_add(&type_set(schema.prefix()), key, score)?;
        Ok(())
    }

    fn unindex_key(&self, key: &str) -> StoreResult<()> {
        let Some(schema) = self.schema_for_key(key) else {
            return Ok(());
        };
        let fields = self.base.get_fields(key)?;
        for (field, value) in &fields {
            if !schema.queryable().contains(field) {
                continue;
            }
            let Some(normalized) = index_value(value) else {
                continue;
            };
            self.base
                .sorted_set_remove(&attr_set(schema.prefix(), field, &normalized), key)?;
        }
        self.base.sorted_set_remove(&type_set(schema.prefix()), key)?;
        Ok(())
    }

    fn unindex_fields(&self, key: &str, removed: &[String]) -> StoreResult<()> {
        let Some(schema) = self.schema_for_key(key) else {
            return Ok(());
        };
        let current = self.base.get_fields(key)?;
        for field in removed {
            if !schema.queryable().contains(field) {
                continue;
            }
            let Some(value) = current.get(field) else {
                continue;
            };
            let Some(normalized) = index_value(value) else {
                continue;
            };
            self.base
                .sorted_set_remove(&attr_set(schema.prefix(), field, &normalized), key)?;
        }
        Ok(())
    }

    /// Derives the candidate key set for a pattern, when the pattern maps
    /// confidently onto a registered key layout.
    ///
    /// Wildcard-free attribute constraints select per-value sets
    /// (intersected client-side when there are several); everything else
    /// decomposable falls to the type-wide set. All candidates are
    /// re-filtered through the glob matcher, so index-served and
    /// scan-served results are observably identical.
    fn index_candidates(&self, pattern: &str) -> StoreResult<Option<Vec<String>>> {
        let prefix = pattern.find(SEPARATOR).map_or(pattern, |end| &pattern[..end]);
        if has_glob_metachars(prefix) {
            return Ok(None);
        }
        let Some(schema) = self.registry.get(prefix) else {
            return Ok(None);
        };
        let Some(parts) = decompose_pattern(pattern, schema.key_field(), schema.queryable())
        else {
            return Ok(None);
        };

        let mut sets = Vec::new();
        for (attr, value) in &parts.constraints {
            if !parts.is_index_servable(attr) {
                continue;
            }
            if let Some(normalized) = index_value(value) {
                sets.push(attr_set(schema.prefix(), attr, &normalized));
            }
        }

        let mut candidates = match sets.split_first() {
            None => self.base.sorted_set_members(&type_set(schema.prefix()))?,
            Some((first, rest)) => {
                let mut members = self.base.sorted_set_members(first)?;
                for set in rest {
                    let others: HashSet<String> =
                        self.base.sorted_set_members(set)?.into_iter().collect();
                    members.retain(|key| others.contains(key));
                }
                members
            }
        };

        candidates.retain(|key| glob_match(pattern, key));
        Ok(Some(candidates))
    }
}

impl<S: StoreAdapter + SortedSetOps> StoreAdapter for IndexedStore<S> {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.base.exists(key)
    }

    fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        match self.index_candidates(pattern)? {
            Some(candidates) => {
                debug!(pattern, candidates = candidates.len(), "serving scan from index");
                let count = count.max(1);
                let start = cursor as usize;
                if start >= candidates.len() {
                    return Ok(ScanPage {
                        cursor: 0,
                        keys: Vec::new(),
                    });
                }
                let end = (start + count).min(candidates.len());
                let keys = candidates[start..end].to_vec();
                let cursor = if end < candidates.len() { end as u64 } else { 0 };
                Ok(ScanPage { cursor, keys })
            }
            None => {
                warn!(pattern, "pattern not index-servable, falling back to keyspace scan");
                self.base.scan(pattern, cursor, count)
            }
        }
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let fields = BTreeMap::from([(field.to_string(), value.to_string())]);
        self.index_writes(key, &fields)?;
        self.base.set_field(key, field, value)
    }

    fn set_fields(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        self.index_writes(key, fields)?;
        self.base.set_fields(key, fields)
    }

    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.base.get_field(key, field)
    }

    fn get_fields(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        self.base.get_fields(key)
    }

    fn delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<()> {
        self.unindex_fields(key, fields)?;
        self.base.delete_fields(key, fields)
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        self.unindex_key(key)?;
        self.base.delete_key(key)
    }

    fn set_expiry(&self, key: &str, seconds: u64) -> StoreResult<()> {
        self.base.set_expiry(key, seconds)
    }

    fn get_expiry(&self, key: &str) -> StoreResult<Option<u64>> {
        self.base.get_expiry(key)
    }

    fn pipeline(&self, ops: &[StoreOp]) -> StoreResult<()> {
        // Index maintenance happens before the batch lands: deletions
        // need the pre-image hash to know which entries to drop.
        for op in ops {
            match op {
                StoreOp::SetFields { key, fields } => self.index_writes(key, fields)?,
                StoreOp::DeleteFields { key, fields } => self.unindex_fields(key, fields)?,
                StoreOp::DeleteKey { key } => self.unindex_key(key)?,
                StoreOp::SetExpiry { .. } => {}
            }
        }
        self.base.pipeline(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::schema::KeyStrategy;
    use hashdoc_store::InMemoryStore;

    fn orders_schema() -> Schema {
        Schema::builder("orders")
            .key_strategy(KeyStrategy::Required)
            .queryable("status")
            .queryable("channel")
            .build()
    }

    fn indexed_store() -> Arc<IndexedStore<InMemoryStore>> {
        let registry = SchemaRegistry::new().register(orders_schema());
        Arc::new(IndexedStore::new(InMemoryStore::new(), registry))
    }

    fn orders(store: &Arc<IndexedStore<InMemoryStore>>) -> Collection {
        Collection::new(orders_schema(), Arc::clone(store) as Arc<dyn StoreAdapter>)
    }

    fn seed(orders: &Collection, id: &str, status: &str, channel: &str) -> String {
        let mut record = orders.new_record();
        record.set("id", id);
        record.set("status", status);
        record.set("channel", channel);
        orders.save(&mut record).unwrap();
        orders
            .schema()
            .store_key(id, record.attributes())
    }

    #[test]
    fn writes_populate_index_sets() {
        let store = indexed_store();
        let orders = orders(&store);
        let key = seed(&orders, "o1", "pending", "web");

        assert_eq!(
            store.base().sorted_set_members("idx:orders").unwrap(),
            vec![key.clone()]
        );
        assert_eq!(
            store
                .base()
                .sorted_set_members("idx:orders:status:pending")
                .unwrap(),
            vec![key.clone()]
        );
        assert_eq!(
            store
                .base()
                .sorted_set_members("idx:orders:channel:web")
                .unwrap(),
            vec![key]
        );
    }

    #[test]
    fn boolean_values_normalize_in_index_sets() {
        let schema = Schema::builder("flags")
            .key_strategy(KeyStrategy::Required)
            .queryable("active")
            .build();
        let registry = SchemaRegistry::new().register(schema.clone());
        let store = Arc::new(IndexedStore::new(InMemoryStore::new(), registry));
        let flags = Collection::new(schema, Arc::clone(&store) as Arc<dyn StoreAdapter>);

        let mut record = flags.new_record();
        record.set("id", "f1");
        record.set("active", "true");
        flags.save(&mut record).unwrap();

        assert_eq!(
            store
                .base()
                .sorted_set_members("idx:flags:active:1")
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .base()
            .sorted_set_members("idx:flags:active:true")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn empty_values_are_not_indexed() {
        let store = indexed_store();
        store
            .set_field("orders:id:o1:channel:null:status:null", "status", "")
            .unwrap();

        assert!(store
            .base()
            .sorted_set_members("idx:orders:status:")
            .unwrap()
            .is_empty());
        // The type-wide set still tracks the key.
        assert_eq!(store.base().sorted_set_members("idx:orders").unwrap().len(), 1);
    }

    #[test]
    fn unregistered_types_pass_through_unindexed() {
        let store = indexed_store();
        store.set_field("users:id:u1", "name", "ada").unwrap();

        assert!(store.base().sorted_set_members("idx:users").unwrap().is_empty());
        assert!(store.base().exists("users:id:u1").unwrap());
    }

    #[test]
    fn delete_clears_every_membership() {
        let store = indexed_store();
        let orders = orders(&store);
        let key = seed(&orders, "o1", "pending", "web");
        seed(&orders, "o2", "pending", "app");

        store.delete_key(&key).unwrap();

        assert!(!store.base().exists(&key).unwrap());
        for set in [
            "idx:orders",
            "idx:orders:status:pending",
            "idx:orders:channel:web",
        ] {
            assert!(
                !store
                    .base()
                    .sorted_set_members(set)
                    .unwrap()
                    .contains(&key),
                "{set} still holds the deleted key"
            );
        }
        // The other record's memberships survive.
        assert_eq!(store.base().sorted_set_members("idx:orders").unwrap().len(), 1);
    }

    #[test]
    fn move_updates_index_membership() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");

        let mut record = orders.find("o1").unwrap().unwrap();
        record.set("status", "done");
        orders.save(&mut record).unwrap();

        assert!(store
            .base()
            .sorted_set_members("idx:orders:status:pending")
            .unwrap()
            .is_empty());
        let done = store
            .base()
            .sorted_set_members("idx:orders:status:done")
            .unwrap();
        assert_eq!(done.len(), 1);
        assert!(done[0].contains(":status:done"));
        assert_eq!(store.base().sorted_set_members("idx:orders").unwrap().len(), 1);
    }

    #[test]
    fn servable_scan_avoids_keyspace_walk() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");
        seed(&orders, "o2", "done", "web");
        seed(&orders, "o3", "pending", "app");

        let results = orders
            .query()
            .where_eq("status", "pending")
            .unwrap()
            .all()
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(store.base().scan_calls(), 0);
    }

    #[test]
    fn multi_constraint_scan_intersects_sets() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");
        seed(&orders, "o2", "done", "web");
        seed(&orders, "o3", "pending", "app");

        let results = orders
            .query()
            .where_eq("status", "pending")
            .unwrap()
            .where_eq("channel", "web")
            .unwrap()
            .all()
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("id"), Some("o1"));
        assert_eq!(store.base().scan_calls(), 0);
    }

    #[test]
    fn null_constraint_serves_from_type_wide_set() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");

        let mut bare = orders.new_record();
        bare.set("id", "o2");
        orders.save(&mut bare).unwrap();

        let unset = orders
            .query()
            .where_eq("status", "null")
            .unwrap()
            .all()
            .unwrap();

        assert_eq!(unset.len(), 1);
        assert_eq!(unset[0].get("id"), Some("o2"));
        assert_eq!(store.base().scan_calls(), 0);
    }

    #[test]
    fn wildcard_constraint_filters_type_wide_set() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");
        seed(&orders, "o2", "paid", "web");
        seed(&orders, "o3", "done", "web");

        let results = orders
            .query()
            .where_eq("status", "p*")
            .unwrap()
            .all()
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(store.base().scan_calls(), 0);
    }

    #[test]
    fn unmapped_pattern_falls_back_to_base_scan() {
        let store = indexed_store();
        let orders = orders(&store);
        seed(&orders, "o1", "pending", "web");

        // Raw pattern, not shaped like the registered layout.
        let page = store.scan("orders:*", 0, 10).unwrap();
        assert_eq!(page.keys.len(), 1);
        assert_eq!(store.base().scan_calls(), 1);

        // Unregistered type prefix likewise.
        store.scan("users:id:*", 0, 10).unwrap();
        assert_eq!(store.base().scan_calls(), 2);

        // Registered and decomposable: served without the base scan.
        let served = store.scan("orders:id:*:channel:*:status:pending", 0, 10).unwrap();
        assert_eq!(served.keys.len(), 1);
        assert_eq!(store.base().scan_calls(), 2);
    }

    #[test]
    fn index_served_scan_paginates_with_cursor() {
        let store = indexed_store();
        let orders = orders(&store);
        for i in 0..5 {
            seed(&orders, &format!("o{i}"), "pending", "web");
        }

        let pattern = "orders:id:*:channel:*:status:pending";
        let mut seen = Vec::new();
        let mut cursor = 0;
        let mut pages = 0;
        loop {
            let page = store.scan(pattern, cursor, 2).unwrap();
            let is_last = page.is_last();
            let next_cursor = page.cursor;
            seen.extend(page.keys);
            pages += 1;
            if is_last {
                break;
            }
            cursor = next_cursor;
        }

        assert_eq!(seen.len(), 5);
        assert_eq!(pages, 3);
        // Insertion order, by score.
        assert!(seen[0].contains(":o0:"));
        assert!(seen[4].contains(":o4:"));
    }

    #[test]
    fn registry_lookup() {
        let registry = SchemaRegistry::new().register(orders_schema());
        assert_eq!(registry.len(), 1);
        assert!(registry.get("orders").is_some());
        assert!(registry.get("users").is_none());
    }
}
