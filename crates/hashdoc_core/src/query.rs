//! Predicate queries over a collection.

use crate::collection::Collection;
use crate::error::{CoreError, CoreResult};
use crate::hook::Lifecycle;
use crate::record::Record;
use hashdoc_codec::decode_primary_key;
use std::collections::BTreeMap;
use tracing::trace;

/// Default batch size for [`Query::all`] and [`Query::each`].
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// An accumulated predicate set against one collection.
///
/// Predicates constrain the key field or declared queryable attributes to
/// a literal value or a glob fragment (`*`/`?` wildcards). Matching runs
/// as a cursor-driven pattern scan on the store; result order is whatever
/// the scan returns (insertion-order-ish on a single node, unordered
/// across reshards), and the scan contract admits duplicate keys across
/// cursor steps and misses of concurrently-deleted keys. The engine
/// performs no deduplication or retry on top of it.
#[derive(Debug)]
pub struct Query<'a> {
    collection: &'a Collection,
    predicates: BTreeMap<String, String>,
}

impl<'a> Query<'a> {
    pub(crate) fn new(collection: &'a Collection) -> Self {
        Self {
            collection,
            predicates: BTreeMap::new(),
        }
    }

    /// Adds or overwrites a predicate.
    ///
    /// # Errors
    ///
    /// [`CoreError::AttributeNotSearchable`] when `name` is neither the
    /// key field nor a declared queryable attribute.
    pub fn where_eq(mut self, name: &str, value: impl Into<String>) -> CoreResult<Self> {
        let schema = self.collection.schema();
        if !schema.is_searchable(name) {
            return Err(CoreError::attribute_not_searchable(name, schema.prefix()));
        }
        self.predicates.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Finds a record by primary key.
    pub fn find(self, id: &str) -> CoreResult<Option<Record>> {
        let key_field = self.collection.schema().key_field().to_string();
        self.where_eq(&key_field, id)?.first()
    }

    /// Finds a record by primary key, failing when absent.
    pub fn find_or_fail(self, id: &str) -> CoreResult<Record> {
        let prefix = self.collection.schema().prefix().to_string();
        self.find(id)?.ok_or_else(|| CoreError::not_found(prefix))
    }

    /// Returns the first matching record, if any.
    ///
    /// Runs as a chunk of size 1, so at most one scan batch and one hash
    /// fetch happen beyond the first matching key.
    pub fn first(self) -> CoreResult<Option<Record>> {
        let mut found = None;
        self.chunk(1, |record| {
            found = Some(record);
            false
        })?;
        Ok(found)
    }

    /// Collects every matching record, in store-scan order.
    pub fn all(self) -> CoreResult<Vec<Record>> {
        let mut records = Vec::new();
        self.each(|record| {
            records.push(record);
            true
        })?;
        Ok(records)
    }

    /// Invokes the callback for every match in chunks of
    /// [`DEFAULT_CHUNK_SIZE`]. A `false` return stops the iteration
    /// before the next cursor step.
    pub fn each<F>(self, callback: F) -> CoreResult<()>
    where
        F: FnMut(Record) -> bool,
    {
        self.chunk(DEFAULT_CHUNK_SIZE, callback)
    }

    /// Drives a cursor scan in batches of `size`, hydrating and yielding
    /// each matched record.
    ///
    /// For every key in every batch the primary key is decoded, the full
    /// hash is fetched, and the record is hydrated Persisted with its
    /// snapshot set to the fetched attributes; the `Retrieved` hook fires
    /// before the callback. A `false` return from the callback is the
    /// sole early-stop signal. Any store failure mid-iteration aborts the
    /// whole run - partial results are not suppressed, they are simply
    /// whatever the callback already saw.
    pub fn chunk<F>(self, size: usize, mut callback: F) -> CoreResult<()>
    where
        F: FnMut(Record) -> bool,
    {
        let collection = self.collection;
        let schema = collection.schema();
        let pattern = schema.scan_pattern(&self.predicates);
        trace!(pattern = %pattern, size, "starting chunked scan");

        let mut cursor = 0;
        loop {
            let page = collection.store().scan(&pattern, cursor, size)?;
            for key in &page.keys {
                let primary_key = decode_primary_key(key, schema.prefix(), schema.key_field())?;
                let mut fields = collection.store().get_fields(key)?;
                if fields.is_empty() {
                    // Deleted between the scan step and the fetch.
                    trace!(key = %key, "skipping vanished key");
                    continue;
                }
                fields.insert(schema.key_field().to_string(), primary_key);

                let record = Record::hydrated(collection.schema_arc(), fields);
                collection.hooks().fire(Lifecycle::Retrieved, &record);
                if !callback(record) {
                    return Ok(());
                }
            }
            if page.is_last() {
                return Ok(());
            }
            cursor = page.cursor;
        }
    }

    /// Returns the first match, or creates and saves a record built from
    /// the predicates plus `extra`.
    ///
    /// Predicate values are taken verbatim as attribute values on the
    /// created record. Not atomic: two concurrent callers can both miss
    /// and both create.
    pub fn first_or_create(self, extra: &BTreeMap<String, String>) -> CoreResult<Record> {
        let collection = self.collection;
        let predicates = self.predicates.clone();

        if let Some(found) = self.first()? {
            return Ok(found);
        }

        let mut record = collection.new_record();
        for (name, value) in predicates {
            record.set(name, value);
        }
        for (name, value) in extra {
            record.set(name.clone(), value.clone());
        }
        collection.save(&mut record)?;
        Ok(record)
    }
}
