//! In-memory store adapter for testing.

use crate::adapter::{ScanPage, SortedSetOps, StoreAdapter, StoreOp};
use crate::error::StoreResult;
use crate::glob::glob_match;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    fields: BTreeMap<String, String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now < deadline,
            None => true,
        }
    }
}

/// An in-memory hash store.
///
/// Stores all hashes and index sets in process memory. Suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral data that doesn't need persistence
///
/// Expired keys are treated as absent on access rather than reaped
/// eagerly. Scans walk the key space in sorted order, so a page of size
/// `count` holds up to `count` matching keys.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Entry>>,
    sets: RwLock<BTreeMap<String, BTreeMap<String, f64>>>,
    scan_calls: AtomicU64,
    hash_reads: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all live keys in sorted order.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Clears all hashes, index sets, and counters.
    pub fn clear(&self) {
        self.entries.write().clear();
        self.sets.write().clear();
        self.scan_calls.store(0, Ordering::Relaxed);
        self.hash_reads.store(0, Ordering::Relaxed);
    }

    /// Number of `scan` calls issued since construction or [`Self::clear`].
    #[must_use]
    pub fn scan_calls(&self) -> u64 {
        self.scan_calls.load(Ordering::Relaxed)
    }

    /// Number of full-hash reads issued since construction or [`Self::clear`].
    #[must_use]
    pub fn hash_reads(&self) -> u64 {
        self.hash_reads.load(Ordering::Relaxed)
    }

    fn apply(entries: &mut BTreeMap<String, Entry>, op: &StoreOp, now: Instant) {
        match op {
            StoreOp::SetFields { key, fields } => {
                if fields.is_empty() {
                    return;
                }
                let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
                if !entry.is_live(now) {
                    *entry = Entry::new();
                }
                for (field, value) in fields {
                    entry.fields.insert(field.clone(), value.clone());
                }
            }
            StoreOp::DeleteFields { key, fields } => {
                let mut emptied = false;
                if let Some(entry) = entries.get_mut(key) {
                    if entry.is_live(now) {
                        for field in fields {
                            entry.fields.remove(field);
                        }
                        emptied = entry.fields.is_empty();
                    }
                }
                // A hash with no fields left ceases to exist.
                if emptied {
                    entries.remove(key);
                }
            }
            StoreOp::DeleteKey { key } => {
                entries.remove(key);
            }
            StoreOp::SetExpiry { key, seconds } => {
                if let Some(entry) = entries.get_mut(key) {
                    if entry.is_live(now) {
                        entry.expires_at = Some(now + Duration::from_secs(*seconds));
                    }
                }
            }
        }
    }
}

impl StoreAdapter for InMemoryStore {
    fn exists(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .is_some_and(|e| e.is_live(now)))
    }

    fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        self.scan_calls.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let count = count.max(1);

        let entries = self.entries.read();
        let matched: Vec<&String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && glob_match(pattern, k))
            .map(|(k, _)| k)
            .collect();

        let start = cursor as usize;
        if start >= matched.len() {
            return Ok(ScanPage {
                cursor: 0,
                keys: Vec::new(),
            });
        }
        let end = (start + count).min(matched.len());
        let keys = matched[start..end].iter().map(|k| (*k).clone()).collect();
        let cursor = if end < matched.len() { end as u64 } else { 0 };
        Ok(ScanPage { cursor, keys })
    }

    fn set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let fields = BTreeMap::from([(field.to_string(), value.to_string())]);
        self.set_fields(key, &fields)
    }

    fn set_fields(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()> {
        let mut entries = self.entries.write();
        Self::apply(
            &mut entries,
            &StoreOp::SetFields {
                key: key.to_string(),
                fields: fields.clone(),
            },
            Instant::now(),
        );
        Ok(())
    }

    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.fields.get(field).cloned()))
    }

    fn get_fields(&self, key: &str) -> StoreResult<BTreeMap<String, String>> {
        self.hash_reads.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.fields.clone())
            .unwrap_or_default())
    }

    fn delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<()> {
        let mut entries = self.entries.write();
        Self::apply(
            &mut entries,
            &StoreOp::DeleteFields {
                key: key.to_string(),
                fields: fields.to_vec(),
            },
            Instant::now(),
        );
        Ok(())
    }

    fn delete_key(&self, key: &str) -> StoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn set_expiry(&self, key: &str, seconds: u64) -> StoreResult<()> {
        let mut entries = self.entries.write();
        Self::apply(
            &mut entries,
            &StoreOp::SetExpiry {
                key: key.to_string(),
                seconds,
            },
            Instant::now(),
        );
        Ok(())
    }

    fn get_expiry(&self, key: &str) -> StoreResult<Option<u64>> {
        let now = Instant::now();
        let entries = self.entries.read();
        let Some(entry) = entries.get(key).filter(|e| e.is_live(now)) else {
            return Ok(None);
        };
        Ok(entry.expires_at.map(|deadline| {
            let remaining = deadline.saturating_duration_since(now);
            // Round up so a freshly-set TTL reads back whole.
            remaining.as_millis().div_ceil(1000) as u64
        }))
    }

    fn pipeline(&self, ops: &[StoreOp]) -> StoreResult<()> {
        // One write lock for the whole batch keeps it atomic.
        let mut entries = self.entries.write();
        let now = Instant::now();
        for op in ops {
            Self::apply(&mut entries, op, now);
        }
        Ok(())
    }
}

impl SortedSetOps for InMemoryStore {
    fn sorted_set_add(&self, set: &str, member: &str, score: f64) -> StoreResult<()> {
        self.sets
            .write()
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    fn sorted_set_remove(&self, set: &str, member: &str) -> StoreResult<()> {
        let mut sets = self.sets.write();
        let mut emptied = false;
        if let Some(members) = sets.get_mut(set) {
            members.remove(member);
            emptied = members.is_empty();
        }
        if emptied {
            sets.remove(set);
        }
        Ok(())
    }

    fn sorted_set_members(&self, set: &str) -> StoreResult<Vec<String>> {
        let sets = self.sets.read();
        let Some(members) = sets.get(set) else {
            return Ok(Vec::new());
        };
        let mut pairs: Vec<(&String, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
        pairs.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        Ok(pairs.into_iter().map(|(m, _)| m.clone()).collect())
    }
}
