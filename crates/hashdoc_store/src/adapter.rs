//! Store adapter trait definition.

use crate::error::StoreResult;
use std::collections::BTreeMap;

/// One page of a cursor-driven key scan.
///
/// A `cursor` of `0` signals that the scan is complete. Any other value
/// must be passed back to [`StoreAdapter::scan`] to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next scan step; `0` when the scan is exhausted.
    pub cursor: u64,
    /// Keys matched in this step. May be empty even mid-scan.
    pub keys: Vec<String>,
}

impl ScanPage {
    /// Returns true when this page terminates the scan.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.cursor == 0
    }
}

/// A single operation inside a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Write one or more hash fields under a key.
    SetFields {
        /// Target hash key.
        key: String,
        /// Field name to value.
        fields: BTreeMap<String, String>,
    },
    /// Remove hash fields from a key.
    DeleteFields {
        /// Target hash key.
        key: String,
        /// Fields to remove.
        fields: Vec<String>,
    },
    /// Remove an entire key.
    DeleteKey {
        /// Key to remove.
        key: String,
    },
    /// Set a key's time-to-live.
    SetExpiry {
        /// Target key.
        key: String,
        /// Time-to-live in seconds.
        seconds: u64,
    },
}

/// Uniform operations against a key-value hash store.
///
/// Adapters are **schemaless**: they move string fields in and out of
/// hashes and enumerate keys by glob pattern. All key grammar and query
/// semantics live above this trait.
///
/// # Invariants
///
/// - `scan` is a cursor protocol: the caller drives it until the returned
///   cursor is `0`. The store may return a key more than once across
///   cursor steps and may miss keys deleted mid-scan.
/// - `pipeline` executes its batch under the store's best atomicity
///   primitive. Batches are flat; a pipeline inside a pipeline cannot be
///   expressed and is not supported.
/// - Adapters must be `Send + Sync` for concurrent use.
///
/// # Implementors
///
/// - [`crate::InMemoryStore`] - for testing
/// - [`crate::RedisStore`] - single-node networked store
///   (feature `redis-backend`)
pub trait StoreAdapter: Send + Sync {
    /// Checks whether a key exists.
    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Fetches one page of keys matching a glob pattern.
    ///
    /// Pass `cursor = 0` to start a scan and the returned cursor to
    /// continue it. `count` is a batch-size hint.
    fn scan(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage>;

    /// Writes a single hash field.
    fn set_field(&self, key: &str, field: &str, value: &str) -> StoreResult<()>;

    /// Writes multiple hash fields in one call.
    fn set_fields(&self, key: &str, fields: &BTreeMap<String, String>) -> StoreResult<()>;

    /// Reads a single hash field. `None` when the key or field is absent.
    fn get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    /// Reads all fields of a hash. Empty when the key is absent.
    fn get_fields(&self, key: &str) -> StoreResult<BTreeMap<String, String>>;

    /// Removes hash fields from a key.
    fn delete_fields(&self, key: &str, fields: &[String]) -> StoreResult<()>;

    /// Removes an entire key.
    fn delete_key(&self, key: &str) -> StoreResult<()>;

    /// Sets a key's time-to-live in seconds. No-op for absent keys.
    fn set_expiry(&self, key: &str, seconds: u64) -> StoreResult<()>;

    /// Returns the remaining time-to-live in seconds.
    ///
    /// `None` when the key does not exist or carries no expiry.
    fn get_expiry(&self, key: &str) -> StoreResult<Option<u64>>;

    /// Executes a batch of operations as one pipelined unit.
    fn pipeline(&self, ops: &[StoreOp]) -> StoreResult<()>;
}

/// Sorted-set primitives used by the secondary-index layer.
///
/// Kept separate from [`StoreAdapter`] so the core adapter contract stays
/// hash-only; only stores that back an index layer need these.
pub trait SortedSetOps: Send + Sync {
    /// Adds a member with a score, overwriting the score if present.
    fn sorted_set_add(&self, set: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Removes a member. No-op when absent.
    fn sorted_set_remove(&self, set: &str, member: &str) -> StoreResult<()>;

    /// Returns all members in ascending score order.
    fn sorted_set_members(&self, set: &str) -> StoreResult<Vec<String>>;
}
