//! # HashDoc Store
//!
//! Hash-store adapter trait and implementations for HashDoc.
//!
//! This crate provides the lowest-level store abstraction for HashDoc.
//! Adapters are **schemaless hash stores** - they read and write string
//! fields under opaque keys and enumerate keys by glob pattern. HashDoc
//! owns all key grammar and query interpretation.
//!
//! ## Design Principles
//!
//! - Adapters expose plain hash operations (fields, expiry, cursor scan,
//!   pipelined batches)
//! - No knowledge of HashDoc key layouts or predicates
//! - Must be `Send + Sync` for concurrent access
//! - One blocking round-trip at a time; no adapter-level retry
//!
//! ## Available Adapters
//!
//! - [`InMemoryStore`] - for testing and ephemeral data
//! - [`RedisStore`] - single-node networked store (feature `redis-backend`)
//!
//! ## Example
//!
//! ```rust
//! use hashdoc_store::{InMemoryStore, StoreAdapter};
//! use std::collections::BTreeMap;
//!
//! let store = InMemoryStore::new();
//! let fields = BTreeMap::from([("status".to_string(), "pending".to_string())]);
//! store.set_fields("orders:id:o1:status:pending", &fields).unwrap();
//! assert!(store.exists("orders:id:o1:status:pending").unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod error;
mod glob;
mod memory;
#[cfg(feature = "redis-backend")]
mod redis;

pub use adapter::{ScanPage, SortedSetOps, StoreAdapter, StoreOp};
pub use error::{StoreError, StoreResult};
pub use glob::glob_match;
pub use memory::InMemoryStore;
#[cfg(feature = "redis-backend")]
pub use crate::redis::RedisStore;
