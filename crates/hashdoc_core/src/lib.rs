//! # HashDoc Core
//!
//! Record model, query engine, and secondary-index layer for HashDoc.
//!
//! HashDoc gives structured records document-like persistence on top of
//! a schemaless key-value hash store, emulating find-by-key,
//! find-by-predicate, and pagination without a query engine on the store
//! side. A record's identity and queryable attribute values are encoded
//! deterministically into its store key; predicate queries become glob
//! patterns over the keyspace, enumerated through the store's cursor
//! protocol, or served from sorted-set indexes when the store is wrapped
//! in an [`IndexedStore`].
//!
//! ## Usage
//!
//! ```
//! use hashdoc_core::{Collection, Schema};
//! use hashdoc_store::InMemoryStore;
//! use std::sync::Arc;
//!
//! let schema = Schema::builder("orders").queryable("status").build();
//! let orders = Collection::new(schema, Arc::new(InMemoryStore::new()));
//!
//! let mut order = orders.new_record();
//! order.set("id", "o1");
//! order.set("status", "pending");
//! orders.save(&mut order).unwrap();
//!
//! let pending = orders
//!     .query()
//!     .where_eq("status", "pending")
//!     .unwrap()
//!     .all()
//!     .unwrap();
//! assert_eq!(pending.len(), 1);
//! ```
//!
//! ## Consistency
//!
//! One blocking store round-trip at a time; no internal parallelism, no
//! retries, no engine-level timeouts. Concurrent scanners and writers
//! see each other per the store's own scan contract. The move a changed
//! queryable attribute triggers on save holds no lock - a concurrent
//! reader can observe neither or both keys.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod collection;
mod error;
mod hook;
mod index;
mod query;
mod record;
mod schema;
mod value;

pub use collection::Collection;
pub use error::{CoreError, CoreResult};
pub use hook::{Hooks, Lifecycle};
pub use index::{IndexedStore, SchemaRegistry};
pub use query::{Query, DEFAULT_CHUNK_SIZE};
pub use record::Record;
pub use schema::{KeyStrategy, Schema, SchemaBuilder};
pub use value::{index_value, CastKind, Scalar};
