//! rangeplane-store — persistence for configuration documents.
//!
//! The control plane treats the store as its sole source of truth: one
//! document per `(kind, name)`, timestamps stamped by the store on write.
//!
//! # Architecture
//!
//! [`DocumentStore`] is the narrow interface the rest of the workspace codes
//! against. [`RedbStore`] implements it over a single redb table keyed by
//! `kind/name`, with whole documents JSON-serialized into `&[u8]` values.
//! It supports both on-disk and in-memory backends (the latter for tests).
//!
//! `RedbStore` is `Clone + Send + Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StoreError, StoreResult};
pub use store::{DocumentStore, RedbStore};
