//! rangeplane-lock — advisory, TTL-bounded locks keyed by entity.
//!
//! Lifecycle operations take a lock on `experiment|<name>` (or
//! `vm|<experiment>/<vm>`) recording what they are doing. A second caller
//! sees the holder's status and backs off instead of queueing.
//!
//! Entries expire after an operation-specific TTL so a wedged operation
//! cannot hold an entity forever. Expiry does not interrupt the holder: a
//! slow operation can outlive its lock. Scoped [`LockGuard`]s detect this on
//! release and log it, and never remove an entry acquired by someone else.
//!
//! The cache is process-local. It is not a distributed lock.

pub mod cache;
pub mod error;
pub mod key;

pub use cache::{LockCache, LockGuard};
pub use error::{LockError, LockResult};
pub use key::{LockStatus, LockTtls, experiment_key, vm_key};
