//! The lock/status cache and its scoped guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{LockError, LockResult};
use crate::key::LockStatus;

struct Entry {
    status: LockStatus,
    acquired_at: Instant,
    ttl: Duration,
    token: u64,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() > self.ttl
    }
}

/// Thread-safe map of entity key to lock entry.
#[derive(Default)]
pub struct LockCache {
    entries: Mutex<HashMap<String, Entry>>,
    next_token: AtomicU64,
}

impl LockCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_insert(&self, key: &str, status: LockStatus, ttl: Duration) -> Result<u64, LockStatus> {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired() {
                return Err(existing.status);
            }
            debug!(%key, status = %existing.status, "replacing expired lock");
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            key.to_string(),
            Entry {
                status,
                acquired_at: Instant::now(),
                ttl,
                token,
            },
        );
        Ok(token)
    }

    /// Create an entry for `key` if none is live. Returns `None` on success,
    /// or the current holder's status when the lock is taken.
    pub fn lock(&self, key: &str, status: LockStatus, ttl: Duration) -> Option<LockStatus> {
        self.try_insert(key, status, ttl).err()
    }

    /// Status of the live entry for `key`, if any.
    pub fn locked(&self, key: &str) -> Option<LockStatus> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.status),
            None => None,
        }
    }

    /// Remove the entry for `key` unconditionally.
    pub fn unlock(&self, key: &str) {
        self.entries().remove(key);
    }

    /// Take the lock for the life of the returned guard.
    pub fn acquire(&self, key: &str, status: LockStatus, ttl: Duration) -> LockResult<LockGuard<'_>> {
        match self.try_insert(key, status, ttl) {
            Ok(token) => {
                debug!(%key, %status, ttl_secs = ttl.as_secs(), "lock acquired");
                Ok(LockGuard {
                    cache: self,
                    key: key.to_string(),
                    status,
                    token,
                })
            }
            Err(held) => Err(LockError::Conflict {
                key: key.to_string(),
                status: held,
            }),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut entries = self.entries();
        entries.retain(|_, e| !e.is_expired());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str, token: u64) -> bool {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.token == token => {
                let expired = entry.is_expired();
                entries.remove(key);
                !expired
            }
            _ => false,
        }
    }
}

/// Releases its lock on drop, unless the entry has since expired and been
/// taken by another caller.
#[must_use = "the lock is released when the guard is dropped"]
pub struct LockGuard<'a> {
    cache: &'a LockCache,
    key: String,
    status: LockStatus,
    token: u64,
}

impl LockGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> LockStatus {
        self.status
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.cache.release(&self.key, self.token) {
            debug!(key = %self.key, status = %self.status, "lock released");
        } else {
            warn!(key = %self.key, status = %self.status, "lock expired before the operation finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn lock_is_exclusive_until_unlocked() {
        let cache = LockCache::new();
        assert_eq!(cache.lock("experiment|a", LockStatus::Creating, MINUTE), None);
        assert_eq!(
            cache.lock("experiment|a", LockStatus::Deleting, MINUTE),
            Some(LockStatus::Creating)
        );
        assert_eq!(cache.locked("experiment|a"), Some(LockStatus::Creating));

        cache.unlock("experiment|a");
        assert_eq!(cache.locked("experiment|a"), None);
        assert_eq!(cache.lock("experiment|a", LockStatus::Deleting, MINUTE), None);
    }

    #[test]
    fn expired_entries_are_free() {
        let cache = LockCache::new();
        assert_eq!(cache.lock("k", LockStatus::Starting, Duration::ZERO), None);
        thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.locked("k"), None);
        assert_eq!(cache.lock("k", LockStatus::Stopping, MINUTE), None);
        assert_eq!(cache.locked("k"), Some(LockStatus::Stopping));
    }

    #[test]
    fn guard_releases_on_drop() {
        let cache = LockCache::new();
        {
            let guard = cache.acquire("k", LockStatus::Starting, MINUTE).unwrap();
            assert_eq!(guard.key(), "k");
            let err = cache.acquire("k", LockStatus::Stopping, MINUTE).err().unwrap();
            assert!(matches!(err, LockError::Conflict { status: LockStatus::Starting, .. }));
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn expired_guard_does_not_release_new_holder() {
        let cache = LockCache::new();
        let guard = cache.acquire("k", LockStatus::Starting, Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.lock("k", LockStatus::Deleting, MINUTE), None);
        drop(guard);
        assert_eq!(cache.locked("k"), Some(LockStatus::Deleting));
    }

    #[test]
    fn concurrent_acquire_has_one_winner() {
        let cache = LockCache::new();
        let barrier = Barrier::new(8);

        let winners: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.lock("experiment|race", LockStatus::Creating, MINUTE).is_none()
                    })
                })
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });

        assert_eq!(winners, 1);
    }
}
