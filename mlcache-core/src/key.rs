//! Cache keys and the buffer pool that recycles them.
//!
//! A `CacheKey` is an immutable string identifier. Under high call rates the
//! allocation for the identifier dominates, so keys draw their buffer from a
//! bounded free-list and give it back on [`CacheKey::release`]. Pooling is an
//! allocation optimization only; a key that is never released is simply
//! dropped.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// Number of idle buffers the global pool retains.
const DEFAULT_POOL_CAPACITY: usize = 1024;

static GLOBAL_POOL: Lazy<KeyPool> = Lazy::new(|| KeyPool::with_capacity(DEFAULT_POOL_CAPACITY));

/// Immutable identifier for a cached item.
///
/// An empty identifier is treated as an absent key: every orchestrator
/// operation rejects it before touching a level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    inner: String,
}

impl CacheKey {
    /// Build a key, reusing a pooled buffer when one is idle.
    pub fn new(key: impl AsRef<str>) -> Self {
        GLOBAL_POOL.acquire(key.as_ref())
    }

    /// Return the key's buffer to the global pool.
    pub fn release(self) {
        GLOBAL_POOL.release(self);
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether this key carries no identifier.
    pub fn is_absent(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(inner: String) -> Self {
        Self { inner }
    }
}

/// Bounded free-list of key buffers.
#[derive(Debug)]
pub struct KeyPool {
    free: Mutex<Vec<String>>,
    capacity: usize,
}

impl KeyPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Build a key from a recycled buffer, or a fresh one if none is idle.
    pub fn acquire(&self, key: &str) -> CacheKey {
        let recycled = match self.free.lock() {
            Ok(mut free) => free.pop(),
            Err(_) => None,
        };
        let mut inner = recycled.unwrap_or_default();
        inner.clear();
        inner.push_str(key);
        CacheKey { inner }
    }

    /// Keep the key's buffer for reuse unless the pool is full.
    pub fn release(&self, key: CacheKey) {
        if let Ok(mut free) = self.free.lock() {
            if free.len() < self.capacity {
                free.push(key.inner);
            }
        }
    }

    /// Number of buffers waiting to be reused.
    pub fn idle(&self) -> usize {
        self.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }
}

// =============================================================================
// TESTS
// =============================================================================
