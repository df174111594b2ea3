//! In-memory level backed by a `HashMap`.
//!
//! No eviction and no capacity management: entries live until they are
//! deleted, flushed, or read after their expiry instant.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use mlcache_core::{CacheKey, CacheStatus, CachedValue, LevelError, LevelResult, Timestamp};

use super::traits::CacheLevel;

/// Thread-safe in-memory level.
///
/// # Example
///
/// ```ignore
/// let l1 = Arc::new(InMemoryLevel::named("l1"));
/// let cache = MultiLevelCache::new(
///     ReadPolicy::ReadThrough,
///     WritePolicy::WriteThrough,
///     1024,
///     vec![l1.clone() as LevelHandle],
/// )?;
/// ```
#[derive(Debug)]
pub struct InMemoryLevel {
    name: String,
    entries: RwLock<HashMap<String, CachedValue>>,
}

impl InMemoryLevel {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Read an entry directly, bypassing expiry. Intended for assertions.
    pub fn peek(&self, key: &str) -> Option<CachedValue> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    /// Whether the key is stored and unexpired.
    pub fn contains(&self, key: &str) -> bool {
        self.peek(key)
            .is_some_and(|entry| !entry.is_expired_at(Utc::now()))
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryLevel {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> LevelError {
    LevelError::backend("in-memory level lock poisoned")
}

#[async_trait]
impl CacheLevel for InMemoryLevel {
    async fn get(&self, key: &CacheKey) -> LevelResult<Option<CachedValue>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .get(key.as_str())
            .filter(|entry| !entry.is_expired_at(Utc::now()))
            .cloned())
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: &[u8],
        expires_at: Timestamp,
    ) -> LevelResult<CacheStatus> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.insert(
            key.as_str().to_string(),
            CachedValue::new(value, expires_at),
        );
        Ok(CacheStatus::Success)
    }

    async fn delete(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.remove(key.as_str());
        Ok(CacheStatus::Success)
    }

    async fn exists(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let live = entries
            .get(key.as_str())
            .is_some_and(|entry| !entry.is_expired_at(Utc::now()));
        Ok(CacheStatus::from(live))
    }

    async fn flush(&self) -> LevelResult<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        entries.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
