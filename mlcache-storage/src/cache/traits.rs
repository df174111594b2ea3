//! Level capability trait.
//!
//! Every backend plugged into a chain (in-memory map, disk, remote store)
//! implements [`CacheLevel`]. The orchestrator consumes levels only through
//! this trait and never owns their storage.

use std::sync::Arc;

use async_trait::async_trait;
use mlcache_core::{CacheKey, CacheStatus, CachedValue, LevelResult, Timestamp};

/// Cache level trait for pluggable backends.
///
/// Implementations must be thread-safe: the orchestrator may call a level
/// from the caller's task and from detached background tasks at the same
/// time, and imposes no locking of its own.
///
/// # Contract
///
/// | Method | Miss / absent key |
/// |---|---|
/// | `get` | `Ok(None)`, never an error |
/// | `put` | idempotent overwrite |
/// | `delete` | deleting an absent key succeeds |
/// | `exists` | `Ok(CacheStatus::Failure)` |
/// | `flush` | clears this level only |
#[async_trait]
pub trait CacheLevel: Send + Sync {
    /// Fetch a value and its expiry instant.
    async fn get(&self, key: &CacheKey) -> LevelResult<Option<CachedValue>>;

    /// Store a value with an absolute expiry instant.
    async fn put(
        &self,
        key: &CacheKey,
        value: &[u8],
        expires_at: Timestamp,
    ) -> LevelResult<CacheStatus>;

    /// Delete a key from this level.
    async fn delete(&self, key: &CacheKey) -> LevelResult<CacheStatus>;

    /// Report `Success` if the key is present in this level.
    async fn exists(&self, key: &CacheKey) -> LevelResult<CacheStatus>;

    /// Remove every key from this level.
    async fn flush(&self) -> LevelResult<()>;

    /// Short label used in logs.
    fn name(&self) -> &str {
        "level"
    }
}

/// Shared handle to a caller-owned level.
pub type LevelHandle = Arc<dyn CacheLevel>;
