//! Multi-level cache orchestrator.
//!
//! Presents an ordered chain of levels as a single cache. Reads scan from
//! level 1 toward level N and refill nearer levels after a farther hit;
//! writes reach the levels chosen by the write policy. Synchronous traversals
//! stop at the first failing level and never roll back earlier steps.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mlcache_core::{
    ensure_success, CacheKey, CacheStatus, CachedValue, ConfigError, InputError, LevelResult,
    Operation, ReadPolicy, TierConfig, TierError, TierResult, Timestamp, WritePolicy,
};

use super::background::BackgroundSpawner;
use super::chain::LevelChain;
use super::stats::{TierCounters, TierStats};
use super::traits::{CacheLevel, LevelHandle};
use super::validator::validate;

/// Multi-level cache with a fixed read policy and write policy.
///
/// All state is fixed at construction; operations take `&self` and need no
/// locking. Thread-safety of each level is that level's own concern.
///
/// # Example
///
/// ```ignore
/// let cache = MultiLevelCache::new(
///     ReadPolicy::ReadThrough,
///     WritePolicy::WriteThrough,
///     4096,
///     vec![l1 as LevelHandle, l2, l3],
/// )?;
///
/// let key = CacheKey::new("metamorphosis");
/// cache.store(&key, b"franzkafka", expires_at).await?;
/// let hit = cache.fetch(&key).await?;
/// key.release();
/// ```
pub struct MultiLevelCache {
    chain: LevelChain,
    read_policy: ReadPolicy,
    write_policy: WritePolicy,
    max_value_size: usize,
    write_back_delay: Duration,
    spawner: BackgroundSpawner,
    counters: Arc<TierCounters>,
}

impl MultiLevelCache {
    /// Build an orchestrator over 1 to 5 caller-owned levels.
    ///
    /// Besides the chain and policy checks, a `max_value_size` above
    /// [`MAX_CACHE_VALUE_SIZE`](mlcache_core::MAX_CACHE_VALUE_SIZE) is
    /// rejected with `ConfigError::InvalidValue`.
    pub fn new(
        read_policy: ReadPolicy,
        write_policy: WritePolicy,
        max_value_size: usize,
        levels: Vec<LevelHandle>,
    ) -> TierResult<Self> {
        let config = TierConfig::new(read_policy, write_policy).with_max_value_size(max_value_size);
        Self::with_config(config, levels)
    }

    /// Build an orchestrator from raw numeric policy selectors.
    ///
    /// Read: `0` read-through, `1` cache-aside.
    /// Write: `0` write-through, `1` write-around, `2` write-back.
    pub fn from_selectors(
        read_selector: u8,
        write_selector: u8,
        max_value_size: usize,
        levels: Vec<LevelHandle>,
    ) -> TierResult<Self> {
        let (read_policy, write_policy) = validate(levels.len(), read_selector, write_selector)?;
        let config = TierConfig::new(read_policy, write_policy).with_max_value_size(max_value_size);
        Self::with_config(config, levels)
    }

    /// Build an orchestrator from a full configuration.
    pub fn with_config(config: TierConfig, levels: Vec<LevelHandle>) -> TierResult<Self> {
        validate(
            levels.len(),
            config.read_policy.selector(),
            config.write_policy.selector(),
        )?;
        config.validate()?;

        let level_count = levels.len();
        // validate() has already rejected an empty list
        let chain = LevelChain::new(levels).ok_or(ConfigError::NoWorkableCache)?;
        let counters = Arc::new(TierCounters::default());
        let spawner = BackgroundSpawner::new(
            config.max_background_tasks,
            config.report_background_failures,
            Arc::clone(&counters),
        );

        tracing::debug!(
            levels = level_count,
            read_policy = %config.read_policy,
            write_policy = %config.write_policy,
            max_value_size = config.max_value_size,
            "Multi-level cache built"
        );

        Ok(Self {
            chain,
            read_policy: config.read_policy,
            write_policy: config.write_policy,
            max_value_size: config.max_value_size,
            write_back_delay: config.write_back_delay(),
            spawner,
            counters,
        })
    }

    pub fn read_policy(&self) -> ReadPolicy {
        self.read_policy
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    pub fn max_value_size(&self) -> usize {
        self.max_value_size
    }

    pub fn level_count(&self) -> usize {
        self.chain.len()
    }

    pub fn chain(&self) -> &LevelChain {
        &self.chain
    }

    pub fn stats(&self) -> TierStats {
        self.counters.snapshot(self.chain.len())
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Fetch a value, scanning from level 1 toward level N.
    ///
    /// A level whose fetch fails is skipped as a miss. On a hit at level k
    /// the value is written back into levels k-1 down to 1:
    ///
    /// - `ReadThrough`: synchronously, nearest-to-hit first. A failing
    ///   backfill aborts the fetch and the retrieved value is NOT returned.
    ///   This turns a successful lookup into a caller-visible error because
    ///   of an unrelated nearer level; it is kept for compatibility but is
    ///   suspect and may change.
    /// - `CacheAside`: in a detached task; the value is returned at once.
    ///
    /// A miss at every level is `Ok(None)`.
    pub async fn fetch(&self, key: &CacheKey) -> TierResult<Option<CachedValue>> {
        ensure_key(key, Operation::Get)?;

        let mut cursor = self.chain.cursor();
        loop {
            let position = cursor.position();
            match cursor.level().get(key).await {
                Ok(Some(found)) => {
                    tracing::trace!(level = position, key = %key, "Cache hit");
                    self.counters.record_hit(position);
                    return self.backfill(key, position, found).await.map(Some);
                }
                Ok(None) => {
                    tracing::trace!(level = position, key = %key, "Cache miss");
                }
                Err(e) => {
                    tracing::debug!(
                        level = position,
                        key = %key,
                        error = %e,
                        "Level fetch failed, treating as miss"
                    );
                }
            }
            if !cursor.advance() {
                break;
            }
        }

        self.counters.record_miss();
        Ok(None)
    }

    async fn backfill(
        &self,
        key: &CacheKey,
        hit: usize,
        found: CachedValue,
    ) -> TierResult<CachedValue> {
        if hit == 1 {
            return Ok(found);
        }

        if self.read_policy.awaits_backfill() {
            for (position, level) in self.chain.nearer_than(hit) {
                let outcome = level.put(key, &found.value, found.expires_at).await;
                ensure_success(position, Operation::Get, outcome)?;
                self.counters.record_backfill();
            }
            return Ok(found);
        }

        let chain = self.chain.clone();
        let counters = Arc::clone(&self.counters);
        let key = key.clone();
        let value = found.clone();

        self.spawner.spawn("cache-aside backfill", async move {
            // Every nearer level is attempted; the first error is kept.
            let mut first_error = None;
            for (position, level) in chain.nearer_than(hit) {
                let outcome = level.put(&key, &value.value, value.expires_at).await;
                match ensure_success(position, Operation::Put, outcome) {
                    Ok(()) => counters.record_backfill(),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            first_error.map_or(Ok(()), Err)
        });

        Ok(found)
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Store a value according to the write policy.
    ///
    /// The key and the size bound are checked before any level is touched.
    ///
    /// - `WriteThrough`: levels 1..N in order; the first failure aborts and
    ///   earlier levels keep the value.
    /// - `WriteAround`: level N only.
    /// - `WriteBack`: level 1 now; after the write-back delay a detached task
    ///   copies the value to levels 2..N, stopping at the first failure.
    pub async fn store(
        &self,
        key: &CacheKey,
        value: &[u8],
        expires_at: Timestamp,
    ) -> TierResult<()> {
        ensure_key(key, Operation::Put)?;

        if value.len() > self.max_value_size {
            return Err(InputError::ValueTooLarge {
                len: value.len(),
                max: self.max_value_size,
            }
            .into());
        }

        match self.write_policy {
            WritePolicy::WriteThrough => {
                for (position, level) in self.chain.forward() {
                    let outcome = level.put(key, value, expires_at).await;
                    ensure_success(position, Operation::Put, outcome)?;
                }
                Ok(())
            }
            WritePolicy::WriteAround => {
                let position = self.chain.len();
                let outcome = self.chain.tail().put(key, value, expires_at).await;
                ensure_success(position, Operation::Put, outcome)
            }
            WritePolicy::WriteBack => {
                let outcome = self.chain.head().put(key, value, expires_at).await;
                ensure_success(1, Operation::Put, outcome)?;

                if self.chain.len() > 1 {
                    self.schedule_write_back(key, value, expires_at);
                }
                Ok(())
            }
        }
    }

    fn schedule_write_back(&self, key: &CacheKey, value: &[u8], expires_at: Timestamp) {
        let chain = self.chain.clone();
        let delay = self.write_back_delay;
        let key = key.clone();
        let value = value.to_vec();

        self.spawner.spawn_after("write-back propagation", delay, async move {
            for (position, level) in chain.farther_than(1) {
                let outcome = level.put(&key, &value, expires_at).await;
                ensure_success(position, Operation::Put, outcome)?;
            }
            Ok(())
        });
    }

    // ========================================================================
    // DELETE / PRESENCE / FLUSH
    // ========================================================================

    /// Delete a key from level N down to level 1.
    ///
    /// The first failure aborts; levels already visited stay deleted.
    pub async fn remove(&self, key: &CacheKey) -> TierResult<()> {
        ensure_key(key, Operation::Del)?;

        for (position, level) in self.chain.backward() {
            let outcome = level.delete(key).await;
            ensure_success(position, Operation::Del, outcome)?;
        }
        Ok(())
    }

    /// Check presence in level 1 only.
    ///
    /// Assumes every level agrees with level 1. Divergence between levels
    /// is not detected here; callers repair it through fetch and store.
    pub async fn is_present(&self, key: &CacheKey) -> TierResult<bool> {
        ensure_key(key, Operation::IsPresent)?;

        match self.chain.head().exists(key).await {
            Ok(status) => Ok(status.is_success()),
            Err(source) => Err(TierError::level(1, Operation::IsPresent, source)),
        }
    }

    /// Clear every level, each in its own detached task.
    ///
    /// Returns immediately; completion and failures are never reported.
    pub fn flush_all(&self) {
        for (position, level) in self.chain.forward() {
            let level = Arc::clone(level);
            self.spawner.spawn("flush", async move {
                level
                    .flush()
                    .await
                    .map_err(|source| TierError::level(position, Operation::Flush, source))
            });
        }
    }
}

fn ensure_key(key: &CacheKey, operation: Operation) -> TierResult<()> {
    if key.is_absent() {
        return Err(InputError::MissingKey { operation }.into());
    }
    Ok(())
}

impl fmt::Debug for MultiLevelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiLevelCache")
            .field("chain", &self.chain)
            .field("read_policy", &self.read_policy)
            .field("write_policy", &self.write_policy)
            .field("max_value_size", &self.max_value_size)
            .field("write_back_delay", &self.write_back_delay)
            .field("max_background_tasks", &self.spawner.max_tasks())
            .finish()
    }
}

/// An orchestrator can itself be plugged into another chain as one level.
#[async_trait]
impl CacheLevel for MultiLevelCache {
    async fn get(&self, key: &CacheKey) -> LevelResult<Option<CachedValue>> {
        Ok(self.fetch(key).await?)
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: &[u8],
        expires_at: Timestamp,
    ) -> LevelResult<CacheStatus> {
        self.store(key, value, expires_at).await?;
        Ok(CacheStatus::Success)
    }

    async fn delete(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        self.remove(key).await?;
        Ok(CacheStatus::Success)
    }

    async fn exists(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        Ok(CacheStatus::from(self.is_present(key).await?))
    }

    async fn flush(&self) -> LevelResult<()> {
        self.flush_all();
        Ok(())
    }

    fn name(&self) -> &str {
        "multi-level"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory_backend::InMemoryLevel;
    use chrono::Utc;
    use mlcache_core::{LevelError, MAX_CACHE_VALUE_SIZE};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Level that can be told to fail or reject writes and deletes.
    #[derive(Default)]
    struct FaultyLevel {
        inner: InMemoryLevel,
        fail_put: AtomicBool,
        reject_put: AtomicBool,
        fail_get: AtomicBool,
        fail_delete: AtomicBool,
        puts: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl FaultyLevel {
        fn holds(&self, key: &str) -> bool {
            self.inner.contains(key)
        }
    }

    #[async_trait]
    impl CacheLevel for FaultyLevel {
        async fn get(&self, key: &CacheKey) -> LevelResult<Option<CachedValue>> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(LevelError::backend("get refused"));
            }
            self.inner.get(key).await
        }

        async fn put(
            &self,
            key: &CacheKey,
            value: &[u8],
            expires_at: Timestamp,
        ) -> LevelResult<CacheStatus> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            if self.fail_put.load(Ordering::SeqCst) {
                return Err(LevelError::backend("put refused"));
            }
            if self.reject_put.load(Ordering::SeqCst) {
                return Ok(CacheStatus::Failure);
            }
            self.inner.put(key, value, expires_at).await
        }

        async fn delete(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(LevelError::backend("delete refused"));
            }
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
            self.inner.exists(key).await
        }

        async fn flush(&self) -> LevelResult<()> {
            self.inner.flush().await
        }
    }

    fn levels(n: usize) -> (Vec<Arc<FaultyLevel>>, Vec<LevelHandle>) {
        let concrete: Vec<Arc<FaultyLevel>> =
            (0..n).map(|_| Arc::new(FaultyLevel::default())).collect();
        let handles = concrete
            .iter()
            .map(|l| Arc::clone(l) as LevelHandle)
            .collect();
        (concrete, handles)
    }

    fn expiry() -> Timestamp {
        Utc::now() + chrono::Duration::minutes(10)
    }

    fn build(
        read: ReadPolicy,
        write: WritePolicy,
        n: usize,
    ) -> (MultiLevelCache, Vec<Arc<FaultyLevel>>) {
        let (concrete, handles) = levels(n);
        let config = TierConfig::new(read, write)
            .with_max_value_size(64)
            .with_write_back_delay(Duration::from_millis(20));
        let cache = MultiLevelCache::with_config(config, handles).expect("valid config");
        (cache, concrete)
    }

    // === construction ===

    #[test]
    fn test_new_rejects_empty_chain() {
        let result = MultiLevelCache::new(
            ReadPolicy::ReadThrough,
            WritePolicy::WriteThrough,
            10,
            Vec::new(),
        );
        assert_eq!(
            result.err(),
            Some(TierError::Config(ConfigError::NoWorkableCache))
        );
    }

    #[test]
    fn test_new_rejects_six_levels() {
        let (_, handles) = levels(6);
        let result =
            MultiLevelCache::new(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 10, handles);
        assert!(matches!(
            result,
            Err(TierError::Config(ConfigError::MaxLevelExceeded { levels: 6, max: 5 }))
        ));
    }

    #[test]
    fn test_from_selectors_rejects_bad_policies() {
        let (_, handles) = levels(2);
        assert!(matches!(
            MultiLevelCache::from_selectors(2, 0, 10, handles),
            Err(TierError::Config(ConfigError::InvalidReadPolicy { .. }))
        ));

        let (_, handles) = levels(2);
        assert!(matches!(
            MultiLevelCache::from_selectors(0, 3, 10, handles),
            Err(TierError::Config(ConfigError::InvalidWritePolicy { .. }))
        ));
    }

    #[test]
    fn test_from_selectors_accepts_valid() {
        let (_, handles) = levels(3);
        let cache = MultiLevelCache::from_selectors(1, 2, 10, handles).expect("valid");
        assert_eq!(cache.read_policy(), ReadPolicy::CacheAside);
        assert_eq!(cache.write_policy(), WritePolicy::WriteBack);
        assert_eq!(cache.level_count(), 3);
        assert_eq!(cache.max_value_size(), 10);
    }

    #[test]
    fn test_new_rejects_bound_above_maximum() {
        let (_, handles) = levels(1);
        let result = MultiLevelCache::new(
            ReadPolicy::ReadThrough,
            WritePolicy::WriteThrough,
            MAX_CACHE_VALUE_SIZE + 1,
            handles,
        );
        match result {
            Err(TierError::Config(ConfigError::InvalidValue { field, .. })) => {
                assert_eq!(field, "max_value_size");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }

        let (_, handles) = levels(1);
        assert!(MultiLevelCache::new(
            ReadPolicy::ReadThrough,
            WritePolicy::WriteThrough,
            MAX_CACHE_VALUE_SIZE,
            handles,
        )
        .is_ok());
    }

    // === input checks ===

    #[tokio::test]
    async fn test_absent_key_rejected_for_every_operation() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 2);
        let key = CacheKey::new("");

        let put = cache.store(&key, b"v", expiry()).await.unwrap_err();
        assert_eq!(put.operation(), Some(Operation::Put));
        assert_eq!(
            cache.fetch(&key).await.unwrap_err().operation(),
            Some(Operation::Get)
        );
        assert_eq!(
            cache.remove(&key).await.unwrap_err().operation(),
            Some(Operation::Del)
        );
        assert_eq!(
            cache.is_present(&key).await.unwrap_err().operation(),
            Some(Operation::IsPresent)
        );
        assert!(concrete
            .iter()
            .all(|l| l.puts.load(Ordering::SeqCst) == 0 && l.deletes.load(Ordering::SeqCst) == 0));
    }

    #[tokio::test]
    async fn test_oversized_value_touches_no_level() {
        for write in WritePolicy::ALL {
            let (cache, concrete) = build(ReadPolicy::ReadThrough, write, 3);
            let err = cache
                .store(&CacheKey::new("big"), &[0u8; 65], expiry())
                .await
                .unwrap_err();
            assert_eq!(
                err,
                TierError::Input(InputError::ValueTooLarge { len: 65, max: 64 })
            );
            assert!(concrete.iter().all(|l| l.puts.load(Ordering::SeqCst) == 0));
        }
    }

    #[tokio::test]
    async fn test_value_at_bound_is_accepted() {
        let (cache, _) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 1);
        assert!(cache
            .store(&CacheKey::new("edge"), &[7u8; 64], expiry())
            .await
            .is_ok());
    }

    // === write path ===

    #[tokio::test]
    async fn test_write_through_reaches_every_level() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        cache
            .store(&CacheKey::new("metamorphosis"), b"franzkafka", expiry())
            .await
            .unwrap();
        assert!(concrete.iter().all(|l| l.holds("metamorphosis")));
    }

    #[tokio::test]
    async fn test_write_through_stops_at_first_failure_without_rollback() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        concrete[1].fail_put.store(true, Ordering::SeqCst);

        let err = cache
            .store(&CacheKey::new("k"), b"v", expiry())
            .await
            .unwrap_err();
        assert_eq!(err.failed_level(), Some(2));
        assert_eq!(err.to_string(), "put refused; Put error");
        assert!(concrete[0].holds("k"));
        assert_eq!(concrete[2].puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_through_failure_status_aborts() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 2);
        concrete[0].reject_put.store(true, Ordering::SeqCst);

        let err = cache
            .store(&CacheKey::new("k"), b"v", expiry())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            TierError::LevelRejected {
                level: 1,
                operation: Operation::Put
            }
        );
        assert_eq!(concrete[1].puts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_around_only_touches_last_level() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 3);
        cache
            .store(&CacheKey::new("cosmos"), b"carlsagan", expiry())
            .await
            .unwrap();
        assert!(!concrete[0].holds("cosmos"));
        assert!(!concrete[1].holds("cosmos"));
        assert!(concrete[2].holds("cosmos"));
    }

    #[tokio::test]
    async fn test_write_back_propagates_after_delay() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteBack, 3);
        cache
            .store(&CacheKey::new("thesirensoftitan"), b"kurtvonnegut", expiry())
            .await
            .unwrap();

        assert!(concrete[0].holds("thesirensoftitan"));
        assert!(!concrete[1].holds("thesirensoftitan"));
        assert!(!concrete[2].holds("thesirensoftitan"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(concrete.iter().all(|l| l.holds("thesirensoftitan")));
    }

    #[tokio::test]
    async fn test_write_back_single_level_schedules_nothing() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteBack, 1);
        cache
            .store(&CacheKey::new("solo"), b"v", expiry())
            .await
            .expect("level 1 write succeeds");

        assert!(concrete[0].holds("solo"));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(concrete[0].puts.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().background_tasks, 0);
    }

    #[tokio::test]
    async fn test_write_back_backlog_propagates_within_one_delay() {
        let (concrete, handles) = levels(2);
        let config = TierConfig::new(ReadPolicy::ReadThrough, WritePolicy::WriteBack)
            .with_max_value_size(64)
            .with_write_back_delay(Duration::from_millis(100))
            .with_max_background_tasks(2);
        let cache = MultiLevelCache::with_config(config, handles).expect("valid config");

        let keys: Vec<String> = (0..8).map(|i| format!("k{i}")).collect();
        for key in &keys {
            cache.store(&CacheKey::new(key), b"v", expiry()).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(160)).await;
        let held: Vec<bool> = keys.iter().map(|k| concrete[1].holds(k)).collect();
        assert_eq!(held, vec![true; 8]);
    }

    #[tokio::test]
    async fn test_write_back_level_one_failure_is_reported() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteBack, 2);
        concrete[0].fail_put.store(true, Ordering::SeqCst);

        let err = cache
            .store(&CacheKey::new("k"), b"v", expiry())
            .await
            .unwrap_err();
        assert_eq!(err.failed_level(), Some(1));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(concrete[1].puts.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().background_tasks, 0);
    }

    #[tokio::test]
    async fn test_write_back_propagation_stops_at_failure_silently() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteBack, 3);
        concrete[1].fail_put.store(true, Ordering::SeqCst);

        cache
            .store(&CacheKey::new("k"), b"v", expiry())
            .await
            .expect("level 1 write succeeds");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(concrete[1].puts.load(Ordering::SeqCst), 1);
        assert_eq!(concrete[2].puts.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().background_failures, 1);
    }

    // === read path ===

    #[tokio::test]
    async fn test_read_through_backfills_before_returning() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 3);
        let key = CacheKey::new("cosmos");
        cache.store(&key, b"carlsagan", expiry()).await.unwrap();

        let found = cache.fetch(&key).await.unwrap().expect("hit at level 3");
        assert_eq!(found.value, b"carlsagan".to_vec());
        assert!(concrete.iter().all(|l| l.holds("cosmos")));

        let stats = cache.stats();
        assert_eq!(stats.hits_per_level, vec![0, 0, 1]);
        assert_eq!(stats.backfill_writes, 2);
    }

    #[tokio::test]
    async fn test_read_through_backfill_order_is_nearest_to_hit_first() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 3);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        concrete[0].fail_put.store(true, Ordering::SeqCst);

        let err = cache.fetch(&key).await.unwrap_err();
        assert_eq!(err.failed_level(), Some(1));
        assert_eq!(err.operation(), Some(Operation::Get));
        // level 2 was refilled before level 1 failed
        assert!(concrete[1].holds("k"));
    }

    #[tokio::test]
    async fn test_read_through_backfill_failure_discards_value() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 2);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        concrete[0].reject_put.store(true, Ordering::SeqCst);

        assert!(matches!(
            cache.fetch(&key).await,
            Err(TierError::LevelRejected { level: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_cache_aside_returns_before_backfill() {
        let (cache, concrete) = build(ReadPolicy::CacheAside, WritePolicy::WriteAround, 3);
        let key = CacheKey::new("cosmos");
        cache.store(&key, b"carlsagan", expiry()).await.unwrap();

        let found = cache.fetch(&key).await.unwrap().expect("hit");
        assert_eq!(found.value, b"carlsagan".to_vec());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(concrete.iter().all(|l| l.holds("cosmos")));
    }

    #[tokio::test]
    async fn test_cache_aside_backfill_not_queued_behind_write_back() {
        let (concrete, handles) = levels(2);
        let config = TierConfig::new(ReadPolicy::CacheAside, WritePolicy::WriteBack)
            .with_max_value_size(64)
            .with_write_back_delay(Duration::from_millis(300))
            .with_max_background_tasks(2);
        let cache = MultiLevelCache::with_config(config, handles).expect("valid config");

        for i in 0..4 {
            let key = CacheKey::new(format!("wb{i}"));
            cache.store(&key, b"v", expiry()).await.unwrap();
        }
        let far = CacheKey::new("far");
        concrete[1].put(&far, b"deep", expiry()).await.unwrap();

        let found = cache.fetch(&far).await.unwrap().expect("hit at level 2");
        assert_eq!(found.value, b"deep".to_vec());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(concrete[0].holds("far"));
        assert!(!concrete[1].holds("wb0"));
    }

    #[tokio::test]
    async fn test_cache_aside_backfill_failure_is_not_surfaced() {
        let (cache, concrete) = build(ReadPolicy::CacheAside, WritePolicy::WriteAround, 3);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        concrete[1].fail_put.store(true, Ordering::SeqCst);

        assert!(cache.fetch(&key).await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(50)).await;

        // level 1 is still attempted after level 2 fails
        assert!(concrete[0].holds("k"));
        assert_eq!(cache.stats().background_failures, 1);
    }

    #[tokio::test]
    async fn test_fetch_miss_everywhere_is_none() {
        let (cache, _) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        assert!(cache.fetch(&CacheKey::new("absent")).await.unwrap().is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_failing_level_read_is_a_miss() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 2);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        concrete[0].fail_get.store(true, Ordering::SeqCst);

        let found = cache.fetch(&key).await.unwrap();
        assert_eq!(found.map(CachedValue::into_value), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_level_one_hit_does_no_backfill() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();

        cache.fetch(&key).await.unwrap();
        assert!(concrete.iter().all(|l| l.puts.load(Ordering::SeqCst) == 1));
        assert_eq!(cache.stats().hits_per_level, vec![1, 0, 0]);
    }

    // === delete / presence / flush ===

    #[tokio::test]
    async fn test_remove_walks_backward_and_stops_on_failure() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        concrete[1].fail_delete.store(true, Ordering::SeqCst);

        let err = cache.remove(&key).await.unwrap_err();
        assert_eq!(err.to_string(), "delete refused; Del error");
        assert!(!concrete[2].holds("k"));
        assert!(concrete[1].holds("k"));
        assert_eq!(concrete[0].deletes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_clears_all_levels() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 2);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        cache.remove(&key).await.unwrap();
        assert!(concrete.iter().all(|l| !l.holds("k")));
    }

    #[tokio::test]
    async fn test_is_present_consults_level_one_only() {
        let (cache, _) = build(ReadPolicy::ReadThrough, WritePolicy::WriteAround, 2);
        let key = CacheKey::new("k");
        cache.store(&key, b"v", expiry()).await.unwrap();
        // present at level 2 only
        assert!(!cache.is_present(&key).await.unwrap());

        cache.fetch(&key).await.unwrap();
        assert!(cache.is_present(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_all_returns_immediately_and_clears() {
        let (cache, concrete) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 3);
        cache
            .store(&CacheKey::new("k"), b"v", expiry())
            .await
            .unwrap();

        cache.flush_all();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(concrete.iter().all(|l| !l.holds("k")));
        assert_eq!(cache.stats().background_tasks, 3);
    }

    // === nesting ===

    #[tokio::test]
    async fn test_orchestrator_nests_as_a_level() {
        let (inner, inner_levels) = build(ReadPolicy::ReadThrough, WritePolicy::WriteThrough, 2);
        let front = Arc::new(InMemoryLevel::named("front"));
        let outer = MultiLevelCache::new(
            ReadPolicy::ReadThrough,
            WritePolicy::WriteAround,
            64,
            vec![Arc::clone(&front) as LevelHandle, Arc::new(inner) as LevelHandle],
        )
        .unwrap();

        let key = CacheKey::new("nested");
        outer.store(&key, b"v", expiry()).await.unwrap();
        assert!(!front.contains("nested"));
        assert!(inner_levels.iter().all(|l| l.holds("nested")));

        outer.fetch(&key).await.unwrap().expect("hit in nested chain");
        assert!(front.contains("nested"));
    }
}
