//! mlcache Test Utilities
//!
//! Centralized test infrastructure for the mlcache workspace:
//! - A scripted level with call recording and fault injection
//! - Proptest generators for keys, values, policies and configs
//! - Test fixtures for common chains
//! - Custom assertions for orchestrator results

// Re-export the types tests touch most
pub use mlcache_core::{
    CacheKey, CacheStatus, CachedValue, ConfigError, InputError, LevelError, LevelResult,
    Operation, ReadPolicy, TierConfig, TierError, TierResult, Timestamp, WritePolicy,
    MAX_LEVELS,
};
pub use mlcache_storage::{CacheLevel, InMemoryLevel, LevelHandle, MultiLevelCache};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// SCRIPTED LEVEL
// ============================================================================

/// One recorded call against a [`ScriptedLevel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelCall {
    Get(String),
    Put(String),
    Delete(String),
    Exists(String),
    Flush,
}

/// How a scripted operation misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    /// Return a `LevelError`.
    Error,
    /// Return `Ok(CacheStatus::Failure)` (or `Ok(None)` for gets).
    Reject,
}

#[derive(Debug, Default)]
struct Faults {
    get: Fault,
    put: Fault,
    delete: Fault,
    exists: Fault,
    flush: Fault,
}

/// In-memory level that records every call and fails on demand.
#[derive(Debug)]
pub struct ScriptedLevel {
    inner: InMemoryLevel,
    faults: Mutex<Faults>,
    latency: Mutex<Option<Duration>>,
    calls: Mutex<Vec<LevelCall>>,
}

impl ScriptedLevel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: InMemoryLevel::named(name),
            faults: Mutex::new(Faults::default()),
            latency: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_gets(&self) -> &Self {
        lock(&self.faults).get = Fault::Error;
        self
    }

    pub fn fail_puts(&self) -> &Self {
        lock(&self.faults).put = Fault::Error;
        self
    }

    pub fn reject_puts(&self) -> &Self {
        lock(&self.faults).put = Fault::Reject;
        self
    }

    pub fn fail_deletes(&self) -> &Self {
        lock(&self.faults).delete = Fault::Error;
        self
    }

    pub fn reject_deletes(&self) -> &Self {
        lock(&self.faults).delete = Fault::Reject;
        self
    }

    pub fn fail_exists(&self) -> &Self {
        lock(&self.faults).exists = Fault::Error;
        self
    }

    pub fn fail_flush(&self) -> &Self {
        lock(&self.faults).flush = Fault::Error;
        self
    }

    /// Clear every injected fault.
    pub fn heal(&self) -> &Self {
        *lock(&self.faults) = Faults::default();
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(&self, latency: Duration) -> &Self {
        *lock(&self.latency) = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<LevelCall> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    pub fn put_count(&self) -> usize {
        self.count(|call| matches!(call, LevelCall::Put(_)))
    }

    pub fn get_count(&self) -> usize {
        self.count(|call| matches!(call, LevelCall::Get(_)))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|call| matches!(call, LevelCall::Delete(_)))
    }

    pub fn flush_count(&self) -> usize {
        self.count(|call| matches!(call, LevelCall::Flush))
    }

    /// Whether the key is stored here and unexpired.
    pub fn holds(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    pub fn value_of(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.peek(key).map(CachedValue::into_value)
    }

    fn count(&self, pred: impl Fn(&LevelCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| pred(call)).count()
    }

    async fn enter(&self, call: LevelCall) {
        lock(&self.calls).push(call);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn fault(&self, pick: impl Fn(&Faults) -> Fault) -> Fault {
        pick(&*lock(&self.faults))
    }

    fn injected(&self, op: &str) -> LevelError {
        LevelError::backend(format!("{} injected {op} failure", self.inner.name()))
    }
}

#[async_trait]
impl CacheLevel for ScriptedLevel {
    async fn get(&self, key: &CacheKey) -> LevelResult<Option<CachedValue>> {
        self.enter(LevelCall::Get(key.to_string())).await;
        match self.fault(|f| f.get) {
            Fault::Error => Err(self.injected("get")),
            Fault::Reject => Ok(None),
            Fault::None => self.inner.get(key).await,
        }
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: &[u8],
        expires_at: Timestamp,
    ) -> LevelResult<CacheStatus> {
        self.enter(LevelCall::Put(key.to_string())).await;
        match self.fault(|f| f.put) {
            Fault::Error => Err(self.injected("put")),
            Fault::Reject => Ok(CacheStatus::Failure),
            Fault::None => self.inner.put(key, value, expires_at).await,
        }
    }

    async fn delete(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        self.enter(LevelCall::Delete(key.to_string())).await;
        match self.fault(|f| f.delete) {
            Fault::Error => Err(self.injected("delete")),
            Fault::Reject => Ok(CacheStatus::Failure),
            Fault::None => self.inner.delete(key).await,
        }
    }

    async fn exists(&self, key: &CacheKey) -> LevelResult<CacheStatus> {
        self.enter(LevelCall::Exists(key.to_string())).await;
        match self.fault(|f| f.exists) {
            Fault::Error => Err(self.injected("exists")),
            Fault::Reject => Ok(CacheStatus::Failure),
            Fault::None => self.inner.exists(key).await,
        }
    }

    async fn flush(&self) -> LevelResult<()> {
        self.enter(LevelCall::Flush).await;
        match self.fault(|f| f.flush) {
            Fault::Error | Fault::Reject => Err(self.injected("flush")),
            Fault::None => self.inner.flush().await,
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for orchestrator inputs.

    use super::*;
    use proptest::prelude::*;

    /// A legal chain length, 1..=5.
    pub fn arb_level_count() -> impl Strategy<Value = usize> {
        1usize..=MAX_LEVELS
    }

    pub fn arb_read_policy() -> impl Strategy<Value = ReadPolicy> {
        prop_oneof![Just(ReadPolicy::ReadThrough), Just(ReadPolicy::CacheAside)]
    }

    pub fn arb_write_policy() -> impl Strategy<Value = WritePolicy> {
        prop_oneof![
            Just(WritePolicy::WriteThrough),
            Just(WritePolicy::WriteAround),
            Just(WritePolicy::WriteBack),
        ]
    }

    /// A non-empty key identifier.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,31}"
    }

    /// A payload of at most `max_len` bytes.
    pub fn arb_value(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..=max_len)
    }

    /// An expiry between one minute and one day from now.
    pub fn arb_expiry() -> impl Strategy<Value = Timestamp> {
        (60i64..86_400).prop_map(|secs| Utc::now() + chrono::Duration::seconds(secs))
    }

    pub fn arb_tier_config() -> impl Strategy<Value = TierConfig> {
        (
            arb_read_policy(),
            arb_write_policy(),
            1usize..=1 << 20,
            0u64..=50,
            1usize..=128,
        )
            .prop_map(|(read, write, max, delay_ms, tasks)| {
                TierConfig::new(read, write)
                    .with_max_value_size(max)
                    .with_write_back_delay(Duration::from_millis(delay_ms))
                    .with_max_background_tasks(tasks)
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built chains and orchestrators.

    use super::*;

    /// Write-back delay used by fixtures, short enough for fast tests.
    pub const TEST_WRITE_BACK_DELAY: Duration = Duration::from_millis(20);

    /// How long to wait for detached tasks started by a fixture orchestrator.
    pub const SETTLE_TIME: Duration = Duration::from_millis(150);

    pub fn expires_in_an_hour() -> Timestamp {
        Utc::now() + chrono::Duration::hours(1)
    }

    /// `n` scripted levels named `l1..ln`, plus the handles to build a chain.
    pub fn scripted_chain(n: usize) -> (Vec<Arc<ScriptedLevel>>, Vec<LevelHandle>) {
        let levels: Vec<Arc<ScriptedLevel>> = (1..=n)
            .map(|i| Arc::new(ScriptedLevel::new(format!("l{i}"))))
            .collect();
        let handles = levels
            .iter()
            .map(|level| Arc::clone(level) as LevelHandle)
            .collect();
        (levels, handles)
    }

    /// Config with the fixture write-back delay and background reporting on.
    pub fn test_config(read: ReadPolicy, write: WritePolicy) -> TierConfig {
        TierConfig::new(read, write)
            .with_max_value_size(1024)
            .with_write_back_delay(TEST_WRITE_BACK_DELAY)
            .with_background_reporting(true)
    }

    /// Orchestrator over `n` scripted levels.
    pub fn orchestrator(
        read: ReadPolicy,
        write: WritePolicy,
        n: usize,
    ) -> TierResult<(MultiLevelCache, Vec<Arc<ScriptedLevel>>)> {
        let (levels, handles) = scripted_chain(n);
        let cache = MultiLevelCache::with_config(test_config(read, write), handles)?;
        Ok((cache, levels))
    }

    /// Wait long enough for fixture background tasks to finish.
    pub async fn settle() {
        tokio::time::sleep(SETTLE_TIME).await;
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for orchestrator results and level contents.

    use super::*;

    /// Assert that a TierResult is a specific configuration error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &TierResult<T>, expected: &ConfigError) {
        match result {
            Err(TierError::Config(actual)) => assert_eq!(actual, expected),
            other => panic!("Expected Config error {expected:?}, got: {other:?}"),
        }
    }

    /// Assert that a TierResult is a specific input error.
    #[track_caller]
    pub fn assert_input_error<T: std::fmt::Debug>(result: &TierResult<T>, expected: &InputError) {
        match result {
            Err(TierError::Input(actual)) => assert_eq!(actual, expected),
            other => panic!("Expected Input error {expected:?}, got: {other:?}"),
        }
    }

    /// Assert that a TierResult failed at `level` during `operation`.
    #[track_caller]
    pub fn assert_level_failure<T: std::fmt::Debug>(
        result: &TierResult<T>,
        level: usize,
        operation: Operation,
    ) {
        match result {
            Err(e) if e.failed_level() == Some(level) && e.operation() == Some(operation) => {}
            other => panic!("Expected {operation} failure at level {level}, got: {other:?}"),
        }
    }

    /// Assert that exactly the given 1-based positions hold `key`.
    #[track_caller]
    pub fn assert_held_at(levels: &[Arc<ScriptedLevel>], key: &str, positions: &[usize]) {
        let holding: Vec<usize> = levels
            .iter()
            .enumerate()
            .filter(|(_, level)| level.holds(key))
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(holding, positions, "levels holding {key:?}");
    }

    /// Assert that every level holds `key` with `value`.
    #[track_caller]
    pub fn assert_held_everywhere(levels: &[Arc<ScriptedLevel>], key: &str, value: &[u8]) {
        for (i, level) in levels.iter().enumerate() {
            assert_eq!(
                level.value_of(key).as_deref(),
                Some(value),
                "level {} value for {key:?}",
                i + 1
            );
        }
    }

    /// Assert that no level saw a put.
    #[track_caller]
    pub fn assert_no_puts(levels: &[Arc<ScriptedLevel>]) {
        for (i, level) in levels.iter().enumerate() {
            assert_eq!(level.put_count(), 0, "level {} received a put", i + 1);
        }
    }
}
