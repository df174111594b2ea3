//! mlcache Storage - Level Trait and Multi-Level Orchestrator
//!
//! Defines the capability every cache level implements and the orchestrator
//! that walks a chain of levels under a read policy and a write policy.
//! Storage engines themselves live with whoever embeds this crate.

pub mod cache;

pub use cache::{
    validate, BackgroundSpawner, CacheLevel, ChainCursor, InMemoryLevel, LevelChain,
    LevelHandle, MultiLevelCache, TierCounters, TierStats,
};

// Re-export core types so embedders need a single dependency
pub use mlcache_core::{
    CacheKey, CacheStatus, CachedValue, ConfigError, InputError, LevelError, LevelResult,
    Operation, ReadPolicy, TierConfig, TierError, TierResult, Timestamp, WritePolicy,
    MAX_CACHE_VALUE_SIZE, MAX_LEVELS,
};
