//! Level chain and multi-level orchestration.
//!
//! A [`MultiLevelCache`] wraps 1 to 5 [`CacheLevel`]s, nearest first, and
//! exposes them as one cache. Which levels a read refills and a write
//! reaches is decided by the [`ReadPolicy`](mlcache_core::ReadPolicy) and
//! [`WritePolicy`](mlcache_core::WritePolicy) chosen at construction.
//!
//! # Consistency
//!
//! Synchronous paths (read-through backfill, write-through, write-around,
//! delete, the level-1 write of write-back) complete or fail before the call
//! returns. Asynchronous paths (cache-aside backfill, write-back propagation,
//! flush) run as detached tasks with no ordering guarantee relative to later
//! calls on the same key, so a caller can observe stale data in between.
//! Nothing here has a timeout: a hung level stalls the call that awaits it.
//!
//! # Example
//!
//! ```ignore
//! let l1 = Arc::new(InMemoryLevel::named("l1"));
//! let l2 = Arc::new(RemoteLevel::connect(addr).await?);
//!
//! let cache = MultiLevelCache::new(
//!     ReadPolicy::CacheAside,
//!     WritePolicy::WriteBack,
//!     64 * 1024,
//!     vec![l1 as LevelHandle, l2 as LevelHandle],
//! )?;
//! ```

pub mod background;
pub mod chain;
pub mod memory_backend;
pub mod multi_level;
pub mod stats;
pub mod traits;
pub mod validator;

pub use background::BackgroundSpawner;
pub use chain::{ChainCursor, LevelChain};
pub use memory_backend::InMemoryLevel;
pub use multi_level::MultiLevelCache;
pub use stats::{TierCounters, TierStats};
pub use traits::{CacheLevel, LevelHandle};
pub use validator::validate;
