//! Orchestrator-level statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use mlcache_core::MAX_LEVELS;

/// Lock-free counters shared by the orchestrator and its background tasks.
#[derive(Debug, Default)]
pub struct TierCounters {
    hits: [AtomicU64; MAX_LEVELS],
    misses: AtomicU64,
    backfill_writes: AtomicU64,
    background_tasks: AtomicU64,
    background_failures: AtomicU64,
}

impl TierCounters {
    /// Record a hit at a 1-based level position.
    pub fn record_hit(&self, position: usize) {
        if let Some(counter) = position.checked_sub(1).and_then(|i| self.hits.get(i)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backfill(&self) {
        self.backfill_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_task(&self) {
        self.background_tasks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_background_failure(&self) {
        self.background_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters for the first `levels` positions.
    pub fn snapshot(&self, levels: usize) -> TierStats {
        TierStats {
            hits_per_level: self
                .hits
                .iter()
                .take(levels)
                .map(|c| c.load(Ordering::Relaxed))
                .collect(),
            misses: self.misses.load(Ordering::Relaxed),
            backfill_writes: self.backfill_writes.load(Ordering::Relaxed),
            background_tasks: self.background_tasks.load(Ordering::Relaxed),
            background_failures: self.background_failures.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about orchestrator usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierStats {
    /// Hits per level; index 0 is level 1.
    pub hits_per_level: Vec<u64>,
    /// Fetches that found nothing at any level.
    pub misses: u64,
    /// Successful writes into nearer levels after a farther hit.
    pub backfill_writes: u64,
    /// Detached tasks launched.
    pub background_tasks: u64,
    /// Detached tasks that ended in an error.
    pub background_failures: u64,
}

impl TierStats {
    pub fn hits(&self) -> u64 {
        self.hits_per_level.iter().sum()
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}
