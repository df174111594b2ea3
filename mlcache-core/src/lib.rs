//! mlcache Core - Shared Types
//!
//! Pure data structures shared by the orchestrator and every plugged-in level.
//! This crate contains no async code and performs no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod key;
pub mod policy;

pub use config::TierConfig;
pub use error::{
    ensure_success, ConfigError, InputError, LevelError, LevelResult, Operation, TierError,
    TierResult,
};
pub use key::{CacheKey, KeyPool};
pub use policy::{ReadPolicy, WritePolicy};

// ============================================================================
// LIMITS
// ============================================================================

/// Hard upper bound on the number of levels in a chain.
pub const MAX_LEVELS: usize = 5;

/// Largest value size the orchestrator can be configured to accept.
pub const MAX_CACHE_VALUE_SIZE: usize = i32::MAX as usize;

/// Absolute expiry instant attached to every cached value.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// LEVEL OUTCOMES
// ============================================================================

/// Success/failure status reported by a level alongside its error channel.
///
/// A level may return `Ok(CacheStatus::Failure)` to refuse an operation
/// without producing an error; the orchestrator treats that exactly like an
/// error during synchronous traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheStatus {
    Success,
    Failure,
}

impl CacheStatus {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

impl From<bool> for CacheStatus {
    fn from(ok: bool) -> Self {
        if ok {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// A value found in a level together with its expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue {
    pub value: Vec<u8>,
    pub expires_at: Timestamp,
}

impl CachedValue {
    pub fn new(value: impl Into<Vec<u8>>, expires_at: Timestamp) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Length of the payload in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Whether the entry had expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }
}

// =============================================================================
// TESTS
// =============================================================================
