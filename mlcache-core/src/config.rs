//! Configuration types

use crate::error::ConfigError;
use crate::policy::{ReadPolicy, WritePolicy};
use crate::MAX_CACHE_VALUE_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay before write-back propagation to levels 2..N starts.
pub const DEFAULT_WRITE_BACK_DELAY_MS: u64 = 200;

/// Background tasks allowed to touch levels at the same time.
pub const DEFAULT_MAX_BACKGROUND_TASKS: usize = 64;

/// Orchestrator configuration.
///
/// Policies and bounds are fixed once an orchestrator is built from this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub read_policy: ReadPolicy,
    pub write_policy: WritePolicy,
    /// Largest value, in bytes, a store accepts.
    pub max_value_size: usize,
    pub write_back_delay_ms: u64,
    pub max_background_tasks: usize,
    /// Log failures of detached tasks instead of discarding them silently.
    pub report_background_failures: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            read_policy: ReadPolicy::default(),
            write_policy: WritePolicy::default(),
            max_value_size: MAX_CACHE_VALUE_SIZE,
            write_back_delay_ms: DEFAULT_WRITE_BACK_DELAY_MS,
            max_background_tasks: DEFAULT_MAX_BACKGROUND_TASKS,
            report_background_failures: false,
        }
    }
}

impl TierConfig {
    pub fn new(read_policy: ReadPolicy, write_policy: WritePolicy) -> Self {
        Self {
            read_policy,
            write_policy,
            ..Self::default()
        }
    }

    pub fn with_max_value_size(mut self, max_value_size: usize) -> Self {
        self.max_value_size = max_value_size;
        self
    }

    pub fn with_write_back_delay(mut self, delay: Duration) -> Self {
        self.write_back_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_max_background_tasks(mut self, max: usize) -> Self {
        self.max_background_tasks = max;
        self
    }

    pub fn with_background_reporting(mut self, enabled: bool) -> Self {
        self.report_background_failures = enabled;
        self
    }

    pub fn write_back_delay(&self) -> Duration {
        Duration::from_millis(self.write_back_delay_ms)
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `MLCACHE_READ_POLICY`: `read-through` | `cache-aside` | `0` | `1`
    /// - `MLCACHE_WRITE_POLICY`: `write-through` | `write-around` | `write-back` | `0..=2`
    /// - `MLCACHE_MAX_VALUE_SIZE`: bytes (default: `i32::MAX`)
    /// - `MLCACHE_WRITE_BACK_DELAY_MS`: (default: 200)
    /// - `MLCACHE_MAX_BACKGROUND_TASKS`: (default: 64)
    /// - `MLCACHE_REPORT_BACKGROUND_FAILURES`: `true` | `false` (default: false)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TierConfig::from_env`] with a caller-supplied variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            read_policy: lookup("MLCACHE_READ_POLICY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.read_policy),
            write_policy: lookup("MLCACHE_WRITE_POLICY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.write_policy),
            max_value_size: lookup("MLCACHE_MAX_VALUE_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_value_size),
            write_back_delay_ms: lookup("MLCACHE_WRITE_BACK_DELAY_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.write_back_delay_ms),
            max_background_tasks: lookup("MLCACHE_MAX_BACKGROUND_TASKS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_background_tasks),
            report_background_failures: lookup("MLCACHE_REPORT_BACKGROUND_FAILURES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.report_background_failures),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - max_value_size <= i32::MAX
    /// - max_background_tasks > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_value_size > MAX_CACHE_VALUE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "max_value_size".to_string(),
                value: self.max_value_size.to_string(),
                reason: format!("max_value_size must not exceed {MAX_CACHE_VALUE_SIZE}"),
            });
        }

        if self.max_background_tasks == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_background_tasks".to_string(),
                value: self.max_background_tasks.to_string(),
                reason: "max_background_tasks must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
