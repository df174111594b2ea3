//! Error types for mlcache operations

use crate::CacheStatus;
use std::fmt;
use thiserror::Error;

/// The orchestrator operation an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Put,
    Del,
    IsPresent,
    Flush,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "Get",
            Self::Put => "Put",
            Self::Del => "Del",
            Self::IsPresent => "IsPresent",
            Self::Flush => "Flush",
        };
        f.write_str(name)
    }
}

/// Configuration errors, raised before any chain is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No workable cache found")]
    NoWorkableCache,

    #[error("Max cache level exceeded: {levels} levels supplied, at most {max} allowed")]
    MaxLevelExceeded { levels: usize, max: usize },

    #[error("Invalid read pattern: {value}")]
    InvalidReadPolicy { value: String },

    #[error("Invalid write pattern: {value}")]
    InvalidWritePolicy { value: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Caller input rejected before any level is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{operation} error: cache key is absent")]
    MissingKey { operation: Operation },

    #[error("Max val len exceeded: {len} bytes over a limit of {max}")]
    ValueTooLarge { len: usize, max: usize },
}

/// Failure reported by a single level implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("{reason}")]
    Backend { reason: String },

    #[error("Level unavailable: {reason}")]
    Unavailable { reason: String },
}

impl LevelError {
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Master error type for all orchestrator operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// A level returned an error; rendered as `"<level error>; <Op> error"`.
    #[error("{source}; {operation} error")]
    Level {
        level: usize,
        operation: Operation,
        #[source]
        source: LevelError,
    },

    /// A level reported `CacheStatus::Failure` without an error.
    #[error("Level {level} reported failure; {operation} error")]
    LevelRejected { level: usize, operation: Operation },
}

impl TierError {
    /// Wrap a level error with the operation it interrupted.
    pub fn level(level: usize, operation: Operation, source: LevelError) -> Self {
        Self::Level {
            level,
            operation,
            source,
        }
    }

    /// Chain position (1-based) of the level that failed, if any.
    pub fn failed_level(&self) -> Option<usize> {
        match self {
            Self::Level { level, .. } | Self::LevelRejected { level, .. } => Some(*level),
            Self::Config(_) | Self::Input(_) => None,
        }
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Level { operation, .. } | Self::LevelRejected { operation, .. } => {
                Some(*operation)
            }
            Self::Input(InputError::MissingKey { operation }) => Some(*operation),
            Self::Input(InputError::ValueTooLarge { .. }) => Some(Operation::Put),
            Self::Config(_) => None,
        }
    }
}

/// Nested orchestrators surface their failures to the outer chain as
/// backend errors.
impl From<TierError> for LevelError {
    fn from(e: TierError) -> Self {
        LevelError::Backend {
            reason: e.to_string(),
        }
    }
}

/// Result type alias for level implementations.
pub type LevelResult<T> = Result<T, LevelError>;

/// Result type alias for orchestrator operations.
pub type TierResult<T> = Result<T, TierError>;

/// Fold one level's outcome into the orchestrator's error taxonomy.
///
/// Both an error and a `Failure` status abort a synchronous traversal.
pub fn ensure_success(
    level: usize,
    operation: Operation,
    outcome: LevelResult<CacheStatus>,
) -> TierResult<()> {
    match outcome {
        Ok(CacheStatus::Success) => Ok(()),
        Ok(CacheStatus::Failure) => Err(TierError::LevelRejected { level, operation }),
        Err(source) => Err(TierError::level(level, operation, source)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
