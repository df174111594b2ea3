//! Read and write policy selectors.
//!
//! Numeric selectors follow the enumeration order `0..N`; anything outside
//! it is rejected with the matching [`ConfigError`].

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a fetch that hits a farther level refills the nearer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum ReadPolicy {
    /// Backfill nearer levels synchronously before returning.
    #[default]
    ReadThrough = 0,
    /// Return immediately and backfill in a detached task.
    CacheAside = 1,
}

impl ReadPolicy {
    pub const ALL: [ReadPolicy; 2] = [ReadPolicy::ReadThrough, ReadPolicy::CacheAside];

    pub fn selector(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadThrough => "read-through",
            Self::CacheAside => "cache-aside",
        }
    }

    /// Whether the caller waits for backfill to complete.
    pub fn awaits_backfill(self) -> bool {
        matches!(self, Self::ReadThrough)
    }
}

impl TryFrom<u8> for ReadPolicy {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ReadThrough),
            1 => Ok(Self::CacheAside),
            other => Err(ConfigError::InvalidReadPolicy {
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for ReadPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(selector) = s.trim().parse::<u8>() {
            return Self::try_from(selector);
        }
        match normalize(s).as_str() {
            "read-through" => Ok(Self::ReadThrough),
            "cache-aside" => Ok(Self::CacheAside),
            _ => Err(ConfigError::InvalidReadPolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which levels a store reaches synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum WritePolicy {
    /// Every level, nearest first.
    #[default]
    WriteThrough = 0,
    /// The farthest level only.
    WriteAround = 1,
    /// Level 1 now, the rest after a delay in a detached task.
    WriteBack = 2,
}

impl WritePolicy {
    pub const ALL: [WritePolicy; 3] = [
        WritePolicy::WriteThrough,
        WritePolicy::WriteAround,
        WritePolicy::WriteBack,
    ];

    pub fn selector(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::WriteThrough => "write-through",
            Self::WriteAround => "write-around",
            Self::WriteBack => "write-back",
        }
    }
}

impl TryFrom<u8> for WritePolicy {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::WriteThrough),
            1 => Ok(Self::WriteAround),
            2 => Ok(Self::WriteBack),
            other => Err(ConfigError::InvalidWritePolicy {
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(selector) = s.trim().parse::<u8>() {
            return Self::try_from(selector);
        }
        match normalize(s).as_str() {
            "write-through" => Ok(Self::WriteThrough),
            "write-around" => Ok(Self::WriteAround),
            "write-back" => Ok(Self::WriteBack),
            _ => Err(ConfigError::InvalidWritePolicy {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['_', ' '], "-")
}
