//! Construction-time validation of level count and policy selectors.

use mlcache_core::{ConfigError, ReadPolicy, WritePolicy, MAX_LEVELS};

/// Check a proposed chain configuration.
///
/// Checks run in this order and the first violation wins:
/// 1. zero levels -> [`ConfigError::NoWorkableCache`]
/// 2. more than [`MAX_LEVELS`] -> [`ConfigError::MaxLevelExceeded`]
/// 3. unknown read selector -> [`ConfigError::InvalidReadPolicy`]
/// 4. unknown write selector -> [`ConfigError::InvalidWritePolicy`]
pub fn validate(
    level_count: usize,
    read_selector: u8,
    write_selector: u8,
) -> Result<(ReadPolicy, WritePolicy), ConfigError> {
    if level_count == 0 {
        return Err(ConfigError::NoWorkableCache);
    }

    if level_count > MAX_LEVELS {
        return Err(ConfigError::MaxLevelExceeded {
            levels: level_count,
            max: MAX_LEVELS,
        });
    }

    let read_policy = ReadPolicy::try_from(read_selector)?;
    let write_policy = WritePolicy::try_from(write_selector)?;

    Ok((read_policy, write_policy))
}
