//! Ordered chain of levels.
//!
//! The chain is a contiguous, immutable sequence of level handles. Positions
//! are 1-based: position 1 is the nearest/fastest level, position N the
//! farthest/slowest. Forward and backward traversal is index arithmetic over
//! the sequence, so there are no neighbor links to keep consistent.

use std::fmt;
use std::sync::Arc;

use super::traits::LevelHandle;

/// Immutable, non-empty sequence of levels.
///
/// Cloning is cheap (one reference count), which lets detached tasks carry
/// the chain without borrowing from the orchestrator.
#[derive(Clone)]
pub struct LevelChain {
    levels: Arc<[LevelHandle]>,
}

impl LevelChain {
    /// Build a chain in the supplied order.
    ///
    /// Returns `None` for an empty list; bounds beyond that are the
    /// validator's concern.
    pub fn new(levels: Vec<LevelHandle>) -> Option<Self> {
        if levels.is_empty() {
            return None;
        }
        Some(Self {
            levels: levels.into(),
        })
    }

    /// Number of levels (N).
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level 1.
    pub fn head(&self) -> &LevelHandle {
        &self.levels[0]
    }

    /// Level N.
    pub fn tail(&self) -> &LevelHandle {
        &self.levels[self.levels.len() - 1]
    }

    /// Levels 1..=N as `(position, level)`.
    pub fn forward(
        &self,
    ) -> impl DoubleEndedIterator<Item = (usize, &LevelHandle)> + ExactSizeIterator + '_ {
        self.levels
            .iter()
            .enumerate()
            .map(|(index, level)| (index + 1, level))
    }

    /// Levels N down to 1 as `(position, level)`.
    pub fn backward(&self) -> impl Iterator<Item = (usize, &LevelHandle)> + '_ {
        self.forward().rev()
    }

    /// Levels strictly nearer than `position`, from `position - 1` down to 1.
    pub fn nearer_than(&self, position: usize) -> impl Iterator<Item = (usize, &LevelHandle)> + '_ {
        let end = position.saturating_sub(1).min(self.levels.len());
        self.forward().take(end).rev()
    }

    /// Levels strictly farther than `position`, from `position + 1` up to N.
    pub fn farther_than(
        &self,
        position: usize,
    ) -> impl Iterator<Item = (usize, &LevelHandle)> + '_ {
        self.forward().skip(position)
    }

    /// Cursor positioned on level 1.
    pub fn cursor(&self) -> ChainCursor<'_> {
        ChainCursor {
            chain: self,
            index: 0,
        }
    }
}

impl fmt::Debug for LevelChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.levels.iter().map(|level| level.name()))
            .finish()
    }
}

/// Current-index cursor over a chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainCursor<'a> {
    chain: &'a LevelChain,
    index: usize,
}

impl<'a> ChainCursor<'a> {
    /// 1-based position of the current level.
    pub fn position(&self) -> usize {
        self.index + 1
    }

    pub fn level(&self) -> &'a LevelHandle {
        &self.chain.levels[self.index]
    }

    pub fn is_tail(&self) -> bool {
        self.index + 1 == self.chain.len()
    }

    /// Step toward slower levels. Returns `false` at the tail.
    pub fn advance(&mut self) -> bool {
        if self.is_tail() {
            return false;
        }
        self.index += 1;
        true
    }
}
