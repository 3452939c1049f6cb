//! Spin generations and reel identifiers

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of reels on the machine
pub const REEL_COUNT: usize = 3;

/// Identifier of one spin attempt.
///
/// Minted on every accepted spin request and strictly increasing. Anything
/// tagged with an older generation than the live one is inert.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SpinGeneration(pub u64);

impl SpinGeneration {
    /// Generation before any spin was accepted
    pub const ZERO: Self = Self(0);

    /// The generation that follows this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpinGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// One of the three reels (0-indexed, left to right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReelId(u8);

impl ReelId {
    /// All reels in stop order
    pub const ALL: [ReelId; REEL_COUNT] = [ReelId(0), ReelId(1), ReelId(2)];

    /// Returns `None` for indices outside the machine
    pub fn new(index: usize) -> Option<Self> {
        (index < REEL_COUNT).then_some(Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ReelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
