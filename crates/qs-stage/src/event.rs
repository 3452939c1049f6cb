//! SpinEvent: a stage occurrence with timing
//!
//! Also defines the two reel-level signals that drive the join barrier:
//! [`CompletionEvent`] (one reel landed) and [`AllReelsStopped`].

use serde::{Deserialize, Serialize};

use crate::generation::{ReelId, SpinGeneration, REEL_COUNT};
use crate::stage::Stage;

/// One reel reached its commanded stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub reel: ReelId,
    pub generation: SpinGeneration,
    /// Stop index as commanded (not reduced modulo the segment count)
    pub stop_value: u32,
}

/// Join signal: every reel of a generation has stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllReelsStopped {
    pub generation: SpinGeneration,
    /// Stops indexed by reel
    pub stops: [u32; REEL_COUNT],
}

impl AllReelsStopped {
    /// True when all three reels show the same stop
    pub fn is_matching(&self) -> bool {
        self.stops.iter().all(|s| *s == self.stops[0])
    }
}

/// A stage with its timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinEvent {
    pub stage: Stage,

    /// Milliseconds since the machine runtime started
    pub timestamp_ms: f64,
}

impl SpinEvent {
    pub fn new(stage: Stage, timestamp_ms: f64) -> Self {
        Self {
            stage,
            timestamp_ms,
        }
    }

    pub fn generation(&self) -> Option<SpinGeneration> {
        self.stage.generation()
    }

    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}
