//! Completion aggregator: the three-reel join barrier
//!
//! Counts completion events for the tracked generation and signals
//! [`AllReelsStopped`] exactly once per generation. Events from older
//! generations are dropped; an event from a newer generation restarts
//! tracking. Join is count-based, so arrival order does not matter.

use qs_stage::{AllReelsStopped, CompletionEvent, SpinGeneration, REEL_COUNT};

/// Why an event did not advance the count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Older than the tracked generation
    Stale,
    /// Tracked generation already signalled
    AlreadySignalled,
    /// Reel already counted for this generation
    Duplicate,
}

/// Result of feeding one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Counted; still waiting for more reels
    Pending { count: usize },
    /// Counted; this was the last reel
    Complete(AllReelsStopped),
    Discarded(Discard),
}

/// Per-generation completion collector
#[derive(Debug, Clone, Default)]
pub struct CompletionAggregator {
    generation: SpinGeneration,
    count: usize,
    stops: [Option<u32>; REEL_COUNT],
    signalled: bool,
}

impl CompletionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation currently tracked
    pub fn generation(&self) -> SpinGeneration {
        self.generation
    }

    /// Reels counted so far for the tracked generation
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_signalled(&self) -> bool {
        self.signalled
    }

    /// Feed one completion event
    pub fn record(&mut self, event: CompletionEvent) -> Aggregation {
        if event.generation < self.generation {
            log::debug!(
                "[Aggregator] Dropping stale completion from reel {} ({} < {})",
                event.reel,
                event.generation,
                self.generation
            );
            return Aggregation::Discarded(Discard::Stale);
        }

        if event.generation > self.generation {
            self.generation = event.generation;
            self.count = 0;
            self.stops = [None; REEL_COUNT];
            self.signalled = false;
        } else if self.signalled {
            return Aggregation::Discarded(Discard::AlreadySignalled);
        }

        let slot = &mut self.stops[event.reel.index()];
        if slot.is_some() {
            log::warn!(
                "[Aggregator] Reel {} reported twice for {}",
                event.reel,
                event.generation
            );
            return Aggregation::Discarded(Discard::Duplicate);
        }
        *slot = Some(event.stop_value);
        self.count += 1;

        if self.count < REEL_COUNT {
            return Aggregation::Pending { count: self.count };
        }

        self.signalled = true;
        let stops = self.stops.map(|s| s.unwrap_or_default());
        Aggregation::Complete(AllReelsStopped {
            generation: self.generation,
            stops,
        })
    }
}
