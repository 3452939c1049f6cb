//! SpinTrace: the recorded timeline of one generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{CompletionEvent, SpinEvent};
use crate::generation::{SpinGeneration, REEL_COUNT};
use crate::stage::{AudioCue, SpinEnd, Stage};

/// Every event observed for one spin attempt, in arrival order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinTrace {
    pub generation: SpinGeneration,

    pub events: Vec<SpinEvent>,

    /// When recording began
    pub recorded_at: DateTime<Utc>,
}

impl SpinTrace {
    pub fn new(generation: SpinGeneration) -> Self {
        Self {
            generation,
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Record an event; events from other generations are ignored
    pub fn push(&mut self, event: SpinEvent) -> bool {
        if event.generation() != Some(self.generation) {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Milliseconds between the first and last event
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.type_name() == type_name)
    }

    /// Reel completion events in arrival order
    pub fn completions(&self) -> Vec<CompletionEvent> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::ReelStopped(completion) => Some(*completion),
                _ => None,
            })
            .collect()
    }

    /// Cues fired in order
    pub fn cues(&self) -> Vec<AudioCue> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::Cue { cue, .. } => Some(*cue),
                _ => None,
            })
            .collect()
    }

    /// How the spin ended, once finished
    pub fn end(&self) -> Option<&SpinEnd> {
        self.events.iter().rev().find_map(|e| match &e.stage {
            Stage::SpinFinished { end, .. } => Some(end),
            _ => None,
        })
    }

    /// Stage type names in order (handy for log lines and assertions)
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.type_name()).collect()
    }

    /// Check the trace for structural completeness
    pub fn validate(&self) -> TraceValidation {
        let reel_stops = self.completions().len();
        let all_stopped = self
            .events
            .iter()
            .filter(|e| matches!(e.stage, Stage::AllReelsStopped(_)))
            .count();

        TraceValidation {
            has_acceptance: self.has_stage("spin_accepted"),
            reel_stops,
            all_stopped_signals: all_stopped,
            has_finish: self.end().is_some(),
        }
    }
}

/// Result of [`SpinTrace::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceValidation {
    pub has_acceptance: bool,
    pub reel_stops: usize,
    pub all_stopped_signals: usize,
    pub has_finish: bool,
}

impl TraceValidation {
    /// A settled spin: accepted, every reel stopped once, one join signal, finished
    pub fn is_complete_settlement(&self) -> bool {
        self.has_acceptance
            && self.reel_stops == REEL_COUNT
            && self.all_stopped_signals == 1
            && self.has_finish
    }
}
