//! Stage: the semantic moments of a spin
//!
//! A Stage is not an animation frame. It is what an observer (log, audio,
//! receipt, test) needs to know happened.

use serde::{Deserialize, Serialize};

use crate::event::{AllReelsStopped, CompletionEvent};
use crate::generation::{ReelId, SpinGeneration, REEL_COUNT};
use crate::report::PipelineReport;

/// Side-effect-only sound cues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AudioCue {
    /// Lever pulled, spin accepted
    Lever,
    /// A reel landed on its stop
    ReelClick { reel: ReelId },
    /// Settled outcome is a winner
    Win,
    /// Settled outcome is not a winner
    Lose,
}

impl AudioCue {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lever => "lever",
            Self::ReelClick { .. } => "clicker",
            Self::Win => "win",
            Self::Lose => "lose",
        }
    }
}

/// How a spin left the live state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum SpinEnd {
    /// Reels landed and the pipeline ran
    Settled {
        stops: [u32; REEL_COUNT],
        is_winner: bool,
    },
    /// The outcome could not be obtained
    ResolutionFailed { reason: String },
}

impl SpinEnd {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. })
    }
}

/// Canonical spin stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // ADMISSION
    // ═══════════════════════════════════════════════════════════════════════
    /// Spin accepted, reels priming
    SpinAccepted { generation: SpinGeneration },

    /// Spin requested while another one was live
    SpinRejected,

    // ═══════════════════════════════════════════════════════════════════════
    // OUTCOME
    // ═══════════════════════════════════════════════════════════════════════
    /// Outcome obtained, reels aimed
    OutcomeResolved {
        generation: SpinGeneration,
        stops: [u32; REEL_COUNT],
    },

    /// Outcome could not be obtained; generation discarded
    ResolutionFailed {
        generation: SpinGeneration,
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // REELS
    // ═══════════════════════════════════════════════════════════════════════
    /// One reel committed its stop
    ReelStopped(CompletionEvent),

    /// All three reels stopped for a generation
    AllReelsStopped(AllReelsStopped),

    // ═══════════════════════════════════════════════════════════════════════
    // SETTLEMENT
    // ═══════════════════════════════════════════════════════════════════════
    /// Sound cue fired
    Cue {
        generation: SpinGeneration,
        cue: AudioCue,
    },

    /// Win flag confirmed, pipeline starting
    Settled {
        generation: SpinGeneration,
        is_winner: bool,
    },

    /// Pipeline finished (possibly with task failures)
    PipelineReported {
        generation: SpinGeneration,
        report: PipelineReport,
    },

    /// Controller is idle again
    SpinFinished {
        generation: SpinGeneration,
        end: SpinEnd,
    },
}

impl Stage {
    /// Generation this stage belongs to (`None` for rejections)
    pub fn generation(&self) -> Option<SpinGeneration> {
        match self {
            Self::SpinRejected => None,
            Self::SpinAccepted { generation }
            | Self::OutcomeResolved { generation, .. }
            | Self::ResolutionFailed { generation, .. }
            | Self::Cue { generation, .. }
            | Self::Settled { generation, .. }
            | Self::PipelineReported { generation, .. }
            | Self::SpinFinished { generation, .. } => Some(*generation),
            Self::ReelStopped(event) => Some(event.generation),
            Self::AllReelsStopped(signal) => Some(signal.generation),
        }
    }

    /// Stable snake_case name, matches the serde tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SpinAccepted { .. } => "spin_accepted",
            Self::SpinRejected => "spin_rejected",
            Self::OutcomeResolved { .. } => "outcome_resolved",
            Self::ResolutionFailed { .. } => "resolution_failed",
            Self::ReelStopped(_) => "reel_stopped",
            Self::AllReelsStopped(_) => "all_reels_stopped",
            Self::Cue { .. } => "cue",
            Self::Settled { .. } => "settled",
            Self::PipelineReported { .. } => "pipeline_reported",
            Self::SpinFinished { .. } => "spin_finished",
        }
    }

    /// Is this the last stage of a generation?
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SpinFinished { .. })
    }
}
