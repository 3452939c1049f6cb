//! # qs-stage: QuoteSlot Stage System
//!
//! Defines the vocabulary every part of the machine speaks: spin generations,
//! reel identifiers, completion events, audio cues and the observable
//! [`SpinEvent`] stream.
//!
//! ## Spin flow
//!
//! ```text
//! SpinAccepted → Cue(Lever) → OutcomeResolved
//!     → ReelStopped ×3 → AllReelsStopped → Cue(Win|Lose)
//!     → PipelineReported → SpinFinished
//! ```
//!
//! A [`SpinTrace`] captures that timeline for one generation.

pub mod event;
pub mod generation;
pub mod report;
pub mod stage;
pub mod trace;

pub use event::*;
pub use generation::*;
pub use report::*;
pub use stage::*;
pub use trace::*;
