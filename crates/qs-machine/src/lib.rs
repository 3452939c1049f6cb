//! # qs-machine: QuoteSlot spin machine
//!
//! Arbitrates one spin at a time, animates three reels toward their stops,
//! resolves the outcome (local sampler or remote oracle) and fans out the
//! post-spin side effects with isolated failures.
//!
//! ## Architecture
//!
//! ```text
//! SpinHandle ──commands──▶ MachineRuntime (tokio task)
//!                              │
//!                              ├── SpinController (sans-IO state machine)
//!                              │     ├── ReelBank ×3 ReelAnimator
//!                              │     └── CompletionAggregator
//!                              │
//!                              ├── OutcomeSource   (spawned, with timeout)
//!                              ├── PostSpinPipeline (spawned)
//!                              └── AudioCueBus
//!                              │
//!                              ▼
//!              watch<ControllerSnapshot> + broadcast<SpinEvent>
//! ```

pub mod aggregator;
pub mod config;
pub mod controller;
pub mod cues;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod reel;
pub mod resolver;
pub mod runtime;
pub mod timing;

pub use aggregator::*;
pub use config::*;
pub use controller::*;
pub use cues::*;
pub use error::*;
pub use outcome::*;
pub use pipeline::*;
pub use reel::*;
pub use resolver::*;
pub use runtime::*;
pub use timing::*;

pub use qs_stage;
