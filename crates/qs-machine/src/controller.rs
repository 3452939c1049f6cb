//! Spin controller: the single-spin lifecycle
//!
//! ```text
//! Idle ──request──▶ Priming ──PrimeSettled──▶ AwaitingOutcome
//!   ▲                                           │ ok        │ err
//!   │                                           ▼           │
//!   │   Settling ◀──WinReveal── Targeting ◀─────┘           │
//!   └──pipeline done──┘                                     │
//!   └───────────────────────────────────────────────────────┘
//! ```
//!
//! The controller performs no I/O and owns no clock. Each transition returns
//! the [`Effect`]s the runtime must carry out: cues to play, delays to
//! schedule, the resolver and pipeline to start, stages to publish. Every
//! message coming back is tagged with the generation it was issued for and
//! is ignored unless that generation is still live in the expected state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use qs_stage::{
    AllReelsStopped, AudioCue, PipelineReport, ReelId, SpinEnd, SpinGeneration, Stage, REEL_COUNT,
};

use crate::aggregator::{Aggregation, CompletionAggregator};
use crate::config::SpinSettings;
use crate::error::ResolutionError;
use crate::outcome::Outcome;
use crate::pipeline::PipelineFlags;
use crate::reel::{ReelBank, ReelMotion, ReelState};
use crate::timing::TimingConfig;

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    #[default]
    Idle,
    Priming,
    AwaitingOutcome,
    Targeting,
    Settling,
}

impl ControllerState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Delayed step of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledStep {
    /// Priming animation has had time to establish; ask for the outcome
    PrimeSettled,
    /// Reels have rested long enough; announce win/lose and run the pipeline
    WinReveal,
}

/// Work the runtime must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Cue {
        generation: SpinGeneration,
        cue: AudioCue,
    },
    Schedule {
        generation: SpinGeneration,
        step: ScheduledStep,
        delay: Duration,
    },
    Resolve {
        generation: SpinGeneration,
        settings: SpinSettings,
    },
    RunPipeline {
        generation: SpinGeneration,
        outcome: Outcome,
        flags: PipelineFlags,
        /// Past this the run is abandoned
        timeout: Duration,
    },
    Emit(Stage),
}

/// Answer to a spin request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinAdmission {
    Accepted(SpinGeneration),
    /// Another spin is live; nothing changed
    Busy,
}

impl SpinAdmission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Read-only view for observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub state: ControllerState,
    /// Live generation, or the last one when idle
    pub generation: SpinGeneration,
    pub reels: [ReelState; 3],
    /// How the last finished spin ended
    pub last_end: Option<SpinEnd>,
}

/// Everything that belongs to the live generation
#[derive(Debug, Clone)]
struct LiveSpin {
    settings: SpinSettings,
    outcome: Option<Outcome>,
    stopped: Option<AllReelsStopped>,
    is_winner: bool,
}

pub struct SpinController {
    state: ControllerState,
    generation: SpinGeneration,
    timing: TimingConfig,
    reels: ReelBank,
    aggregator: CompletionAggregator,
    live: Option<LiveSpin>,
    last_end: Option<SpinEnd>,
}

impl SpinController {
    pub fn new(timing: TimingConfig) -> Self {
        Self {
            state: ControllerState::Idle,
            generation: SpinGeneration::ZERO,
            reels: ReelBank::new(ReelMotion::from_timing(&timing)),
            timing,
            aggregator: CompletionAggregator::new(),
            live: None,
            last_end: None,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn generation(&self) -> SpinGeneration {
        self.generation
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn reels(&self) -> &ReelBank {
        &self.reels
    }

    /// True while any reel needs frame ticks
    pub fn is_animating(&self) -> bool {
        self.reels.any_moving()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.state,
            generation: self.generation,
            reels: self.reels.states(),
            last_end: self.last_end.clone(),
        }
    }

    /// New timing; reel motion picks it up at the next accepted spin
    pub fn set_timing(&mut self, timing: TimingConfig) {
        self.timing = timing;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TRANSITIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Try to start a spin with `settings` snapshotted for its lifetime
    pub fn request_spin(&mut self, settings: SpinSettings) -> (SpinAdmission, Vec<Effect>) {
        if !self.state.is_idle() {
            log::info!("[Controller] Busy ({:?}, {}); request ignored", self.state, self.generation);
            return (SpinAdmission::Busy, vec![Effect::Emit(Stage::SpinRejected)]);
        }

        let generation = self.generation.next();
        self.generation = generation;
        self.state = ControllerState::Priming;
        self.reels.set_motion(ReelMotion::from_timing(&self.timing));
        self.reels.prime_all();
        self.live = Some(LiveSpin {
            settings,
            outcome: None,
            stopped: None,
            is_winner: false,
        });

        log::info!("[Controller] {} accepted", generation);
        let effects = vec![
            Effect::Emit(Stage::SpinAccepted { generation }),
            Effect::Cue {
                generation,
                cue: AudioCue::Lever,
            },
            Effect::Schedule {
                generation,
                step: ScheduledStep::PrimeSettled,
                delay: self.timing.prime_settle(),
            },
        ];
        (SpinAdmission::Accepted(generation), effects)
    }

    /// A scheduled delay elapsed
    pub fn on_timer(&mut self, generation: SpinGeneration, step: ScheduledStep) -> Vec<Effect> {
        if generation != self.generation {
            log::debug!("[Controller] Stale {:?} timer for {}", step, generation);
            return Vec::new();
        }

        match (step, self.state) {
            (ScheduledStep::PrimeSettled, ControllerState::Priming) => self.await_outcome(),
            (ScheduledStep::WinReveal, ControllerState::Targeting) => self.reveal(),
            (step, state) => {
                log::debug!("[Controller] {:?} timer ignored in {:?}", step, state);
                Vec::new()
            }
        }
    }

    /// The resolver answered
    pub fn on_resolved(
        &mut self,
        generation: SpinGeneration,
        result: Result<Outcome, ResolutionError>,
    ) -> Vec<Effect> {
        if generation != self.generation || self.state != ControllerState::AwaitingOutcome {
            log::debug!("[Controller] Dropping late outcome for {}", generation);
            return Vec::new();
        }

        match result {
            Ok(outcome) => self.target(outcome),
            Err(error) => self.abort(error),
        }
    }

    /// Advance the reels one frame
    pub fn tick(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for completion in self.reels.tick() {
            effects.push(Effect::Emit(Stage::ReelStopped(completion)));
            effects.push(Effect::Cue {
                generation: completion.generation,
                cue: AudioCue::ReelClick {
                    reel: completion.reel,
                },
            });

            match self.aggregator.record(completion) {
                Aggregation::Complete(signal) => effects.extend(self.all_stopped(signal)),
                Aggregation::Pending { .. } | Aggregation::Discarded(_) => {}
            }
        }
        effects
    }

    /// The pipeline for `generation` finished
    pub fn on_pipeline_finished(
        &mut self,
        generation: SpinGeneration,
        report: PipelineReport,
    ) -> Vec<Effect> {
        if generation != self.generation || self.state != ControllerState::Settling {
            log::debug!("[Controller] Dropping pipeline report for {}", generation);
            return Vec::new();
        }

        let live = self.live.take();
        let end = SpinEnd::Settled {
            stops: live
                .as_ref()
                .and_then(|l| l.stopped)
                .map_or([0; REEL_COUNT], |s| s.stops),
            is_winner: live.is_some_and(|l| l.is_winner),
        };
        self.state = ControllerState::Idle;
        self.last_end = Some(end.clone());
        log::info!("[Controller] {} finished", generation);

        vec![
            Effect::Emit(Stage::PipelineReported { generation, report }),
            Effect::Emit(Stage::SpinFinished { generation, end }),
        ]
    }

    // ═══════════════════════════════════════════════════════════════════════
    // INTERNAL STEPS
    // ═══════════════════════════════════════════════════════════════════════

    fn await_outcome(&mut self) -> Vec<Effect> {
        let Some(live) = &self.live else {
            return Vec::new();
        };
        self.state = ControllerState::AwaitingOutcome;
        vec![Effect::Resolve {
            generation: self.generation,
            settings: live.settings.clone(),
        }]
    }

    fn target(&mut self, outcome: Outcome) -> Vec<Effect> {
        let generation = self.generation;
        for (reel, stop) in ReelId::ALL.into_iter().zip(outcome.stops) {
            self.reels.reel_mut(reel).assign_target(stop, generation);
        }
        self.state = ControllerState::Targeting;
        log::info!("[Controller] {} targeting {:?}", generation, outcome.stops);

        let stops = outcome.stops;
        if let Some(live) = &mut self.live {
            live.outcome = Some(outcome);
        }
        vec![Effect::Emit(Stage::OutcomeResolved { generation, stops })]
    }

    fn abort(&mut self, error: ResolutionError) -> Vec<Effect> {
        let generation = self.generation;
        log::error!("[Controller] {} resolution failed: {}", generation, error);

        self.reels.halt_all();
        self.live = None;
        self.state = ControllerState::Idle;

        let reason = error.to_string();
        let end = SpinEnd::ResolutionFailed {
            reason: reason.clone(),
        };
        self.last_end = Some(end.clone());
        vec![
            Effect::Emit(Stage::ResolutionFailed { generation, reason }),
            Effect::Emit(Stage::SpinFinished { generation, end }),
        ]
    }

    fn all_stopped(&mut self, signal: AllReelsStopped) -> Vec<Effect> {
        if signal.generation != self.generation || self.state != ControllerState::Targeting {
            return Vec::new();
        }
        let Some(live) = &mut self.live else {
            return Vec::new();
        };

        live.is_winner = live
            .outcome
            .as_ref()
            .is_some_and(|outcome| outcome.settle(&signal));
        live.stopped = Some(signal);
        log::info!("[Controller] {} all reels stopped at {:?}", signal.generation, signal.stops);

        vec![
            Effect::Emit(Stage::AllReelsStopped(signal)),
            Effect::Schedule {
                generation: signal.generation,
                step: ScheduledStep::WinReveal,
                delay: self.timing.win_reveal(),
            },
        ]
    }

    fn reveal(&mut self) -> Vec<Effect> {
        let generation = self.generation;
        let Some(live) = &self.live else {
            return Vec::new();
        };
        let (Some(outcome), Some(_)) = (live.outcome.clone(), live.stopped) else {
            log::debug!("[Controller] {} reveal before all reels stopped", generation);
            return Vec::new();
        };

        let is_winner = live.is_winner;
        let flags = live.settings.pipeline;
        let timeout = live.settings.pipeline_timeout();
        self.state = ControllerState::Settling;
        log::info!(
            "[Controller] {} settled: {}",
            generation,
            if is_winner { "WIN" } else { "no win" }
        );

        vec![
            Effect::Cue {
                generation,
                cue: if is_winner { AudioCue::Win } else { AudioCue::Lose },
            },
            Effect::Emit(Stage::Settled {
                generation,
                is_winner,
            }),
            Effect::RunPipeline {
                generation,
                outcome,
                flags,
                timeout,
            },
        ]
    }
}

impl Default for SpinController {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}
