//! Machine runtime: drives the controller on a tokio task
//!
//! One task owns the [`SpinController`]. It multiplexes three inputs:
//! commands from [`SpinHandle`]s, messages from the timer/resolver/pipeline
//! tasks it spawned, and the frame clock (polled only while a reel moves).
//! Observers read the latest [`ControllerSnapshot`] through a watch channel
//! and the [`SpinEvent`] stream through a broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use qs_stage::{PipelineReport, SpinEnd, SpinEvent, SpinGeneration, SpinTrace, Stage};

use crate::config::{MachineConfig, SpinSettings};
use crate::controller::{ControllerSnapshot, Effect, ScheduledStep, SpinAdmission, SpinController};
use crate::cues::AudioCueBus;
use crate::error::{ResolutionError, RuntimeError};
use crate::outcome::Outcome;
use crate::pipeline::{PipelineFlags, PostSpinPipeline};
use crate::resolver::OutcomeSource;
use crate::timing::TimingConfig;

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

// ═══════════════════════════════════════════════════════════════════════════════
// PUBLIC API
// ═══════════════════════════════════════════════════════════════════════════════

/// Answer to [`SpinHandle::request_spin`]
#[derive(Debug)]
pub enum SpinRequest {
    Accepted(SpinTicket),
    Busy,
}

impl SpinRequest {
    pub fn admission(&self) -> SpinAdmission {
        match self {
            Self::Accepted(ticket) => SpinAdmission::Accepted(ticket.generation()),
            Self::Busy => SpinAdmission::Busy,
        }
    }
}

/// Claim on the result of an accepted spin
#[derive(Debug)]
pub struct SpinTicket {
    generation: SpinGeneration,
    finished: oneshot::Receiver<SpinSummary>,
}

impl SpinTicket {
    pub fn generation(&self) -> SpinGeneration {
        self.generation
    }

    /// Wait until the machine is idle again after this spin
    pub async fn finished(self) -> Result<SpinSummary, RuntimeError> {
        self.finished.await.map_err(|_| RuntimeError::Shutdown)
    }
}

/// How one spin went, delivered when the controller returns to idle
#[derive(Debug, Clone)]
pub struct SpinSummary {
    pub generation: SpinGeneration,
    pub end: SpinEnd,
    /// Present when the spin settled and the pipeline ran
    pub report: Option<PipelineReport>,
    pub trace: SpinTrace,
}

impl SpinSummary {
    pub fn is_winner(&self) -> bool {
        matches!(self.end, SpinEnd::Settled { is_winner: true, .. })
    }
}

/// Cloneable handle to a running machine
#[derive(Clone)]
pub struct SpinHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<ControllerSnapshot>,
    events: broadcast::Sender<SpinEvent>,
}

impl SpinHandle {
    /// Pull the lever. `Busy` is an ordinary answer, not an error.
    pub async fn request_spin(&self) -> Result<SpinRequest, RuntimeError> {
        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Spin { reply })
            .await
            .map_err(|_| RuntimeError::Shutdown)?;
        answer.await.map_err(|_| RuntimeError::Shutdown)
    }

    /// Replace settings and timing; takes effect from the next spin.
    /// Invalid values are refused here and never reach the machine.
    pub async fn configure(
        &self,
        settings: SpinSettings,
        timing: TimingConfig,
    ) -> Result<(), RuntimeError> {
        timing.validate()?;
        settings.validate()?;
        self.commands
            .send(Command::Configure { settings, timing })
            .await
            .map_err(|_| RuntimeError::Shutdown)
    }

    /// Swap the post-spin pipeline and cue bus. A pipeline already running
    /// finishes with the collaborators it started with.
    pub async fn replace_collaborators(
        &self,
        pipeline: PostSpinPipeline,
        cues: AudioCueBus,
    ) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Collaborators { pipeline, cues })
            .await
            .map_err(|_| RuntimeError::Shutdown)
    }

    /// Latest controller snapshot
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpinEvent> {
        self.events.subscribe()
    }

    /// Resolve once the controller reports idle
    pub async fn wait_idle(&self) -> Result<ControllerSnapshot, RuntimeError> {
        let mut watch = self.snapshot.clone();
        let snapshot = watch
            .wait_for(|s| s.state.is_idle())
            .await
            .map_err(|_| RuntimeError::Shutdown)?
            .clone();
        Ok(snapshot)
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Stop the runtime and wait for its task to exit
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
        self.commands.closed().await;
    }
}

/// A machine ready to be spawned
pub struct MachineRuntime {
    controller: SpinController,
    settings: SpinSettings,
    source: Arc<dyn OutcomeSource>,
    pipeline: Arc<PostSpinPipeline>,
    cues: AudioCueBus,
}

impl MachineRuntime {
    pub fn new(settings: SpinSettings, timing: TimingConfig, source: Arc<dyn OutcomeSource>) -> Self {
        Self {
            controller: SpinController::new(timing),
            settings,
            source,
            pipeline: Arc::new(PostSpinPipeline::new()),
            cues: AudioCueBus::new(),
        }
    }

    pub fn from_config(config: &MachineConfig, source: Arc<dyn OutcomeSource>) -> Self {
        Self::new(config.spin_settings(), config.timing.clone(), source)
    }

    pub fn with_pipeline(mut self, pipeline: PostSpinPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub fn with_cues(mut self, cues: AudioCueBus) -> Self {
        self.cues = cues;
        self
    }

    /// Start the machine task on the current tokio runtime
    pub fn spawn(self) -> Result<SpinHandle, RuntimeError> {
        self.controller.timing().validate()?;
        self.settings.validate()?;

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(self.controller.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = Actor {
            frames: frame_clock(self.controller.timing()),
            controller: self.controller,
            settings: self.settings,
            source: self.source,
            pipeline: self.pipeline,
            cues: self.cues,
            internal_tx,
            snapshot_tx,
            event_tx: event_tx.clone(),
            started: Instant::now(),
            live: None,
        };
        tokio::spawn(actor.run(command_rx, internal_rx));

        Ok(SpinHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
            events: event_tx,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTOR
// ═══════════════════════════════════════════════════════════════════════════════

enum Command {
    Spin {
        reply: oneshot::Sender<SpinRequest>,
    },
    Configure {
        settings: SpinSettings,
        timing: TimingConfig,
    },
    Collaborators {
        pipeline: PostSpinPipeline,
        cues: AudioCueBus,
    },
    Shutdown,
}

/// Messages from tasks the actor spawned, tagged with their generation
enum Internal {
    Timer {
        generation: SpinGeneration,
        step: ScheduledStep,
    },
    Resolved {
        generation: SpinGeneration,
        result: Result<Outcome, ResolutionError>,
    },
    PipelineDone {
        generation: SpinGeneration,
        report: PipelineReport,
    },
}

/// Trace and reply slot for the live spin
struct LiveTrace {
    trace: SpinTrace,
    report: Option<PipelineReport>,
    reply: oneshot::Sender<SpinSummary>,
}

struct Actor {
    controller: SpinController,
    settings: SpinSettings,
    source: Arc<dyn OutcomeSource>,
    pipeline: Arc<PostSpinPipeline>,
    cues: AudioCueBus,
    frames: Interval,
    internal_tx: mpsc::UnboundedSender<Internal>,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    event_tx: broadcast::Sender<SpinEvent>,
    started: Instant,
    live: Option<LiveTrace>,
}

impl Actor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        log::info!("[Runtime] Machine started ({:?} mode)", self.settings.mode);

        loop {
            let animating = self.controller.is_animating();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Spin { reply }) => {
                        let request = self.request_spin();
                        let _ = reply.send(request);
                    }
                    Some(Command::Configure { settings, timing }) => self.configure(settings, timing),
                    Some(Command::Collaborators { pipeline, cues }) => {
                        log::info!("[Runtime] Pipeline and cue bus replaced");
                        self.pipeline = Arc::new(pipeline);
                        self.cues = cues;
                    }
                    Some(Command::Shutdown) | None => break,
                },

                Some(message) = internal.recv() => {
                    let effects = match message {
                        Internal::Timer { generation, step } => {
                            self.controller.on_timer(generation, step)
                        }
                        Internal::Resolved { generation, result } => {
                            self.controller.on_resolved(generation, result)
                        }
                        Internal::PipelineDone { generation, report } => {
                            self.controller.on_pipeline_finished(generation, report)
                        }
                    };
                    self.apply(effects);
                }

                _ = self.frames.tick(), if animating => {
                    let effects = self.controller.tick();
                    self.apply(effects);
                }
            }
            self.publish_snapshot();
        }

        log::info!("[Runtime] Machine stopped at {}", self.controller.generation());
    }

    fn request_spin(&mut self) -> SpinRequest {
        let (admission, effects) = self.controller.request_spin(self.settings.clone());
        let request = match admission {
            SpinAdmission::Accepted(generation) => {
                let (reply, finished) = oneshot::channel();
                self.live = Some(LiveTrace {
                    trace: SpinTrace::new(generation),
                    report: None,
                    reply,
                });
                SpinRequest::Accepted(SpinTicket {
                    generation,
                    finished,
                })
            }
            SpinAdmission::Busy => SpinRequest::Busy,
        };
        self.apply(effects);
        request
    }

    fn configure(&mut self, settings: SpinSettings, timing: TimingConfig) {
        if timing.frame_interval_ms != self.controller.timing().frame_interval_ms {
            self.frames = frame_clock(&timing);
        }
        log::info!(
            "[Runtime] Settings updated ({:?} mode, {:?} timing)",
            settings.mode,
            timing.profile
        );
        self.settings = settings;
        self.controller.set_timing(timing);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(stage) => self.emit(stage),
                Effect::Cue { generation, cue } => {
                    self.cues.emit(cue);
                    self.emit(Stage::Cue { generation, cue });
                }
                Effect::Schedule {
                    generation,
                    step,
                    delay,
                } => self.schedule(generation, step, delay),
                Effect::Resolve {
                    generation,
                    settings,
                } => self.spawn_resolve(generation, settings),
                Effect::RunPipeline {
                    generation,
                    outcome,
                    flags,
                    timeout,
                } => self.spawn_pipeline(generation, outcome, flags, timeout),
            }
        }
    }

    fn emit(&mut self, stage: Stage) {
        let timestamp_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let event = SpinEvent::new(stage, timestamp_ms);
        log::debug!("[Runtime] {} {:?}", event.type_name(), event.generation());

        let mut finished = None;
        if let Some(live) = &mut self.live {
            if live.trace.push(event.clone()) {
                match &event.stage {
                    Stage::PipelineReported { report, .. } => live.report = Some(report.clone()),
                    Stage::SpinFinished { generation, end } => {
                        finished = Some((*generation, end.clone()));
                    }
                    _ => {}
                }
            }
        }

        // no subscribers is fine
        let _ = self.event_tx.send(event);

        if let Some((generation, end)) = finished {
            self.finish(generation, end);
        }
    }

    fn finish(&mut self, generation: SpinGeneration, end: SpinEnd) {
        let Some(live) = self.live.take() else {
            return;
        };
        let summary = SpinSummary {
            generation,
            end,
            report: live.report,
            trace: live.trace,
        };
        if live.reply.send(summary).is_err() {
            log::debug!("[Runtime] Nobody waiting on {}", generation);
        }
    }

    fn schedule(&self, generation: SpinGeneration, step: ScheduledStep, delay: Duration) {
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::Timer { generation, step });
        });
    }

    fn spawn_resolve(&self, generation: SpinGeneration, settings: SpinSettings) {
        let source = Arc::clone(&self.source);
        let tx = self.internal_tx.clone();
        let timeout_ms = settings.resolve_timeout_ms;

        tokio::spawn(async move {
            let attempt = tokio::spawn(async move {
                let limit = Duration::from_millis(timeout_ms);
                tokio::time::timeout(limit, source.resolve(&settings)).await
            });
            let result = match attempt.await {
                Ok(Ok(result)) => result,
                Ok(Err(_elapsed)) => Err(ResolutionError::Timeout(timeout_ms)),
                Err(e) => Err(ResolutionError::Aborted(e.to_string())),
            };
            let _ = tx.send(Internal::Resolved { generation, result });
        });
    }

    fn spawn_pipeline(
        &self,
        generation: SpinGeneration,
        outcome: Outcome,
        flags: PipelineFlags,
        timeout: Duration,
    ) {
        let pipeline = Arc::clone(&self.pipeline);
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let checksum = outcome.checksum();
            let run = tokio::spawn(async move { pipeline.run(&outcome, flags).await });
            let abort = run.abort_handle();
            let report = match tokio::time::timeout(timeout, run).await {
                Ok(Ok(report)) => report,
                Err(_elapsed) => {
                    abort.abort();
                    log::warn!(
                        "[Runtime] Pipeline for {} gave up after {} ms",
                        generation,
                        timeout.as_millis()
                    );
                    PipelineReport::aborted(checksum, "timed out")
                }
                Ok(Err(e)) => {
                    log::error!("[Runtime] Pipeline task for {} died: {}", generation, e);
                    PipelineReport::aborted(checksum, &e.to_string())
                }
            };
            let _ = tx.send(Internal::PipelineDone { generation, report });
        });
    }

    fn publish_snapshot(&self) {
        let next = self.controller.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn frame_clock(timing: &TimingConfig) -> Interval {
    let mut interval = tokio::time::interval(timing.frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
