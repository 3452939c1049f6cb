//! Reel animator: incremental rotation toward a commanded stop
//!
//! Each reel is ticked by the shared frame clock. A free-spinning reel turns
//! forever; a targeted reel turns until its accumulated angle reaches the
//! target, clamps there and reports exactly one [`CompletionEvent`].

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use qs_stage::{CompletionEvent, ReelId, SpinGeneration};

use crate::timing::TimingConfig;

/// Reel animation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReelPhase {
    Idle,
    FreeSpinning,
    Targeting,
    Stopped,
}

/// Observable reel state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelState {
    pub id: ReelId,
    /// Stop the reel is currently aimed at
    pub stop_target: Option<u32>,
    pub free_spinning: bool,
}

/// Motion parameters shared by all reels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReelMotion {
    pub rotation_per_frame: f64,
    pub segments: u32,
    pub lead_in_segments: u32,
    pub stagger_segments: u32,
}

impl ReelMotion {
    pub fn from_timing(timing: &TimingConfig) -> Self {
        Self {
            rotation_per_frame: timing.rotation_per_frame,
            segments: timing.segments.max(1),
            lead_in_segments: timing.lead_in_segments,
            stagger_segments: timing.stagger_segments,
        }
    }

    pub fn segment_angle(&self) -> f64 {
        TAU / self.segments as f64
    }
}

/// Per-reel rotation state machine
#[derive(Debug, Clone)]
pub struct ReelAnimator {
    id: ReelId,
    phase: ReelPhase,
    motion: ReelMotion,
    /// Accumulated rotation (radians)
    angle: f64,
    target_angle: f64,
    stop_target: Option<u32>,
    generation: SpinGeneration,
}

impl ReelAnimator {
    pub fn new(id: ReelId, motion: ReelMotion) -> Self {
        Self {
            id,
            phase: ReelPhase::Idle,
            motion,
            angle: 0.0,
            target_angle: 0.0,
            stop_target: None,
            generation: SpinGeneration::ZERO,
        }
    }

    pub fn id(&self) -> ReelId {
        self.id
    }

    pub fn phase(&self) -> ReelPhase {
        self.phase
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Stop position currently shown, in segments
    pub fn visible_segment(&self) -> u32 {
        let segment = self.motion.segment_angle();
        ((self.angle.rem_euclid(TAU) / segment).round() as u32) % self.motion.segments
    }

    pub fn is_moving(&self) -> bool {
        matches!(self.phase, ReelPhase::FreeSpinning | ReelPhase::Targeting)
    }

    pub fn state(&self) -> ReelState {
        ReelState {
            id: self.id,
            stop_target: self.stop_target,
            free_spinning: self.phase == ReelPhase::FreeSpinning,
        }
    }

    /// Swap motion parameters (applies from the next prime)
    pub fn set_motion(&mut self, motion: ReelMotion) {
        self.motion = motion;
    }

    /// Start turning without a target.
    ///
    /// The accumulated angle is folded back into one turn so it stays small
    /// across spins; the visible position does not change.
    pub fn prime_free_spin(&mut self) {
        if self.phase == ReelPhase::Targeting {
            log::warn!("[Reel {}] Primed while targeting; dropping target", self.id);
        }
        self.angle = self.angle.rem_euclid(TAU);
        self.stop_target = None;
        self.phase = ReelPhase::FreeSpinning;
    }

    /// Aim at `stop_index` for `generation`.
    ///
    /// The target is the first angle at least `lead_in + stagger × reel`
    /// segments past the current angle whose position within a turn is
    /// `stop_index` segments. Works from any phase; a second call before
    /// completion overwrites the first.
    pub fn assign_target(&mut self, stop_index: u32, generation: SpinGeneration) {
        let segment = self.motion.segment_angle();
        let travel = self.motion.lead_in_segments as f64
            + self.motion.stagger_segments as f64 * self.id.index() as f64;
        let earliest = self.angle + travel * segment;
        let residue = (stop_index % self.motion.segments) as f64 * segment;

        self.target_angle = earliest + (residue - earliest).rem_euclid(TAU);
        self.stop_target = Some(stop_index);
        self.generation = generation;
        self.phase = ReelPhase::Targeting;
    }

    /// Stop free-spinning without reporting (abandoned spin)
    pub fn halt(&mut self) {
        self.stop_target = None;
        self.phase = ReelPhase::Idle;
    }

    /// Advance one frame; returns the completion event on arrival
    pub fn tick(&mut self) -> Option<CompletionEvent> {
        match self.phase {
            ReelPhase::FreeSpinning => {
                self.angle += self.motion.rotation_per_frame;
                None
            }
            ReelPhase::Targeting => {
                self.angle += self.motion.rotation_per_frame;
                if self.angle < self.target_angle {
                    return None;
                }
                self.angle = self.target_angle;
                self.phase = ReelPhase::Stopped;
                let stop_value = self.stop_target.take()?;
                Some(CompletionEvent {
                    reel: self.id,
                    generation: self.generation,
                    stop_value,
                })
            }
            ReelPhase::Idle | ReelPhase::Stopped => None,
        }
    }
}

/// The three reels, ticked together
#[derive(Debug, Clone)]
pub struct ReelBank {
    reels: [ReelAnimator; 3],
}

impl ReelBank {
    pub fn new(motion: ReelMotion) -> Self {
        Self {
            reels: ReelId::ALL.map(|id| ReelAnimator::new(id, motion)),
        }
    }

    pub fn reels(&self) -> &[ReelAnimator; 3] {
        &self.reels
    }

    pub fn reel_mut(&mut self, id: ReelId) -> &mut ReelAnimator {
        &mut self.reels[id.index()]
    }

    pub fn states(&self) -> [ReelState; 3] {
        [
            self.reels[0].state(),
            self.reels[1].state(),
            self.reels[2].state(),
        ]
    }

    pub fn any_moving(&self) -> bool {
        self.reels.iter().any(ReelAnimator::is_moving)
    }

    pub fn set_motion(&mut self, motion: ReelMotion) {
        self.reels.iter_mut().for_each(|r| r.set_motion(motion));
    }

    pub fn prime_all(&mut self) {
        self.reels.iter_mut().for_each(ReelAnimator::prime_free_spin);
    }

    pub fn halt_all(&mut self) {
        self.reels.iter_mut().for_each(ReelAnimator::halt);
    }

    /// Advance every reel one frame, collecting arrivals in reel order
    pub fn tick(&mut self) -> Vec<CompletionEvent> {
        self.reels.iter_mut().filter_map(ReelAnimator::tick).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> ReelMotion {
        ReelMotion::from_timing(&TimingConfig::normal())
    }

    fn run_to_completion(reel: &mut ReelAnimator, max_frames: usize) -> Vec<CompletionEvent> {
        (0..max_frames).filter_map(|_| reel.tick()).collect()
    }

    #[test]
    fn test_free_spin_never_completes() {
        let mut reel = ReelAnimator::new(ReelId::ALL[0], motion());
        reel.prime_free_spin();
        assert!(reel.state().free_spinning);

        let events = run_to_completion(&mut reel, 10_000);
        assert!(events.is_empty());
        assert!(reel.angle() > 1000.0);
    }

    #[test]
    fn test_idle_reel_does_not_move() {
        let mut reel = ReelAnimator::new(ReelId::ALL[0], motion());
        assert!(reel.tick().is_none());
        assert_eq!(reel.angle(), 0.0);
    }

    #[test]
    fn test_exactly_one_completion_per_target() {
        let mut reel = ReelAnimator::new(ReelId::ALL[1], motion());
        reel.prime_free_spin();
        for _ in 0..37 {
            reel.tick();
        }
        reel.assign_target(5, SpinGeneration(4));
        assert!(!reel.state().free_spinning);
        assert_eq!(reel.state().stop_target, Some(5));

        let events = run_to_completion(&mut reel, 2_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reel, ReelId::ALL[1]);
        assert_eq!(events[0].generation, SpinGeneration(4));
        assert_eq!(events[0].stop_value, 5);
        assert_eq!(reel.phase(), ReelPhase::Stopped);
        assert_eq!(reel.state().stop_target, None);
    }

    #[test]
    fn test_lands_on_commanded_segment() {
        for stop in 0..16 {
            let mut reel = ReelAnimator::new(ReelId::ALL[2], motion());
            reel.prime_free_spin();
            for _ in 0..(stop * 3 + 1) {
                reel.tick();
            }
            reel.assign_target(stop, SpinGeneration(1));
            run_to_completion(&mut reel, 2_000);
            assert_eq!(reel.visible_segment(), stop % 8, "stop {}", stop);
        }
    }

    #[test]
    fn test_target_from_idle_uses_current_angle() {
        let mut reel = ReelAnimator::new(ReelId::ALL[0], motion());
        reel.prime_free_spin();
        for _ in 0..10 {
            reel.tick();
        }
        reel.halt();
        let resting = reel.angle();

        reel.assign_target(3, SpinGeneration(2));
        let events = run_to_completion(&mut reel, 2_000);
        assert_eq!(events.len(), 1);

        let lead = 15.0 * motion().segment_angle();
        assert!(reel.angle() >= resting + lead);
        assert!(reel.angle() < resting + lead + TAU);
        assert_eq!(reel.visible_segment(), 3);
    }

    #[test]
    fn test_reassign_overwrites_target() {
        let mut reel = ReelAnimator::new(ReelId::ALL[0], motion());
        reel.prime_free_spin();
        reel.assign_target(1, SpinGeneration(1));
        reel.assign_target(6, SpinGeneration(1));

        let events = run_to_completion(&mut reel, 2_000);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].stop_value, 6);
    }

    #[test]
    fn test_stagger_lands_reels_in_order() {
        let timing = TimingConfig::normal();
        let mut bank = ReelBank::new(ReelMotion::from_timing(&timing));
        bank.prime_all();
        for id in ReelId::ALL {
            bank.reel_mut(id).assign_target(4, SpinGeneration(9));
        }

        let mut arrivals = Vec::new();
        for frame in 0..2_000u64 {
            for event in bank.tick() {
                arrivals.push((frame, event.reel));
            }
        }
        assert_eq!(arrivals.len(), 3);
        assert!(arrivals[0].0 < arrivals[1].0);
        assert!(arrivals[1].0 < arrivals[2].0);
        assert_eq!(
            arrivals.iter().map(|(_, r)| *r).collect::<Vec<_>>(),
            ReelId::ALL.to_vec()
        );
        assert!(arrivals[2].0 < timing.max_landing_frames(2));
        assert!(!bank.any_moving());
    }

    #[test]
    fn test_prime_after_stop_restarts() {
        let mut reel = ReelAnimator::new(ReelId::ALL[0], motion());
        reel.assign_target(2, SpinGeneration(1));
        run_to_completion(&mut reel, 2_000);
        assert_eq!(reel.phase(), ReelPhase::Stopped);

        let shown = reel.visible_segment();
        reel.prime_free_spin();
        assert_eq!(reel.phase(), ReelPhase::FreeSpinning);
        assert!(reel.angle() < TAU);
        assert_eq!(reel.visible_segment(), shown);
    }
}
