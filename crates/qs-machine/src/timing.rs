//! Timing profiles for reel animation and scheduled spin steps

use std::f64::consts::TAU;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Cabinet timing
    #[default]
    Normal,
    /// Fast mode (demo, attract loop)
    Turbo,
    /// Hand-tuned values
    Custom,
}

/// Animation clock and delay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub profile: TimingProfile,

    /// Animation frame period (ms)
    pub frame_interval_ms: u64,

    /// Rotation added to a moving reel every frame (radians)
    pub rotation_per_frame: f64,

    /// Visual segments per reel (one per stop position)
    pub segments: u32,

    /// Free-spin time before the outcome is requested (ms)
    pub prime_settle_ms: u64,

    /// Pause between the last reel stop and the win/lose cue (ms)
    pub win_reveal_ms: u64,

    /// Minimum travel, in segments, once a reel is aimed at a stop
    pub lead_in_segments: u32,

    /// Extra travel per reel index so reels land left to right
    pub stagger_segments: u32,
}

impl TimingConfig {
    /// Cabinet timing (~60 fps, 0.15 rad per frame)
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            frame_interval_ms: 16,
            rotation_per_frame: 0.15,
            segments: 8,
            prime_settle_ms: 750,
            win_reveal_ms: 500,
            lead_in_segments: 15,
            stagger_segments: 8,
        }
    }

    /// Fast mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            frame_interval_ms: 16,
            rotation_per_frame: 0.3,
            segments: 8,
            prime_settle_ms: 300,
            win_reveal_ms: 200,
            lead_in_segments: 8,
            stagger_segments: 8,
        }
    }

    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal | TimingProfile::Custom => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
        }
    }

    /// Scale delays by factor (< 1.0 = faster); the frame clock is untouched
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor).round() as u64;
        Self {
            profile: TimingProfile::Custom,
            prime_settle_ms: scale(self.prime_settle_ms),
            win_reveal_ms: scale(self.win_reveal_ms),
            rotation_per_frame: self.rotation_per_frame / factor.max(f64::EPSILON),
            ..self.clone()
        }
    }

    /// Angular width of one stop position
    pub fn segment_angle(&self) -> f64 {
        TAU / self.segments.max(1) as f64
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn prime_settle(&self) -> Duration {
        Duration::from_millis(self.prime_settle_ms)
    }

    pub fn win_reveal(&self) -> Duration {
        Duration::from_millis(self.win_reveal_ms)
    }

    /// Upper bound on frames a reel needs to land once aimed
    pub fn max_landing_frames(&self, reel_index: usize) -> u64 {
        let segments = self.lead_in_segments as f64
            + self.stagger_segments as f64 * reel_index as f64
            + self.segments as f64;
        (segments * self.segment_angle() / self.rotation_per_frame).ceil() as u64 + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.segments == 0 {
            return Err(ConfigError::Invalid("timing.segments must be > 0".into()));
        }
        if !(self.rotation_per_frame.is_finite() && self.rotation_per_frame > 0.0) {
            return Err(ConfigError::Invalid(
                "timing.rotation_per_frame must be a positive number".into(),
            ));
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.frame_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}
