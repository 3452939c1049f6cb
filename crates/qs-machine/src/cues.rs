//! Audio cue bus
//!
//! Cues are fire-and-forget. Sinks must return quickly (spawn playback if it
//! takes time) and nothing they do feeds back into the spin.

use std::sync::Arc;

use qs_stage::AudioCue;

/// Receiver of sound cues
pub trait CueSink: Send + Sync {
    fn play(&self, cue: AudioCue);
}

/// Fans each cue out to every attached sink
#[derive(Clone, Default)]
pub struct AudioCueBus {
    sinks: Vec<Arc<dyn CueSink>>,
    muted: bool,
}

impl AudioCueBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn CueSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn attach(&mut self, sink: Arc<dyn CueSink>) {
        self.sinks.push(sink);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn emit(&self, cue: AudioCue) {
        if self.muted {
            return;
        }
        for sink in &self.sinks {
            sink.play(cue);
        }
    }
}

/// Sink that only logs (headless cabinets, audio disabled)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCueSink;

impl CueSink for LogCueSink {
    fn play(&self, cue: AudioCue) {
        log::debug!("[Audio] {}", cue.name());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use qs_stage::ReelId;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<AudioCue>>);

    impl CueSink for Recorder {
        fn play(&self, cue: AudioCue) {
            self.0.lock().push(cue);
        }
    }

    #[test]
    fn test_fan_out() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let bus = AudioCueBus::new()
            .with_sink(a.clone())
            .with_sink(b.clone())
            .with_sink(Arc::new(LogCueSink));

        bus.emit(AudioCue::Lever);
        bus.emit(AudioCue::ReelClick {
            reel: ReelId::ALL[2],
        });

        assert_eq!(bus.sink_count(), 3);
        assert_eq!(a.0.lock().len(), 2);
        assert_eq!(*a.0.lock(), *b.0.lock());
    }

    #[test]
    fn test_muted_bus_is_silent() {
        let rec = Arc::new(Recorder::default());
        let mut bus = AudioCueBus::new();
        bus.attach(rec.clone());
        bus.set_muted(true);

        bus.emit(AudioCue::Win);
        assert!(rec.0.lock().is_empty());
        assert!(bus.is_muted());
    }
}
