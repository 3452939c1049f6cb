//! # qs-io: QuoteSlot I/O collaborators
//!
//! Production implementations of the machine's side-effect seams:
//!
//! - [`FsQuoteStore`]: content-addressed quote files plus `latest.json`
//! - [`HttpQuoteVerifier`]: multipart upload to the attestation verifier
//! - [`CommandPrinter`]: plain-text receipt piped to a print command
//! - [`CommandCuePlayer`]: sound cues through an external player

pub mod player;
pub mod receipt;
pub mod store;
pub mod verifier;

pub use player::*;
pub use receipt::*;
pub use store::*;
pub use verifier::*;

use std::sync::Arc;

use qs_machine::{AudioCueBus, LogCueSink, MachineConfig, PostSpinPipeline};

/// Pipeline wired to the filesystem store, HTTP verifier and print command
pub fn pipeline_for(config: &MachineConfig) -> PostSpinPipeline {
    PostSpinPipeline::new()
        .with_store(Arc::new(FsQuoteStore::new(config.resolved_data_dir())))
        .with_verifier(Arc::new(HttpQuoteVerifier::new(config.verify_url.clone())))
        .with_printer(Arc::new(CommandPrinter::new(config.printer.clone())))
        .with_task_timeout(config.task_timeout())
}

/// Cue bus with the log sink, plus the sound player when audio is enabled
pub fn cue_bus_for(config: &MachineConfig) -> AudioCueBus {
    let mut bus = AudioCueBus::new().with_sink(Arc::new(LogCueSink));
    if config.audio.enabled {
        let sounds_dir = config.resolved_sounds_dir();
        bus.attach(Arc::new(CommandCuePlayer::new(&config.audio, &sounds_dir)));
    }
    bus
}
