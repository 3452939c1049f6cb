//! Sound cue playback through an external player command

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use qs_machine::{AudioConfig, CueSink};
use qs_stage::AudioCue;

/// Plays cue files with e.g. `aplay -q <file>`.
///
/// Each cue spawns its own player process; overlapping cues overlap.
/// Cues without a configured file are silent.
#[derive(Debug, Clone)]
pub struct CommandCuePlayer {
    player: String,
    args: Vec<String>,
    lever: Option<PathBuf>,
    clicker: Option<PathBuf>,
    win: Option<PathBuf>,
    lose: Option<PathBuf>,
}

impl CommandCuePlayer {
    pub fn new(config: &AudioConfig, sounds_dir: &Path) -> Self {
        let resolve = |file: &Option<String>| file.as_ref().map(|f| sounds_dir.join(f));
        Self {
            player: config.player.clone(),
            args: config.player_args.clone(),
            lever: resolve(&config.lever),
            clicker: resolve(&config.clicker),
            win: resolve(&config.win),
            lose: resolve(&config.lose),
        }
    }

    /// Sound file bound to `cue`
    pub fn file_for(&self, cue: AudioCue) -> Option<&Path> {
        match cue {
            AudioCue::Lever => self.lever.as_deref(),
            AudioCue::ReelClick { .. } => self.clicker.as_deref(),
            AudioCue::Win => self.win.as_deref(),
            AudioCue::Lose => self.lose.as_deref(),
        }
    }

    fn spawn(&self, file: &Path) -> std::io::Result<tokio::process::Child> {
        Command::new(&self.player)
            .args(&self.args)
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

impl CueSink for CommandCuePlayer {
    fn play(&self, cue: AudioCue) {
        let Some(file) = self.file_for(cue) else {
            return;
        };
        if !file.exists() {
            log::debug!("[Audio] {} missing: {}", cue.name(), file.display());
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("[Audio] No runtime; dropping {} cue", cue.name());
            return;
        };

        match self.spawn(file) {
            Ok(mut child) => {
                let name = cue.name();
                runtime.spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            log::warn!("[Audio] Player exited with {} for {}", status, name);
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("[Audio] Player wait failed for {}: {}", name, e),
                    }
                });
            }
            Err(e) => log::warn!("[Audio] Could not start {}: {}", self.player, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qs_stage::ReelId;

    #[test]
    fn test_cue_files_resolve_against_sounds_dir() {
        let player = CommandCuePlayer::new(&AudioConfig::default(), Path::new("/opt/quoteslot/sounds"));

        assert_eq!(
            player.file_for(AudioCue::Lever),
            Some(Path::new("/opt/quoteslot/sounds/lever.mp3"))
        );
        assert_eq!(
            player.file_for(AudioCue::ReelClick {
                reel: ReelId::ALL[1]
            }),
            Some(Path::new("/opt/quoteslot/sounds/clicker.mp3"))
        );
        assert_eq!(player.file_for(AudioCue::Lose), None);
    }

    #[test]
    fn test_missing_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let player = CommandCuePlayer::new(&AudioConfig::default(), dir.path());
        // no runtime, no file: must simply return
        player.play(AudioCue::Win);
    }
}
