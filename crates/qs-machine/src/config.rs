//! Machine configuration
//!
//! Stored as TOML next to the executable (`config/config.toml`). The
//! top-level keys are the operator-facing settings; the sections tune the
//! animation, sound, printing and trigger surfaces.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pipeline::PipelineFlags;
use crate::timing::TimingConfig;

/// Default oracle endpoint
pub const DEFAULT_ORACLE_URL: &str = "https://agents.phala.network/slot_machine/spin";

/// Default attestation verification endpoint
pub const DEFAULT_VERIFY_URL: &str = "https://agents.phala.network/api/attestations/verify";

/// Default explorer used for receipt links
pub const DEFAULT_EXPLORER_URL: &str = "https://ra-quote-explorer.vercel.app";

/// Default bound on one oracle request (ms)
pub const DEFAULT_RESOLVE_TIMEOUT_MS: u64 = 10_000;

/// Default bound on the whole post-spin pipeline (ms)
pub const DEFAULT_PIPELINE_TIMEOUT_MS: u64 = 60_000;

/// Default bound on a single pipeline task (ms)
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 30_000;

/// Where outcomes come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverMode {
    /// Local pseudo-random outcome, no I/O
    Local,
    /// One request to the remote oracle
    Remote,
}

/// Complete machine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Oracle endpoint
    pub url: String,
    /// Submit the quote for verification after each spin
    pub upload_quote: bool,
    /// Print a receipt after each spin
    pub print_report: bool,
    /// Resolve outcomes locally instead of asking the oracle
    pub debug_flag: bool,
    /// Keep the quote blob in the local store
    pub persist_quote: bool,
    /// Verification endpoint
    pub verify_url: String,
    /// Quote store directory (defaults to `<exe dir>/data`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Upper bound on one oracle request (ms)
    pub resolve_timeout_ms: u64,
    /// Upper bound on the whole post-spin pipeline (ms)
    pub pipeline_timeout_ms: u64,
    /// Upper bound on each store/upload/print task (ms)
    pub task_timeout_ms: u64,
    /// Lowest stop index sampled in local mode
    pub stop_min: u32,
    /// Highest stop index sampled in local mode (inclusive)
    pub stop_max: u32,

    pub timing: TimingConfig,
    pub audio: AudioConfig,
    pub printer: PrinterConfig,
    pub trigger: TriggerConfig,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ORACLE_URL.to_string(),
            upload_quote: true,
            print_report: true,
            debug_flag: false,
            persist_quote: true,
            verify_url: DEFAULT_VERIFY_URL.to_string(),
            data_dir: None,
            resolve_timeout_ms: DEFAULT_RESOLVE_TIMEOUT_MS,
            pipeline_timeout_ms: DEFAULT_PIPELINE_TIMEOUT_MS,
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            stop_min: 0,
            stop_max: 7,
            timing: TimingConfig::default(),
            audio: AudioConfig::default(),
            printer: PrinterConfig::default(),
            trigger: TriggerConfig::default(),
        }
    }
}

/// Sound cue playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Player command; the sound file path is appended as last argument
    pub player: String,
    pub player_args: Vec<String>,
    /// Directory holding the cue files (defaults to `<exe dir>/sounds`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sounds_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lever: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lose: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            player: "aplay".to_string(),
            player_args: vec!["-q".to_string()],
            sounds_dir: None,
            lever: Some("lever.mp3".to_string()),
            clicker: Some("clicker.mp3".to_string()),
            win: Some("win.wav".to_string()),
            lose: None,
        }
    }
}

/// Receipt printing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    /// Print command; the receipt is written to its stdin
    pub command: String,
    pub args: Vec<String>,
    /// Explorer base URL used for the verification link
    pub explorer_url: String,
    /// Receipt header line
    pub title: String,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            command: "lp".to_string(),
            args: vec!["-o".to_string(), "media=A4".to_string()],
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
            title: "QuoteSlot".to_string(),
        }
    }
}

/// Spin trigger channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// TCP address for line commands (`None` disables the listener)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
    /// Accept commands on stdin
    pub stdin: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            listen: Some("127.0.0.1:7878".to_string()),
            stdin: true,
        }
    }
}

/// The slice of configuration a single spin reads.
///
/// Snapshotted once when the spin is accepted; later edits apply to the next
/// spin only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinSettings {
    pub mode: ResolverMode,
    pub url: String,
    pub resolve_timeout_ms: u64,
    /// Past this the pipeline is abandoned and reported aborted
    pub pipeline_timeout_ms: u64,
    pub stop_min: u32,
    pub stop_max: u32,
    pub pipeline: PipelineFlags,
}

impl SpinSettings {
    /// Local-mode settings over `stop_min..=stop_max`, pipeline disabled
    pub fn local(stop_min: u32, stop_max: u32) -> Self {
        Self {
            mode: ResolverMode::Local,
            url: String::new(),
            resolve_timeout_ms: DEFAULT_RESOLVE_TIMEOUT_MS,
            pipeline_timeout_ms: DEFAULT_PIPELINE_TIMEOUT_MS,
            stop_min,
            stop_max,
            pipeline: PipelineFlags::none(),
        }
    }

    /// Remote-mode settings against `url`, pipeline disabled
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            mode: ResolverMode::Remote,
            url: url.into(),
            ..Self::local(0, 7)
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineFlags) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn pipeline_timeout(&self) -> Duration {
        Duration::from_millis(self.pipeline_timeout_ms)
    }

    /// Both timeouts must be positive; the stop range is checked by the resolver
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve_timeout_ms == 0 {
            return Err(ConfigError::Invalid("resolve_timeout_ms must be > 0".into()));
        }
        if self.pipeline_timeout_ms == 0 {
            return Err(ConfigError::Invalid("pipeline_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

impl MachineConfig {
    pub fn mode(&self) -> ResolverMode {
        if self.debug_flag {
            ResolverMode::Local
        } else {
            ResolverMode::Remote
        }
    }

    /// Snapshot of what one spin needs
    pub fn spin_settings(&self) -> SpinSettings {
        SpinSettings {
            mode: self.mode(),
            url: self.url.clone(),
            resolve_timeout_ms: self.resolve_timeout_ms,
            pipeline_timeout_ms: self.pipeline_timeout_ms,
            stop_min: self.stop_min,
            stop_max: self.stop_max,
            pipeline: PipelineFlags {
                persist: self.persist_quote,
                upload: self.upload_quote,
                print: self.print_report,
            },
        }
    }

    /// Quote store directory
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| executable_dir().join("data"))
    }

    /// Sound directory
    pub fn resolved_sounds_dir(&self) -> PathBuf {
        self.audio
            .sounds_dir
            .clone()
            .unwrap_or_else(|| executable_dir().join("sounds"))
    }

    /// Per-task bound handed to the pipeline
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()?;
        self.spin_settings().validate()?;
        if self.task_timeout_ms == 0 {
            return Err(ConfigError::Invalid("task_timeout_ms must be > 0".into()));
        }
        if self.stop_min > self.stop_max {
            return Err(ConfigError::Invalid(format!(
                "stop_min ({}) exceeds stop_max ({})",
                self.stop_min, self.stop_max
            )));
        }
        if !self.debug_flag {
            url::Url::parse(&self.url)
                .map_err(|e| ConfigError::Invalid(format!("url: {}", e)))?;
        }
        if self.upload_quote {
            url::Url::parse(&self.verify_url)
                .map_err(|e| ConfigError::Invalid(format!("verify_url: {}", e)))?;
        }
        Ok(())
    }

    /// Default config path: `<exe dir>/config/config.toml`
    pub fn default_path() -> PathBuf {
        executable_dir().join("config").join("config.toml")
    }

    /// Parse a config file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load a config file, writing the defaults out if it does not exist yet
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_from(path);
        }

        let config = Self::default();
        if let Err(e) = config.save_to(path) {
            log::warn!("[Config] Could not write defaults to {}: {}", path.display(), e);
        } else {
            log::info!("[Config] Wrote default config to {}", path.display());
        }
        Ok(config)
    }

    /// Write as pretty TOML, creating parent directories
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Directory of the running executable (portable layout)
fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MachineConfig::default();
        assert_eq!(config.mode(), ResolverMode::Remote);
        assert!(config.upload_quote);
        assert!(config.print_report);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_spin_settings_snapshot() {
        let config = MachineConfig {
            debug_flag: true,
            upload_quote: false,
            ..MachineConfig::default()
        };
        let settings = config.spin_settings();
        assert_eq!(settings.mode, ResolverMode::Local);
        assert!(settings.pipeline.persist);
        assert!(!settings.pipeline.upload);
        assert!(settings.pipeline.print);
        assert_eq!(settings.pipeline_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MachineConfig = toml::from_str(
            r#"
            url = "http://127.0.0.1:8000/slot_machine/spin"
            debug_flag = true

            [timing]
            prime_settle_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.url, "http://127.0.0.1:8000/slot_machine/spin");
        assert!(config.debug_flag);
        assert_eq!(config.timing.prime_settle_ms, 100);
        assert_eq!(config.timing.segments, 8);
        assert_eq!(config.stop_max, 7);
        assert_eq!(config.task_timeout_ms, DEFAULT_TASK_TIMEOUT_MS);
        assert_eq!(config.printer, PrinterConfig::default());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let config = MachineConfig {
            pipeline_timeout_ms: 0,
            ..MachineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = MachineConfig {
            task_timeout_ms: 0,
            ..MachineConfig::default()
        };
        assert!(config.validate().is_err());

        let settings = SpinSettings {
            resolve_timeout_ms: 0,
            ..SpinSettings::local(0, 7)
        };
        assert!(settings.validate().is_err());
        assert!(SpinSettings::local(0, 7).validate().is_ok());
    }

    #[test]
    fn test_invalid_stop_range() {
        let config = MachineConfig {
            stop_min: 9,
            stop_max: 3,
            ..MachineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_invalid_url_only_matters_in_remote_mode() {
        let mut config = MachineConfig {
            url: "not a url".into(),
            upload_quote: false,
            ..MachineConfig::default()
        };
        assert!(config.validate().is_err());

        config.debug_flag = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("config.toml");

        let created = MachineConfig::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created, MachineConfig::default());

        let edited = MachineConfig {
            print_report: false,
            stop_max: 14,
            ..created
        };
        edited.save_to(&path).unwrap();

        let loaded = MachineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, edited);
    }

    #[test]
    fn test_unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "url = [").unwrap();
        assert!(matches!(
            MachineConfig::load_or_create(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
