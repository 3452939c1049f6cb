//! Config file plus command-line overrides

use std::path::{Path, PathBuf};

use qs_machine::{ConfigError, MachineConfig, TimingConfig};

/// Where the daemon's configuration comes from.
///
/// Overrides are re-applied on every load so a `reload` keeps them.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    path: PathBuf,
    force_local: bool,
    turbo: bool,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            force_local: false,
            turbo: false,
        }
    }

    /// Resolve outcomes locally regardless of `debug_flag`
    pub fn with_force_local(mut self, force_local: bool) -> Self {
        self.force_local = force_local;
        self
    }

    /// Use the turbo timing profile regardless of `[timing]`
    pub fn with_turbo(mut self, turbo: bool) -> Self {
        self.turbo = turbo;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load (creating defaults on first start), apply overrides, validate
    pub fn load(&self) -> Result<MachineConfig, ConfigError> {
        let mut config = MachineConfig::load_or_create(&self.path)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut MachineConfig) {
        if self.force_local {
            config.debug_flag = true;
        }
        if self.turbo {
            config.timing = TimingConfig::turbo();
        }
    }
}
