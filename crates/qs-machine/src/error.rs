//! Error types for the spin machine

use thiserror::Error;

/// The outcome of a spin could not be obtained.
///
/// The only error that changes the controller's state machine: it aborts the
/// live generation and returns the machine to idle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Oracle did not answer within {0} ms")]
    Timeout(u64),

    #[error("Oracle returned HTTP {0}")]
    Status(u16),

    #[error("Malformed oracle response: {0}")]
    Malformed(String),

    #[error("Invalid stop range: {min}..={max}")]
    InvalidStopRange { min: u32, max: u32 },

    #[error("No oracle endpoint configured")]
    MissingEndpoint,

    #[error("Resolver task aborted: {0}")]
    Aborted(String),
}

/// Local quote storage failed
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Verification upload failed
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Verifier rejected the quote: HTTP {0}")]
    Rejected(u16),

    #[error("Malformed verifier response: {0}")]
    Malformed(String),
}

/// Receipt printing failed
#[derive(Error, Debug)]
pub enum PrintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Print command exited with {0}")]
    CommandFailed(String),
}

/// Configuration could not be read or written
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// The machine runtime refused a request or is gone
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Machine runtime has shut down")]
    Shutdown,

    /// Rejected before reaching the machine; the previous settings stay live
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl From<ConfigError> for RuntimeError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Invalid(reason) => Self::InvalidConfig(reason),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}
