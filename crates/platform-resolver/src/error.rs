//! Error types for platform resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading profiles or resolving platforms.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// No candidate platform is reachable from this process.
    #[error("no reachable storage platform (tried: {tried:?})")]
    PlatformUnavailable { tried: Vec<String> },

    /// The configuration directory holds no platform profiles.
    #[error("no platform profiles found in {0}")]
    NoProfiles(String),

    /// A profile file could not be read.
    #[error("failed to read profile {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A profile file is not valid YAML for the profile schema.
    #[error("failed to parse profile {path:?}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// A profile parsed but its content is unusable.
    #[error("invalid profile {path:?}: {message}")]
    InvalidProfile { path: PathBuf, message: String },

    /// A transport option is unknown or has a malformed value.
    #[error("invalid transport option '{key}': {message}")]
    InvalidTransportOption { key: String, message: String },

    /// `${VAR}` substitution referenced an unset variable.
    #[error("environment variable {0} not set")]
    MissingVariable(String),

    /// The reachability probe client could not be built.
    #[error("probe client error: {0}")]
    Probe(String),
}

impl PlatformError {
    /// Create an InvalidTransportOption error.
    pub fn transport(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTransportOption {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidProfile error.
    pub fn invalid_profile(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidProfile {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for platform resolution.
pub type Result<T> = std::result::Result<T, PlatformError>;
