//! Error types shared across the crate.
//!
//! Per-file move failures are not errors here: they travel as
//! [`MoveOutcome::Failed`](crate::events::MoveOutcome::Failed) so a single bad
//! file never stops a watch session.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, validating or persisting the config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document exists but could not be parsed.
    #[error("config document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document could not be written. The in-memory config was rolled back.
    #[error("failed to persist config to {path}: {source}")]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config could not be serialized to JSON.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A rule edit was rejected before anything was persisted.
    #[error(transparent)]
    InvalidRule(#[from] RuleError),
}

/// Validation errors for a single rule or a whole rule table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid extension {0:?}: expected a dot followed by at least one character, e.g. \".mp3\"")]
    InvalidExtension(String),

    #[error("invalid destination {0:?}: must be a non-empty relative folder without '..'")]
    InvalidDestination(String),

    #[error("extension {0:?} appears more than once")]
    DuplicateExtension(String),

    #[error("invalid rules format: {0}")]
    Parse(String),
}

/// Errors raised when starting a watch session.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch root is empty, missing or not a directory.
    #[error("invalid watch root {0:?}: not an existing directory")]
    InvalidRoot(PathBuf),

    #[error("a watch session is already active on {0}")]
    AlreadyActive(PathBuf),

    /// The filesystem-watch facility refused the subscription.
    #[error("failed to watch {path}: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Errors raised by an [`AutostartRegistrar`](crate::autostart::AutostartRegistrar).
#[derive(Debug, Error)]
pub enum AutostartError {
    #[error("failed to update autostart entry at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
