//! Error types for CLI commands

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during command execution
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CommandError {
    /// A path given on the command line is outside the destination directory
    #[error("Path {} is not under destination directory {}", path.display(), dest_dir.display())]
    PathNotUnderDestination {
        /// The offending path
        path: PathBuf,
        /// The destination directory
        dest_dir: PathBuf,
    },

    /// Some entries failed under `--keep-going`
    #[error("Apply failed: {failed} out of {total} entries")]
    ApplyFailed {
        /// Number of entries that failed
        failed: usize,
        /// Number of entries attempted
        total: usize,
    },

    /// Unknown value for `--format`
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// Engine error
    #[error(transparent)]
    Engine(#[from] hearth_engine::Error),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] hearth_config::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<hearth_core::Error> for CommandError {
    fn from(err: hearth_core::Error) -> Self {
        Self::Engine(err.into())
    }
}

/// Result type alias for command operations
pub type Result<T> = std::result::Result<T, CommandError>;
