//! Configuration management for hearth
//!
//! This crate handles:
//! - Configuration loading from `hearth.toml`
//! - XDG directory defaults
//! - Capturing the process umask
//! - Logging initialization

pub mod config;
pub mod dirs;
pub mod logging;
pub mod umask;

pub use config::{AddConfig, AgeConfig, Config, EncryptionKind, GpgConfig};
pub use dirs::{config_dir, data_dir, default_config_file, default_persistent_state, default_source_dir};

use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum Error {
    /// The config file could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`Config`]
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: Box<toml::de::Error>,
    },

    /// A umask that is not an octal permission mask
    #[error("Invalid umask {0:?}: expected an octal value like \"022\"")]
    InvalidUmask(String),

    /// No home directory could be determined
    #[error("Cannot determine the home directory")]
    NoHomeDir,

    /// No XDG base directory could be determined
    #[error("Cannot determine the XDG {0} directory")]
    NoXdgDir(&'static str),

    /// Encryption backend setup failed
    #[error(transparent)]
    Crypto(#[from] hearth_crypto::Error),

    /// Logging could not be initialized
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
