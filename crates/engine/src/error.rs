//! Error types for hearth-engine
//!
//! This module defines all error types used throughout the engine.
//! We use `thiserror` for structured error handling with good error messages.

use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for hearth-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hearth-engine
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading a file
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error writing a file
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error creating a directory
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error reading a directory
    #[error("Failed to read directory {path}: {source}")]
    DirectoryRead {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error with file metadata
    #[error("Failed to read metadata for {path}: {source}")]
    Metadata {
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// Error removing, renaming, or changing the mode of a path
    #[error("Failed to {op} {path}: {source}")]
    Modify {
        op: &'static str,
        path: AbsPath,
        #[source]
        source: std::io::Error,
    },

    /// A command or script exited unsuccessfully
    #[error("Command {command} failed: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Mutation attempted through a read-only system
    #[error("{op} {path}: read-only system")]
    ReadOnly { op: &'static str, path: AbsPath },

    /// Operation the system cannot perform
    #[error("{op} {path}: not supported by this system")]
    Unsupported { op: &'static str, path: AbsPath },

    /// Path is not absolute
    #[error("Path must be absolute: {path}")]
    PathNotAbsolute { path: PathBuf },

    /// Path is not relative
    #[error("Path must be relative: {path}")]
    PathNotRelative { path: PathBuf },

    /// Invalid path prefix
    #[error("Path {} is not under base directory {}", path.display(), base.display())]
    InvalidPathPrefix {
        path: Arc<PathBuf>,
        base: Arc<PathBuf>,
    },

    /// Two source entries map to one target
    #[error("{target}: duplicate source state entries ({})", join_sources(sources))]
    DuplicateTarget {
        target: RelPath,
        sources: Vec<SourceRelPath>,
    },

    /// A target path with no source entry
    #[error("{target}: not managed")]
    NotManaged { target: RelPath },

    /// A path expected to be a directory is something else
    #[error("{path}: not a directory")]
    NotDir { path: AbsPath },

    /// Source entry of an unsupported kind
    #[error("{path}: unsupported file type")]
    UnsupportedFileType { path: AbsPath },

    /// A control file inside a directory that only holds data or scripts
    #[error("{path}: not allowed in {dir} directory")]
    NotAllowed { path: AbsPath, dir: &'static str },

    /// A non-script file in the scripts directory
    #[error("{path}: not a script")]
    NotAScript { path: AbsPath },

    /// The source state requires a newer version
    #[error("source state requires version {need} or later, this is version {have}")]
    TooOld { have: String, need: String },

    /// Invalid `.chezmoiversion` contents
    #[error("{path}: invalid version: {value}")]
    InvalidVersion { path: AbsPath, value: String },

    /// Invalid ignore or remove pattern
    #[error("{pattern}: invalid pattern: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Template parse or render error
    #[error("Template rendering failed for {path}: {message}")]
    TemplateRender { path: String, message: String },

    /// Decryption error
    #[error("Decryption failed for {path}: {message}")]
    Decryption { path: String, message: String },

    /// The pre-apply hook asked to stop
    #[error("apply aborted")]
    Aborted,

    /// State persistence error
    #[error("State persistence error: {0}")]
    State(String),

    /// Serialization error
    #[error("{format}: {message}")]
    Format {
        format: &'static str,
        message: String,
    },

    /// Archive read or write error
    #[error("Archive error: {0}")]
    Archive(String),

    /// A cached error from an earlier lazy evaluation
    #[error(transparent)]
    Deferred(Arc<Error>),

    /// Error from a shared core facility
    #[error(transparent)]
    Core(hearth_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    Other {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn join_sources(sources: &[SourceRelPath]) -> String {
    sources
        .iter()
        .map(SourceRelPath::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// Convert from hearth_core::Error
impl From<hearth_core::Error> for Error {
    fn from(err: hearth_core::Error) -> Self {
        match err {
            hearth_core::Error::PathNotAbsolute { path } => Error::PathNotAbsolute { path },
            hearth_core::Error::PathNotRelative { path } => Error::PathNotRelative { path },
            hearth_core::Error::InvalidPathPrefix { path, base } => {
                Error::InvalidPathPrefix { path, base }
            }
            hearth_core::Error::Io(e) => Error::Io(e),
            other => Error::Core(other),
        }
    }
}

impl Error {
    /// Create an error with additional context
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Other {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The underlying IO error kind, looking through cached errors
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Error::FileRead { source, .. }
            | Error::FileWrite { source, .. }
            | Error::DirectoryCreate { source, .. }
            | Error::DirectoryRead { source, .. }
            | Error::Metadata { source, .. }
            | Error::Modify { source, .. }
            | Error::Io(source) => Some(source.kind()),
            Error::Core(hearth_core::Error::Io(source)) => Some(source.kind()),
            Error::Deferred(inner) => inner.io_kind(),
            _ => None,
        }
    }

    /// Whether this error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        self.io_kind() == Some(std::io::ErrorKind::NotFound)
    }
}
