//! Core types and utilities for hearth
//!
//! This is the foundation crate that all other hearth crates depend on.
//! It provides:
//! - Path types (`AbsPath`, `RelPath`, `SourceRelPath`)
//! - Base error types
//! - The explicit [`Umask`] value threaded through every apply
//! - Platform detection
//! - Collaborator traits (`Encryption`, `TemplateRenderer`)
//!
//! This crate has no dependencies on other hearth crates.

pub mod error;
pub mod mode;
pub mod path;
pub mod platform;
pub mod traits;

pub use error::{Error, Result};
pub use mode::Umask;
pub use traits::{Encryption, TemplateRenderer};
