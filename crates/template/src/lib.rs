//! # Hearth Template
//!
//! Template rendering for hearth using minijinja.
//!
//! Source trees written for chezmoi keep working: Go-style leading-dot
//! references are rewritten before parsing, and the default data lives under
//! the `chezmoi` key.

pub mod context;
pub mod engine;
pub mod functions;
pub mod preprocess;

pub use context::{ChezmoiInfo, TemplateContext};
pub use engine::TemplateEngine;

use thiserror::Error;

/// Result type for template operations
pub type Result<T> = std::result::Result<T, Error>;

/// Template engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Template rendering error
    #[error("Template error at {location}: {message}")]
    Render {
        /// Template name and position
        location: String,
        /// What went wrong
        message: String,
    },

    /// Template syntax error
    #[error("Template syntax error at {location}: {message}")]
    Syntax {
        /// Template name and position
        location: String,
        /// What went wrong
        message: String,
    },
}

impl From<minijinja::Error> for Error {
    fn from(err: minijinja::Error) -> Self {
        let location = match (err.name(), err.line()) {
            (Some(name), Some(line)) => format!("{name} line {line}"),
            (Some(name), None) => name.to_string(),
            (None, Some(line)) => format!("line {line}"),
            (None, None) => "unknown location".to_string(),
        };
        let message = err.detail().map_or_else(|| err.kind().to_string(), str::to_string);

        if err.kind() == minijinja::ErrorKind::SyntaxError {
            Error::Syntax { location, message }
        } else {
            Error::Render { location, message }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_location_from_minijinja() {
        let env = minijinja::Environment::new();
        let err: Error = env.template_from_named_str("dot_x.tmpl", "a\n{{ }").unwrap_err().into();
        let Error::Syntax { location, .. } = err else {
            panic!("expected a syntax error");
        };
        assert_eq!(location, "dot_x.tmpl line 2");
    }
}
