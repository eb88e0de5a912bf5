//! Logging setup for the hearth CLI
//!
//! Compact output on stderr, plus an optional plain-text log file.

use crate::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: [&str; 5] = ["hearth", "hearth_engine", "hearth_crypto", "hearth_template", "hearth_config"];

/// Default filter directives for `level`
pub fn default_directives(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{krate}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build the stderr filter, honoring `RUST_LOG` when it is set
pub fn env_filter(verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = if verbose { "debug" } else { "info" };
    EnvFilter::try_new(default_directives(level)).map_err(|e| Error::Logging(e.to_string()))
}

/// Initialize the logging system
///
/// # Arguments
/// * `verbose` - Log at debug level instead of info
/// * `log_file` - Also append debug-level logs to this file
///
/// # Examples
/// ```ignore
/// hearth_config::logging::init(false, None)?;
/// hearth_config::logging::init(true, Some(Path::new("hearth.log")))?;
/// ```
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true);
    // Timestamps in verbose mode only
    let stderr_layer = if verbose {
        stderr_layer.boxed()
    } else {
        stderr_layer.without_time().boxed()
    };

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let filter = EnvFilter::try_new(default_directives("debug")).map_err(|e| Error::Logging(e.to_string()))?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer.with_filter(env_filter(verbose)?))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
