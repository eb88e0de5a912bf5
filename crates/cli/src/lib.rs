//! Hearth CLI library
//!
//! The command-line front end of hearth: argument parsing, configuration
//! and logging setup, and one module per subcommand.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;
pub mod stats;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hearth_config::Config;
use std::path::PathBuf;

use command::Command;
use common::{ResolvedPaths, RuntimeContext, expand_tilde};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt:  ",
    env!("VERGEN_BUILD_DATE"),
    "\nrustc:  ",
    env!("VERGEN_RUSTC_SEMVER"),
);

/// Hearth - a dotfile manager that reads chezmoi source trees
#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Manage your dotfiles with hearth")]
#[command(version, long_version = LONG_VERSION)]
pub struct Cli {
    /// Path to the source directory
    #[arg(short = 'S', long, env = "HEARTH_SOURCE_DIR", value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Path to the destination directory (usually $HOME)
    #[arg(short = 'D', long, env = "HEARTH_DEST_DIR", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, env = "HEARTH_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log every filesystem, state and encryption call
    #[arg(long, global = true)]
    pub debug: bool,

    /// Write logs to a file
    #[arg(long, env = "HEARTH_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Add targets to the source directory
    Add(cmd::add::AddCommand),

    /// Apply the source state to the destination
    Apply(cmd::apply::ApplyCommand),

    /// Write the target state to an archive
    Archive(cmd::archive::ArchiveCommand),

    /// Show differences between the target state and the destination
    Diff(cmd::diff::DiffCommand),

    /// Print the target state as JSON, TOML or YAML
    Dump(cmd::dump::DumpCommand),

    /// Import an archive into the source directory
    Import(cmd::import::ImportCommand),

    /// Show which targets an apply would change
    Status(cmd::status::StatusCommand),

    /// Manage the persistent state
    #[command(subcommand)]
    State(cmd::state::StateCommand),
}

/// Run the command against the resolved context
fn execute_command(command: &Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Add(add) => {
            add.execute(context)?;
        }
        Commands::Apply(apply) => {
            apply.execute(context)?;
        }
        Commands::Archive(archive) => archive.execute(context)?,
        Commands::Diff(diff) => diff.execute(context)?,
        Commands::Dump(dump) => dump.execute(context)?,
        Commands::Import(import) => {
            import.execute(context)?;
        }
        Commands::Status(status) => {
            status.execute(context)?;
        }
        Commands::State(state) => state.execute(context)?,
    }
    Ok(())
}

/// The config file to load: `--config`, or the default file when it exists
fn config_file(cli: &Cli) -> Option<PathBuf> {
    match &cli.config {
        Some(path) => Some(expand_tilde(path)),
        None => hearth_config::default_config_file().filter(|path| path.is_file()),
    }
}

/// Build the runtime context from the command line and configuration
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the
/// directories cannot be resolved
pub fn context(cli: &Cli) -> Result<RuntimeContext> {
    // read before anything creates files
    let process_umask = hearth_config::umask::current();

    let config_file = config_file(cli);
    let config = match &config_file {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let source_dir = match &cli.source {
        Some(dir) => expand_tilde(dir),
        None => config.source_dir()?,
    };
    let dest_dir = match &cli.dest {
        Some(dir) => expand_tilde(dir),
        None => config.dest_dir()?,
    };
    let paths = ResolvedPaths::resolve(&source_dir, &dest_dir)?;

    let mut context = RuntimeContext::new(config, paths, process_umask)?;
    context.config_file = config_file;
    context.debug = cli.debug;
    tracing::debug!(
        source = %context.source_dir(),
        dest = %context.dest_dir(),
        umask = %context.umask,
        "resolved context"
    );
    Ok(context)
}

/// Entry point for the `hearth` binary
///
/// # Errors
///
/// Returns an error if:
/// - Logging initialization fails
/// - Configuration loading fails
/// - Source or destination directories cannot be determined
/// - Command execution fails
pub fn run(cli: Cli) -> Result<()> {
    hearth_config::logging::init(cli.verbose || cli.debug, cli.log_file.as_deref())
        .context("Failed to initialize logging")?;

    let context = context(&cli)?;
    execute_command(&cli.command, &context)
}
