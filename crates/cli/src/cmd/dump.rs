//! Dump command implementation
//!
//! Print the target state as JSON, TOML or YAML.

use clap::Args;
use hearth_engine::ApplyOptions;
use hearth_engine::format::{self, Format};
use hearth_engine::persistent::MockPersistentState;
use hearth_engine::system::DumpSystem;
use std::io::Write;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext};
use crate::error::{CommandError, Result};

/// Print the target state
#[derive(Debug, Clone, Args)]
pub struct DumpCommand {
    /// Targets to dump (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Output format: json, toml or yaml
    #[arg(short, long, default_value = "json")]
    pub format: String,

    #[command(flatten)]
    pub filter: FilterArgs,
}

/// Look up a `--format` value
pub fn output_format(name: &str) -> Result<Box<dyn Format>> {
    format::from_name(name).ok_or_else(|| CommandError::UnknownFormat(name.to_string()))
}

impl DumpCommand {
    /// The serialized target state
    pub fn render(&self, context: &RuntimeContext) -> Result<Vec<u8>> {
        let format = output_format(&self.format)?;
        let system = context.read_only_system();
        let state = context.read_source_state(&system)?;
        let targets = context.selected_targets(&state, &self.files)?;

        let mut options = ApplyOptions::new(context.umask);
        options.filter = self.filter.filter()?;

        // a fresh state so that every script is included
        let persistent = MockPersistentState::new();
        let dump = DumpSystem::new(context.dest_dir().clone());
        state.apply_all(&dump, &persistent, &targets, &mut options)?;

        let value = serde_json::to_value(dump.into_entries()).map_err(anyhow::Error::from)?;
        Ok(format.marshal(&value)?)
    }
}

impl Command for DumpCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let out = self.render(context)?;
        std::io::stdout().lock().write_all(&out)?;
        Ok(())
    }
}
