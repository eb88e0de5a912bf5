//! Diff command implementation
//!
//! Print what an apply would change as a git-style diff.

use clap::Args;
use hearth_engine::system::{DryRunSystem, GitDiffSystem};
use hearth_engine::{ApplyOptions, ErrorPolicy};
use std::io::Write;
use std::path::PathBuf;

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext};
use crate::error::Result;

/// Show the differences between the target state and the destination
#[derive(Debug, Clone, Args)]
pub struct DiffCommand {
    /// Targets to diff (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl DiffCommand {
    /// Write the diff to `writer`
    pub fn write_to(&self, context: &RuntimeContext, writer: Box<dyn Write>) -> Result<()> {
        let system = context.read_only_system();
        let state = context.read_source_state(&system)?;
        let targets = context.selected_targets(&state, &self.files)?;
        // scripts that already ran must not show up again
        let persistent = context.snapshot_state()?;

        let mut options = ApplyOptions::new(context.umask);
        options.filter = self.filter.filter()?;
        options.policy = ErrorPolicy::KeepGoing;

        let diff = GitDiffSystem::new(DryRunSystem::new(&*system), writer, context.dest_dir().clone());
        let report = state.apply_all(&diff, &*persistent, &targets, &mut options)?;
        for (target, err) in &report.errors {
            tracing::warn!(%target, error = %err, "cannot diff");
        }
        Ok(())
    }
}

impl Command for DiffCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        self.write_to(context, Box::new(std::io::stdout()))
    }
}
