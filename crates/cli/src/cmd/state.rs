//! State command implementation
//!
//! Inspect and edit the persistent state.

use clap::Subcommand;
use hearth_engine::persistent;
use std::io::Write;

use crate::cmd::dump::output_format;
use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Manage the persistent state
#[derive(Debug, Clone, Subcommand)]
pub enum StateCommand {
    /// Print every bucket
    Dump {
        /// Output format: json, toml or yaml
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Delete one bucket, such as `scriptState` to rerun once scripts
    DeleteBucket {
        /// Bucket name
        #[arg(long)]
        bucket: String,
    },
}

impl StateCommand {
    /// The serialized state for `state dump`
    pub fn render_dump(context: &RuntimeContext, format: &str) -> Result<Vec<u8>> {
        let format = output_format(format)?;
        let state = context.snapshot_state()?;
        let value = persistent::dump(&*state)?;
        Ok(format.marshal(&value)?)
    }
}

impl Command for StateCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        match self {
            StateCommand::Dump { format } => {
                let out = Self::render_dump(context, format)?;
                std::io::stdout().lock().write_all(&out)?;
            }
            StateCommand::DeleteBucket { bucket } => {
                let state = context.open_state()?;
                state.delete_bucket(bucket)?;
                tracing::info!(%bucket, "deleted bucket");
            }
        }
        Ok(())
    }
}
