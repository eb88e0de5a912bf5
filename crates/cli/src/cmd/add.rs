//! Add command implementation
//!
//! Copy destination files into the source directory, encoding their
//! attributes in the source names.

use anyhow::Context;
use clap::Args;
use hearth_core::path::{AbsPath, SourceRelPath};
use hearth_engine::AddOptions;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext, walk};
use crate::error::Result;

/// Add targets to the source directory
#[derive(Debug, Clone, Args)]
#[allow(clippy::struct_excessive_bools)]
pub struct AddCommand {
    /// Files and directories to add; directories are added recursively
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Add files as templates
    #[arg(short = 'T', long)]
    pub template: bool,

    /// Replace known data values with template references
    #[arg(short, long)]
    pub autotemplate: bool,

    /// Encrypt files
    #[arg(short = 'E', long)]
    pub encrypt: bool,

    /// Only create files that do not exist yet
    #[arg(short, long)]
    pub create: bool,

    /// Add directories as exact, removing anything unmanaged on apply
    #[arg(long)]
    pub exact: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl AddCommand {
    fn options(&self, context: &RuntimeContext) -> Result<AddOptions> {
        let defaults = &context.config.add;
        Ok(AddOptions {
            autotemplate: self.autotemplate || defaults.autotemplate,
            create: self.create,
            encrypt: self.encrypt || defaults.encrypt,
            exact: self.exact,
            template: self.template,
            filter: self.filter.filter()?,
            umask: context.umask,
        })
    }
}

impl Command for AddCommand {
    type Output = Vec<SourceRelPath>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<SourceRelPath>> {
        let options = self.options(context)?;
        let system = context.system();

        let source_dir = context.source_dir().as_path();
        fs::create_dir_all(source_dir)
            .with_context(|| format!("Failed to create source directory {}", source_dir.display()))?;
        let state = context.read_source_state(&system)?;

        let mut paths: Vec<AbsPath> = Vec::new();
        for target_rel in context.target_rel_paths(&self.files)? {
            paths.extend(walk(&*system, &context.dest_dir().join(&target_rel))?);
        }

        let persistent = context.open_state()?;
        let written = state.add(&*system, &*persistent, &*system, &paths, &options)?;
        for source_rel in &written {
            info!(source = %source_rel, "added");
        }
        Ok(written)
    }
}
