//! Import command implementation
//!
//! Add the contents of an archive to the source directory as if they were
//! in the destination.

use anyhow::Context;
use clap::Args;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use hearth_engine::AddOptions;
use hearth_engine::system::{ArchiveFormat, ArchiveReaderSystem, System};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext, expand_tilde, resolve_absolute_path, walk};
use crate::error::{CommandError, Result};

/// Import an archive into the source directory
#[derive(Debug, Clone, Args)]
pub struct ImportCommand {
    /// Archive to import
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Where the archive contents belong (the destination directory if omitted)
    #[arg(short, long, value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Drop this many leading path components from every member
    #[arg(long, default_value_t = 0)]
    pub strip_components: usize,

    /// Archive format: tar, tar.gz or zip (guessed from the file name when omitted)
    #[arg(long)]
    pub format: Option<String>,

    /// Add directories as exact
    #[arg(long)]
    pub exact: bool,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl ImportCommand {
    fn archive_format(&self) -> Result<ArchiveFormat> {
        match &self.format {
            Some(name) => ArchiveFormat::parse(name).ok_or_else(|| CommandError::UnknownFormat(name.clone())),
            None => {
                let name = self.archive.to_string_lossy();
                ArchiveFormat::from_name(&name).ok_or_else(|| CommandError::UnknownFormat(name.into_owned()))
            }
        }
    }

    fn destination(&self, context: &RuntimeContext) -> Result<AbsPath> {
        let Some(dir) = &self.destination else {
            return Ok(context.dest_dir().clone());
        };
        let dir = resolve_absolute_path(&expand_tilde(dir))?;
        if dir.strip_prefix(context.dest_dir()).is_err() {
            return Err(CommandError::PathNotUnderDestination {
                path: dir.into_path_buf(),
                dest_dir: context.dest_dir().as_path().to_path_buf(),
            });
        }
        Ok(dir)
    }

    fn options(&self, context: &RuntimeContext) -> Result<AddOptions> {
        Ok(AddOptions {
            exact: self.exact,
            filter: self.filter.filter()?,
            umask: context.umask,
            ..AddOptions::default()
        })
    }
}

impl Command for ImportCommand {
    type Output = Vec<SourceRelPath>;

    fn execute(&self, context: &RuntimeContext) -> Result<Vec<SourceRelPath>> {
        let format = self.archive_format()?;
        let data = fs::read(&self.archive)
            .with_context(|| format!("Failed to read archive {}", self.archive.display()))?;
        let destination = self.destination(context)?;
        let archive = ArchiveReaderSystem::new(destination.clone(), &data, format, self.strip_components)?;
        let options = self.options(context)?;

        let system = context.system();
        let source_dir = context.source_dir().as_path();
        fs::create_dir_all(source_dir)
            .with_context(|| format!("Failed to create source directory {}", source_dir.display()))?;
        let persistent = context.open_state()?;

        // Directories above the destination come from the real filesystem
        let mut state = context.read_source_state(&system)?;
        let target_rel = destination.strip_prefix(context.dest_dir())?;
        let unmanaged: Vec<AbsPath> = ancestors(&target_rel)
            .into_iter()
            .filter(|rel| state.entry(rel).is_none())
            .map(|rel| context.dest_dir().join(&rel))
            .collect();
        if !unmanaged.is_empty() {
            debug!(count = unmanaged.len(), "adding destination parents");
            state.add(&*system, &*persistent, &*system, &unmanaged, &options)?;
            state = context.read_source_state(&system)?;
        }

        let mut paths = Vec::new();
        if !target_rel.is_empty() {
            paths.push(destination.clone());
        }
        let mut children = archive.read_dir(&destination)?;
        children.sort_by(|a, b| a.name.cmp(&b.name));
        for child in children {
            paths.extend(walk(&archive, &destination.join_str(&child.name))?);
        }

        let written = state.add(&*system, &*persistent, &archive, &paths, &options)?;
        info!(archive = %self.archive.display(), entries = written.len(), "imported");
        Ok(written)
    }
}

/// Proper ancestors of `rel`, outermost first
fn ancestors(rel: &RelPath) -> Vec<RelPath> {
    let mut out = Vec::new();
    let mut parent = rel.parent();
    while let Some(dir) = parent {
        if dir.is_empty() {
            break;
        }
        parent = dir.parent();
        out.push(dir);
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_ancestors() {
        let rel = RelPath::new(".local/share/app").unwrap();
        let names: Vec<String> = ancestors(&rel).iter().map(ToString::to_string).collect();
        assert_eq!(names, [".local", ".local/share"]);
        assert!(ancestors(&RelPath::new(".vim").unwrap()).is_empty());
    }

    #[test]
    fn test_format_guess() {
        let command = ImportCommand {
            archive: PathBuf::from("oh-my-zsh.tar.gz"),
            destination: None,
            strip_components: 1,
            format: None,
            exact: false,
            filter: FilterArgs::default(),
        };
        assert_eq!(command.archive_format().unwrap(), ArchiveFormat::TarGz);

        let unknown = ImportCommand {
            archive: PathBuf::from("archive.rar"),
            ..command
        };
        assert!(unknown.archive_format().is_err());
    }
}
