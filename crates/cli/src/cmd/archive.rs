//! Archive command implementation
//!
//! Write the target state to a tar, tar.gz or zip archive instead of the
//! destination.

use clap::Args;
use flate2::Compression;
use flate2::write::GzEncoder;
use hearth_engine::persistent::MockPersistentState;
use hearth_engine::system::{ArchiveFormat, System, TarWriterSystem, ZipWriterSystem};
use hearth_engine::{ApplyOptions, RelPath, SourceState};
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use crate::command::Command;
use crate::common::{FilterArgs, RuntimeContext};
use crate::error::{CommandError, Result};

/// Write the target state to an archive
#[derive(Debug, Clone, Args)]
pub struct ArchiveCommand {
    /// Targets to archive (all if not specified)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Archive format: tar, tar.gz or zip (guessed from --output when omitted)
    #[arg(long)]
    pub format: Option<String>,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl ArchiveCommand {
    fn archive_format(&self) -> Result<ArchiveFormat> {
        if let Some(name) = &self.format {
            return ArchiveFormat::parse(name).ok_or_else(|| CommandError::UnknownFormat(name.clone()));
        }
        Ok(self
            .output
            .as_deref()
            .and_then(|p| p.file_name())
            .and_then(|name| ArchiveFormat::from_name(&name.to_string_lossy()))
            .unwrap_or(ArchiveFormat::Tar))
    }

    /// The archive contents
    pub fn build(&self, context: &RuntimeContext) -> Result<Vec<u8>> {
        let format = self.archive_format()?;
        let system = context.read_only_system();
        let state = context.read_source_state(&system)?;
        let targets = context.selected_targets(&state, &self.files)?;
        let dir = context.dest_dir().clone();

        Ok(match format {
            ArchiveFormat::Tar => {
                let sink = TarWriterSystem::new(Vec::new(), dir);
                self.apply(context, &state, &targets, &sink)?;
                sink.finish()?
            }
            ArchiveFormat::TarGz => {
                let sink = TarWriterSystem::new(GzEncoder::new(Vec::new(), Compression::default()), dir);
                self.apply(context, &state, &targets, &sink)?;
                sink.finish()?.finish()?
            }
            ArchiveFormat::Zip => {
                let sink = ZipWriterSystem::new(Cursor::new(Vec::new()), dir);
                self.apply(context, &state, &targets, &sink)?;
                sink.finish()?.into_inner()
            }
        })
    }

    fn apply(
        &self,
        context: &RuntimeContext,
        state: &SourceState,
        targets: &[RelPath],
        sink: &dyn System,
    ) -> Result<()> {
        let mut options = ApplyOptions::new(context.umask);
        options.filter = self.filter.filter()?;
        // a fresh state so that every script is included
        let persistent = MockPersistentState::new();
        state.apply_all(sink, &persistent, targets, &mut options)?;
        Ok(())
    }
}

impl Command for ArchiveCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let data = self.build(context)?;
        match &self.output {
            Some(path) => fs::write(path, data)?,
            None => std::io::stdout().lock().write_all(&data)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    fn command(format: Option<&str>, output: Option<&str>) -> ArchiveCommand {
        ArchiveCommand {
            files: Vec::new(),
            format: format.map(str::to_string),
            output: output.map(PathBuf::from),
            filter: FilterArgs::default(),
        }
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(command(Some("zip"), None).archive_format().unwrap(), ArchiveFormat::Zip);
        assert_eq!(
            command(Some("tar.gz"), Some("x.zip")).archive_format().unwrap(),
            ArchiveFormat::TarGz
        );
        assert!(command(Some("rar"), None).archive_format().is_err());
    }

    #[test]
    fn test_format_from_output_name() {
        assert_eq!(
            command(None, Some("/tmp/dotfiles.tgz")).archive_format().unwrap(),
            ArchiveFormat::TarGz
        );
        assert_eq!(command(None, Some("out.zip")).archive_format().unwrap(), ArchiveFormat::Zip);
        assert_eq!(command(None, None).archive_format().unwrap(), ArchiveFormat::Tar);
    }
}
