//! Entries of the source state

use super::actual::ActualStateEntry;
use super::target::{TargetStateEntry, is_empty};
use crate::attr::{DirAttr, FileAttr, SourceFileType};
use crate::error::{Error, Result};
use crate::lazy::{LazyContents, LazyLinkname};
use crate::system::{Cmd, System};
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use std::io::Write;

/// One entry of the source state, keyed by its target path
#[derive(Debug, Clone)]
pub enum SourceStateEntry {
    /// A source directory
    Dir {
        /// Where it lives in the source tree
        source_rel_path: SourceRelPath,
        /// Decoded attributes
        attr: DirAttr,
    },
    /// A source file of any type
    File {
        /// Where it lives in the source tree
        source_rel_path: SourceRelPath,
        /// Decoded attributes
        attr: FileAttr,
        /// Decrypted and rendered contents
        contents: LazyContents,
    },
    /// A deliberate absence from `.chezmoiremove` or an exact directory
    Remove {
        /// The control file or exact directory that caused it
        source_rel_path: Option<SourceRelPath>,
    },
    /// A source directory whose encoding changed, renamed in place
    RenameDir {
        /// Current source location
        old_source_rel_path: SourceRelPath,
        /// New source location
        new_source_rel_path: SourceRelPath,
    },
}

impl SourceStateEntry {
    /// Where this entry lives in the source tree
    pub fn source_rel_path(&self) -> Option<&SourceRelPath> {
        match self {
            SourceStateEntry::Dir { source_rel_path, .. } | SourceStateEntry::File { source_rel_path, .. } => {
                Some(source_rel_path)
            }
            SourceStateEntry::Remove { source_rel_path } => source_rel_path.as_ref(),
            SourceStateEntry::RenameDir {
                new_source_rel_path, ..
            } => Some(new_source_rel_path),
        }
    }

    /// Apply order: `before_` scripts first, `after_` scripts last
    pub fn order(&self) -> i32 {
        match self {
            SourceStateEntry::File { attr, .. } => attr.order,
            _ => 0,
        }
    }

    /// Force lazy contents, surfacing any deferred error
    pub fn evaluate(&self) -> Result<()> {
        match self {
            SourceStateEntry::File { contents, .. } => contents.evaluate(),
            _ => Ok(()),
        }
    }

    /// Derive the desired state of `target_rel`, found at `target_abs`
    ///
    /// `modify_` entries read the current contents through `dest_system` and
    /// run the modifier immediately.
    pub fn target_state_entry(
        &self,
        dest_system: &dyn System,
        source_dir: &AbsPath,
        target_rel: &RelPath,
        target_abs: &AbsPath,
    ) -> Result<TargetStateEntry> {
        match self {
            // remove_ directories are only removed after apply, once empty
            SourceStateEntry::Dir { attr, .. } => Ok(TargetStateEntry::Dir { perm: attr.perm() }),
            SourceStateEntry::Remove { .. } => Ok(TargetStateEntry::Absent),
            SourceStateEntry::RenameDir {
                old_source_rel_path, ..
            } => Ok(TargetStateEntry::RenameDir {
                old_abs: source_dir.join_str(old_source_rel_path.as_str()),
            }),
            SourceStateEntry::File {
                source_rel_path,
                attr,
                contents,
            } => Ok(match attr.kind {
                SourceFileType::File => TargetStateEntry::File {
                    perm: attr.perm(),
                    contents: contents.clone(),
                    empty: attr.empty,
                },
                SourceFileType::Create => TargetStateEntry::Present {
                    perm: attr.perm(),
                    contents: contents.clone(),
                },
                SourceFileType::Remove => TargetStateEntry::Absent,
                SourceFileType::Script => TargetStateEntry::Script {
                    name: target_rel.clone(),
                    contents: contents.clone(),
                    condition: attr.condition,
                },
                SourceFileType::Symlink => TargetStateEntry::Symlink {
                    linkname: LazyLinkname::from_contents(contents),
                },
                SourceFileType::Modify => {
                    let current = match ActualStateEntry::read(dest_system, target_abs)? {
                        ActualStateEntry::File { contents, .. } => contents.contents()?.to_vec(),
                        _ => Vec::new(),
                    };
                    let modified = modify(dest_system, source_rel_path, &contents.contents()?, current)
                        .map_err(|e| e.context(format!("{source_rel_path}: modify")))?;
                    TargetStateEntry::File {
                        perm: attr.perm(),
                        contents: LazyContents::from_bytes(modified),
                        empty: true,
                    }
                }
            }),
        }
    }
}

/// Run `modifier` with `current` on stdin and return its stdout
///
/// A modifier that is only whitespace leaves the contents unchanged.
fn modify(system: &dyn System, name: &SourceRelPath, modifier: &[u8], current: Vec<u8>) -> Result<Vec<u8>> {
    if is_empty(modifier) {
        return Ok(current);
    }
    let io_err = |source: std::io::Error| Error::Command {
        command: name.to_string(),
        source,
    };
    let mut file = tempfile::Builder::new()
        .prefix("hearth-modify-")
        .tempfile()
        .map_err(io_err)?;
    file.write_all(modifier).map_err(io_err)?;
    file.flush().map_err(io_err)?;
    let script = file.into_temp_path();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o700)).map_err(io_err)?;
    }
    let cmd = Cmd::new(script.to_string_lossy()).stdin(current);
    system.idempotent_cmd_output(&cmd)
}
