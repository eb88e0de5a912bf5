//! Desired state of one destination path

use super::actual::ActualStateEntry;
use crate::attr::ScriptCondition;
use crate::entry_state::{EntryState, EntryStateType};
use crate::error::Result;
use crate::hash::{hash_content, to_hex};
use crate::lazy::{LazyContents, LazyLinkname};
use crate::persistent::{ENTRY_STATE_BUCKET, PersistentState, SCRIPT_STATE_BUCKET, ScriptState, get_json, set_json};
use crate::system::System;
use hearth_core::Umask;
use hearth_core::path::{AbsPath, RelPath};

/// Whether contents count as empty: nothing but whitespace
pub(crate) fn is_empty(contents: &[u8]) -> bool {
    contents.iter().all(u8::is_ascii_whitespace)
}

/// The fully resolved desired state of one destination path
///
/// Permission bits are stored before the umask is applied. Every method that
/// compares or writes permissions takes the umask.
#[derive(Debug, Clone)]
pub enum TargetStateEntry {
    /// The path must not exist
    Absent,
    /// A directory
    Dir {
        /// Permission bits
        perm: u32,
    },
    /// A regular file
    File {
        /// Permission bits
        perm: u32,
        /// Desired contents
        contents: LazyContents,
        /// Keep the file even when its contents are empty
        empty: bool,
    },
    /// A file that must exist; its contents are only written on creation
    Present {
        /// Permission bits
        perm: u32,
        /// Initial contents
        contents: LazyContents,
    },
    /// A directory renamed from `old_abs`
    RenameDir {
        /// Current location
        old_abs: AbsPath,
    },
    /// A script to run
    Script {
        /// Target-relative name, used for display and run records
        name: RelPath,
        /// Script body
        contents: LazyContents,
        /// When the script runs
        condition: ScriptCondition,
    },
    /// A symbolic link
    Symlink {
        /// Link target
        linkname: LazyLinkname,
    },
}

impl TargetStateEntry {
    /// Force lazy contents, surfacing any deferred error
    pub fn evaluate(&self) -> Result<()> {
        match self {
            TargetStateEntry::File { contents, .. }
            | TargetStateEntry::Present { contents, .. }
            | TargetStateEntry::Script { contents, .. } => contents.evaluate(),
            TargetStateEntry::Symlink { linkname } => linkname.evaluate(),
            TargetStateEntry::Absent | TargetStateEntry::Dir { .. } | TargetStateEntry::RenameDir { .. } => Ok(()),
        }
    }

    /// Snapshot recorded after a successful apply
    pub fn entry_state(&self, umask: Umask) -> Result<EntryState> {
        Ok(match self {
            TargetStateEntry::Absent => EntryState::absent(),
            TargetStateEntry::Dir { perm } => EntryState::new(EntryStateType::Dir, umask.apply(*perm)),
            TargetStateEntry::File { perm, contents, empty } => {
                let bytes = contents.contents()?;
                if !*empty && is_empty(&bytes) {
                    EntryState::absent()
                } else {
                    EntryState::new(EntryStateType::File, umask.apply(*perm))
                        .with_sha256(contents.contents_sha256()?)
                        .with_contents(bytes.to_vec())
                }
            }
            TargetStateEntry::Present { perm, contents } => {
                EntryState::new(EntryStateType::Present, umask.apply(*perm))
                    .with_sha256(contents.contents_sha256()?)
                    .with_contents(contents.contents()?.to_vec())
            }
            TargetStateEntry::RenameDir { .. } => EntryState::new(EntryStateType::Dir, 0),
            TargetStateEntry::Script { contents, .. } => EntryState::new(EntryStateType::Script, 0)
                .with_sha256(contents.contents_sha256()?)
                .with_contents(contents.contents()?.to_vec()),
            TargetStateEntry::Symlink { linkname } => {
                let linkname = linkname.linkname()?;
                EntryState::new(EntryStateType::Symlink, 0)
                    .with_sha256(hash_content(linkname.as_bytes()))
                    .with_contents(linkname.into_bytes())
            }
        })
    }

    /// Whether `actual` already satisfies this entry
    pub fn equal(&self, actual: &ActualStateEntry, umask: Umask) -> Result<bool> {
        Ok(match (self, actual) {
            (TargetStateEntry::Absent, ActualStateEntry::Absent) => true,
            (TargetStateEntry::Dir { perm }, ActualStateEntry::Dir { perm: actual_perm }) => {
                umask.apply(*perm) == umask.apply(*actual_perm)
            }
            (TargetStateEntry::File { empty: false, contents, .. }, ActualStateEntry::Absent) => {
                is_empty(&contents.contents()?)
            }
            (
                TargetStateEntry::File { perm, contents, empty },
                ActualStateEntry::File {
                    perm: actual_perm,
                    contents: actual_contents,
                },
            ) => {
                !(!*empty && is_empty(&contents.contents()?))
                    && umask.apply(*perm) == umask.apply(*actual_perm)
                    && contents.contents_sha256()? == actual_contents.contents_sha256()?
            }
            (TargetStateEntry::Present { perm, .. }, ActualStateEntry::File { perm: actual_perm, .. }) => {
                umask.apply(*perm) == umask.apply(*actual_perm)
            }
            (TargetStateEntry::Symlink { linkname }, ActualStateEntry::Symlink { linkname: actual }) => {
                linkname.linkname()? == *actual
            }
            _ => false,
        })
    }

    /// Whether a script has nothing to do according to its run history
    pub fn skip_apply(&self, persistent: &dyn PersistentState, target_abs: &AbsPath) -> Result<bool> {
        let TargetStateEntry::Script { contents, condition, .. } = self else {
            return Ok(false);
        };
        match condition {
            ScriptCondition::Always => Ok(false),
            ScriptCondition::Once => {
                let key = to_hex(&contents.contents_sha256()?);
                Ok(get_json::<ScriptState>(persistent, SCRIPT_STATE_BUCKET, key.as_bytes())?.is_some())
            }
            ScriptCondition::OnChange => {
                let last: Option<EntryState> =
                    get_json(persistent, ENTRY_STATE_BUCKET, target_abs.to_slash().as_bytes())?;
                Ok(last.is_some_and(|last| {
                    last.kind == EntryStateType::Script
                        && contents.contents_sha256().ok() == last.contents_sha256
                }))
            }
        }
    }

    /// Converge `target_abs` from `actual` to this state
    ///
    /// Returns whether anything was changed.
    pub fn apply(
        &self,
        system: &dyn System,
        persistent: &dyn PersistentState,
        actual: &ActualStateEntry,
        target_abs: &AbsPath,
        umask: Umask,
    ) -> Result<bool> {
        match self {
            TargetStateEntry::Absent => {
                if actual.is_absent() {
                    return Ok(false);
                }
                actual.remove(system, target_abs)?;
                Ok(true)
            }
            TargetStateEntry::Dir { perm } => {
                let perm = umask.apply(*perm);
                if let ActualStateEntry::Dir { perm: actual_perm } = actual {
                    if umask.apply(*actual_perm) == perm {
                        return Ok(false);
                    }
                    system.chmod(target_abs, perm)?;
                    return Ok(true);
                }
                actual.remove(system, target_abs)?;
                system.mkdir(target_abs, perm)?;
                Ok(true)
            }
            TargetStateEntry::File { perm, contents, empty } => {
                let bytes = contents.contents()?;
                if !*empty && is_empty(&bytes) {
                    return TargetStateEntry::Absent.apply(system, persistent, actual, target_abs, umask);
                }
                let perm = umask.apply(*perm);
                if let ActualStateEntry::File {
                    perm: actual_perm,
                    contents: actual_contents,
                } = actual
                {
                    if actual_contents.contents_sha256()? == contents.contents_sha256()? {
                        if umask.apply(*actual_perm) == perm {
                            return Ok(false);
                        }
                        system.chmod(target_abs, perm)?;
                        return Ok(true);
                    }
                } else {
                    actual.remove(system, target_abs)?;
                }
                system.write_file(target_abs, &bytes, perm)?;
                Ok(true)
            }
            TargetStateEntry::Present { perm, contents } => {
                let perm = umask.apply(*perm);
                if let ActualStateEntry::File { perm: actual_perm, .. } = actual {
                    if umask.apply(*actual_perm) == perm {
                        return Ok(false);
                    }
                    system.chmod(target_abs, perm)?;
                    return Ok(true);
                }
                actual.remove(system, target_abs)?;
                system.write_file(target_abs, &contents.contents()?, perm)?;
                Ok(true)
            }
            TargetStateEntry::RenameDir { old_abs } => {
                system.rename(old_abs, target_abs)?;
                Ok(true)
            }
            TargetStateEntry::Script { name, contents, .. } => {
                if self.skip_apply(persistent, target_abs)? {
                    tracing::debug!(%name, "script already ran with these contents");
                    return Ok(false);
                }
                let bytes = contents.contents()?;
                if is_empty(&bytes) {
                    tracing::debug!(%name, "skipping empty script");
                } else {
                    let dir = target_abs.parent().unwrap_or_else(|| target_abs.clone());
                    system.run_script(name, &dir, &bytes)?;
                }
                let key = to_hex(&contents.contents_sha256()?);
                let state = ScriptState {
                    name: name.to_string(),
                    run_at: chrono::Utc::now(),
                };
                set_json(persistent, SCRIPT_STATE_BUCKET, key.as_bytes(), &state)?;
                Ok(true)
            }
            TargetStateEntry::Symlink { linkname } => {
                let linkname = linkname.linkname()?;
                if let ActualStateEntry::Symlink { linkname: actual } = actual {
                    if *actual == linkname {
                        return Ok(false);
                    }
                }
                actual.remove(system, target_abs)?;
                system.write_symlink(&linkname, target_abs)?;
                Ok(true)
            }
        }
    }
}
