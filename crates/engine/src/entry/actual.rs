//! What currently exists at a destination path

use crate::entry_state::{EntryState, EntryStateType};
use crate::error::Result;
use crate::hash::hash_content;
use crate::lazy::LazyContents;
use crate::system::{FileKind, System, lstat_opt};
use hearth_core::path::AbsPath;

/// The state of one destination path, read with `lstat`
#[derive(Debug, Clone)]
pub enum ActualStateEntry {
    /// Nothing exists
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
        /// Current contents
        contents: LazyContents,
    },
    /// A symbolic link
    Symlink {
        /// Link target
        linkname: String,
    },
}

impl ActualStateEntry {
    /// Read the entry at `path`
    ///
    /// Special files (sockets, devices) read as empty files.
    pub fn read(system: &dyn System, path: &AbsPath) -> Result<Self> {
        let Some(info) = lstat_opt(system, path)? else {
            return Ok(ActualStateEntry::Absent);
        };
        Ok(match info.kind {
            FileKind::Dir => ActualStateEntry::Dir { perm: info.perm },
            FileKind::File => ActualStateEntry::File {
                perm: info.perm,
                contents: LazyContents::from_bytes(system.read_file(path)?),
            },
            FileKind::Symlink => ActualStateEntry::Symlink {
                linkname: system.readlink(path)?,
            },
            FileKind::Other => ActualStateEntry::File {
                perm: info.perm,
                contents: LazyContents::default(),
            },
        })
    }

    /// Whether nothing exists
    pub fn is_absent(&self) -> bool {
        matches!(self, ActualStateEntry::Absent)
    }

    /// Snapshot for comparison with target and last-written states
    pub fn entry_state(&self) -> Result<EntryState> {
        Ok(match self {
            ActualStateEntry::Absent => EntryState::absent(),
            ActualStateEntry::Dir { perm } => EntryState::new(EntryStateType::Dir, *perm),
            ActualStateEntry::File { perm, contents } => EntryState::new(EntryStateType::File, *perm)
                .with_sha256(contents.contents_sha256()?)
                .with_contents(contents.contents()?.to_vec()),
            ActualStateEntry::Symlink { linkname } => EntryState::new(EntryStateType::Symlink, 0)
                .with_sha256(hash_content(linkname.as_bytes()))
                .with_contents(linkname.as_bytes().to_vec()),
        })
    }

    /// Remove whatever is there
    pub fn remove(&self, system: &dyn System, path: &AbsPath) -> Result<()> {
        if self.is_absent() {
            return Ok(());
        }
        system.remove_all(path)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::system::RealSystem;
    use tempfile::TempDir;

    #[test]
    fn test_read_kinds() {
        let temp = TempDir::new().unwrap();
        let root = AbsPath::from_path(temp.path()).unwrap();
        let file = root.join_str("file");
        let link = root.join_str("link");
        RealSystem.write_file(&file, b"data", 0o640).unwrap();
        RealSystem.write_symlink("file", &link).unwrap();

        assert!(ActualStateEntry::read(&RealSystem, &root.join_str("missing")).unwrap().is_absent());
        assert!(matches!(
            ActualStateEntry::read(&RealSystem, &root).unwrap(),
            ActualStateEntry::Dir { .. }
        ));

        let actual = ActualStateEntry::read(&RealSystem, &file).unwrap();
        let state = actual.entry_state().unwrap();
        assert_eq!(state.kind, EntryStateType::File);
        assert_eq!(state.mode, 0o640);
        assert_eq!(state.contents_sha256, Some(hash_content(b"data")));

        let actual = ActualStateEntry::read(&RealSystem, &link).unwrap();
        assert!(matches!(actual, ActualStateEntry::Symlink { ref linkname } if linkname == "file"));
        actual.remove(&RealSystem, &link).unwrap();
        assert!(ActualStateEntry::read(&RealSystem, &link).unwrap().is_absent());
    }
}
