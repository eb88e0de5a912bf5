//! A sink that records the target state as data

use super::{Cmd, FileInfo, RealSystem, System, display_rel, not_found, unsupported};
use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;

/// One recorded entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DumpEntry {
    /// A directory
    Dir {
        /// Target name
        name: String,
        /// Permission bits
        perm: u32,
    },
    /// A regular file
    File {
        /// Target name
        name: String,
        /// Contents, lossily decoded as UTF-8
        contents: String,
        /// Permission bits
        perm: u32,
    },
    /// A script that would be run
    Script {
        /// Target name
        name: String,
        /// Script body
        contents: String,
    },
    /// A symbolic link
    Symlink {
        /// Target name
        name: String,
        /// Link target
        linkname: String,
    },
}

/// Collects every write into a map keyed by path relative to `dir`
///
/// Reads find nothing, so an apply against a dump records the complete
/// target state. Writing the same path twice is an error.
#[derive(Debug)]
pub struct DumpSystem {
    dir: AbsPath,
    entries: RefCell<BTreeMap<String, DumpEntry>>,
}

impl DumpSystem {
    /// An empty dump rooted at `dir`
    pub fn new(dir: AbsPath) -> Self {
        DumpSystem {
            dir,
            entries: RefCell::new(BTreeMap::new()),
        }
    }

    /// The recorded entries, sorted by name
    pub fn into_entries(self) -> BTreeMap<String, DumpEntry> {
        self.entries.into_inner()
    }

    fn insert(&self, path: &AbsPath, make: impl FnOnce(String) -> DumpEntry) -> Result<()> {
        let name = display_rel(path, &self.dir);
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&name) {
            return Err(Error::FileWrite {
                path: path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            });
        }
        entries.insert(name.clone(), make(name));
        Ok(())
    }
}

impl System for DumpSystem {
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        let name = display_rel(path, &self.dir);
        match self.entries.borrow_mut().get_mut(&name) {
            Some(DumpEntry::Dir { perm: p, .. } | DumpEntry::File { perm: p, .. }) => {
                *p = perm;
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn glob(&self, _base: &AbsPath, _pattern: &str) -> Result<Vec<AbsPath>> {
        Ok(Vec::new())
    }

    fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
        Err(not_found(path))
    }

    fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
        Err(not_found(path))
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        self.insert(path, |name| DumpEntry::Dir { name, perm })
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
        Err(not_found(path))
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        Err(not_found(path))
    }

    fn readlink(&self, path: &AbsPath) -> Result<String> {
        Err(not_found(path))
    }

    fn remove(&self, _path: &AbsPath) -> Result<()> {
        Ok(())
    }

    fn remove_all(&self, _path: &AbsPath) -> Result<()> {
        Ok(())
    }

    fn rename(&self, old: &AbsPath, _new: &AbsPath) -> Result<()> {
        Err(unsupported("rename", old))
    }

    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        Err(unsupported("run command in", cmd.dir.as_ref().unwrap_or(&self.dir)))
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        RealSystem.idempotent_cmd_output(cmd)
    }

    fn run_script(&self, name: &RelPath, _dir: &AbsPath, data: &[u8]) -> Result<()> {
        self.insert(&self.dir.join(name), |name| DumpEntry::Script {
            name,
            contents: String::from_utf8_lossy(data).into_owned(),
        })
    }

    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
        self.insert(path, |name| DumpEntry::File {
            name,
            contents: String::from_utf8_lossy(data).into_owned(),
            perm,
        })
    }

    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
        self.insert(newname, |name| DumpEntry::Symlink {
            name,
            linkname: oldname.to_string(),
        })
    }
}
