//! A system that pretends to mutate

use super::{Cmd, FileInfo, System};
use crate::error::Result;
use hearth_core::path::{AbsPath, RelPath};
use std::cell::Cell;

/// Wraps a system and turns every mutation into a successful no-op
///
/// Reads pass through, so layers above see the real current state.
/// [`DryRunSystem::modified`] reports whether any mutation was attempted.
#[derive(Debug)]
pub struct DryRunSystem<S> {
    system: S,
    modified: Cell<bool>,
}

impl<S: System> DryRunSystem<S> {
    /// Wrap `system`
    pub fn new(system: S) -> Self {
        DryRunSystem {
            system,
            modified: Cell::new(false),
        }
    }

    /// Whether any mutating call was made
    pub fn modified(&self) -> bool {
        self.modified.get()
    }

    fn mutate(&self) -> Result<()> {
        self.modified.set(true);
        Ok(())
    }
}

impl<S: System> System for DryRunSystem<S> {
    fn chmod(&self, _path: &AbsPath, _perm: u32) -> Result<()> {
        self.mutate()
    }

    fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>> {
        self.system.glob(base, pattern)
    }

    fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
        self.system.lstat(path)
    }

    fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
        self.system.stat(path)
    }

    fn mkdir(&self, _path: &AbsPath, _perm: u32) -> Result<()> {
        self.mutate()
    }

    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        self.system.raw_path(path)
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
        self.system.read_dir(path)
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        self.system.read_file(path)
    }

    fn readlink(&self, path: &AbsPath) -> Result<String> {
        self.system.readlink(path)
    }

    fn remove(&self, _path: &AbsPath) -> Result<()> {
        self.mutate()
    }

    fn remove_all(&self, _path: &AbsPath) -> Result<()> {
        self.mutate()
    }

    fn rename(&self, _old: &AbsPath, _new: &AbsPath) -> Result<()> {
        self.mutate()
    }

    fn run_cmd(&self, _cmd: &Cmd) -> Result<()> {
        self.mutate()
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        self.system.idempotent_cmd_output(cmd)
    }

    fn run_script(&self, _name: &RelPath, _dir: &AbsPath, _data: &[u8]) -> Result<()> {
        self.mutate()
    }

    fn write_file(&self, _path: &AbsPath, _data: &[u8], _perm: u32) -> Result<()> {
        self.mutate()
    }

    fn write_symlink(&self, _oldname: &str, _newname: &AbsPath) -> Result<()> {
        self.mutate()
    }
}
