//! A system that refuses to mutate anything

use super::{Cmd, FileInfo, System};
use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};

/// Wraps a system and fails every mutating call
///
/// Reads and idempotent commands pass through.
#[derive(Debug, Clone)]
pub struct ReadOnlySystem<S> {
    system: S,
}

impl<S: System> ReadOnlySystem<S> {
    /// Wrap `system`
    pub fn new(system: S) -> Self {
        ReadOnlySystem { system }
    }

    /// The wrapped system
    pub fn inner(&self) -> &S {
        &self.system
    }
}

fn read_only(op: &'static str, path: &AbsPath) -> Error {
    Error::ReadOnly {
        op,
        path: path.clone(),
    }
}

impl<S: System> System for ReadOnlySystem<S> {
    fn chmod(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(read_only("chmod", path))
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

    fn mkdir(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(read_only("mkdir", path))
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

    fn remove(&self, path: &AbsPath) -> Result<()> {
        Err(read_only("remove", path))
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        Err(read_only("remove", path))
    }

    fn rename(&self, old: &AbsPath, _new: &AbsPath) -> Result<()> {
        Err(read_only("rename", old))
    }

    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        Err(Error::Command {
            command: cmd.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only system"),
        })
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        self.system.idempotent_cmd_output(cmd)
    }

    fn run_script(&self, _name: &RelPath, dir: &AbsPath, _data: &[u8]) -> Result<()> {
        Err(read_only("run script in", dir))
    }

    fn write_file(&self, path: &AbsPath, _data: &[u8], _perm: u32) -> Result<()> {
        Err(read_only("write", path))
    }

    fn write_symlink(&self, _oldname: &str, newname: &AbsPath) -> Result<()> {
        Err(read_only("symlink", newname))
    }
}
