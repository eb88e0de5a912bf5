//! A system that logs every call

use super::{Cmd, FileInfo, System};
use crate::error::Result;
use hearth_core::path::{AbsPath, RelPath};
use std::time::Instant;

/// Wraps a system and emits a `tracing` debug event for each call
#[derive(Debug, Clone)]
pub struct DebugSystem<S> {
    system: S,
}

impl<S: System> DebugSystem<S> {
    /// Wrap `system`
    pub fn new(system: S) -> Self {
        DebugSystem { system }
    }
}

fn logged<T>(op: &str, path: &dyn std::fmt::Display, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    let result = f();
    match &result {
        Ok(_) => tracing::debug!(op, %path, elapsed = ?start.elapsed(), "system call"),
        Err(e) => tracing::debug!(op, %path, elapsed = ?start.elapsed(), error = %e, "system call failed"),
    }
    result
}

impl<S: System> System for DebugSystem<S> {
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        logged("chmod", path, || self.system.chmod(path, perm))
    }

    fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>> {
        logged("glob", &pattern, || self.system.glob(base, pattern))
    }

    fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
        logged("lstat", path, || self.system.lstat(path))
    }

    fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
        logged("stat", path, || self.system.stat(path))
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        logged("mkdir", path, || self.system.mkdir(path, perm))
    }

    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        self.system.raw_path(path)
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
        logged("read_dir", path, || self.system.read_dir(path))
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        logged("read_file", path, || self.system.read_file(path))
    }

    fn readlink(&self, path: &AbsPath) -> Result<String> {
        logged("readlink", path, || self.system.readlink(path))
    }

    fn remove(&self, path: &AbsPath) -> Result<()> {
        logged("remove", path, || self.system.remove(path))
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        logged("remove_all", path, || self.system.remove_all(path))
    }

    fn rename(&self, old: &AbsPath, new: &AbsPath) -> Result<()> {
        logged("rename", old, || {
            tracing::debug!(%new, "rename target");
            self.system.rename(old, new)
        })
    }

    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        logged("run_cmd", cmd, || self.system.run_cmd(cmd))
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        logged("idempotent_cmd_output", cmd, || self.system.idempotent_cmd_output(cmd))
    }

    fn run_script(&self, name: &RelPath, dir: &AbsPath, data: &[u8]) -> Result<()> {
        logged("run_script", name, || self.system.run_script(name, dir, data))
    }

    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
        logged("write_file", path, || self.system.write_file(path, data, perm))
    }

    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
        logged("write_symlink", newname, || self.system.write_symlink(oldname, newname))
    }
}
