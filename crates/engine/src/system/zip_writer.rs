//! A sink that writes the target state as a zip archive

use super::{Cmd, FileInfo, RealSystem, System, display_rel, not_found, unsupported};
use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};
use std::cell::RefCell;
use std::io::{Seek, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Appends every write to a zip archive
///
/// Member names are relative to `dir`. Scripts become `0o700` files.
pub struct ZipWriterSystem<W: Write + Seek> {
    writer: RefCell<ZipWriter<W>>,
    dir: AbsPath,
}

fn archive_err(err: impl std::fmt::Display) -> Error {
    Error::Archive(err.to_string())
}

fn options(perm: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(perm)
}

impl<W: Write + Seek> ZipWriterSystem<W> {
    /// A writer producing members relative to `dir`
    pub fn new(writer: W, dir: AbsPath) -> Self {
        ZipWriterSystem {
            writer: RefCell::new(ZipWriter::new(writer)),
            dir,
        }
    }

    /// Write the central directory and return the underlying writer
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().finish().map_err(archive_err)
    }

    fn append_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        let mut writer = self.writer.borrow_mut();
        writer.start_file(name, options(perm)).map_err(archive_err)?;
        writer.write_all(data).map_err(archive_err)
    }
}

impl<W: Write + Seek> System for ZipWriterSystem<W> {
    fn chmod(&self, _path: &AbsPath, _perm: u32) -> Result<()> {
        Ok(())
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
        self.writer
            .borrow_mut()
            .add_directory(display_rel(path, &self.dir), options(perm))
            .map_err(archive_err)
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
        self.append_file(name.as_str(), data, 0o700)
    }

    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
        self.append_file(&display_rel(path, &self.dir), data, perm)
    }

    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
        self.writer
            .borrow_mut()
            .add_symlink(display_rel(newname, &self.dir), oldname, options(0o777))
            .map_err(archive_err)
    }
}
