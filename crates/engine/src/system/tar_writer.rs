//! A sink that writes the target state as a tar archive

use super::{Cmd, FileInfo, RealSystem, System, display_rel, not_found, unsupported};
use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};
use std::cell::RefCell;
use std::io::{self, Write};
use tar::{Builder, EntryType, Header};

/// Owner recorded on every archive member
#[derive(Debug, Clone)]
struct Owner {
    uid: u64,
    gid: u64,
    uname: String,
    gname: String,
}

impl Owner {
    fn current() -> Self {
        Owner {
            uid: u64::from(uzers::get_current_uid()),
            gid: u64::from(uzers::get_current_gid()),
            uname: uzers::get_current_username()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            gname: uzers::get_current_groupname()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// Appends every write to a tar stream
///
/// Member names are relative to `dir`. Scripts become `0o700` files.
/// Call [`TarWriterSystem::finish`] to write the end-of-archive marker.
pub struct TarWriterSystem<W: Write> {
    builder: RefCell<Builder<W>>,
    dir: AbsPath,
    owner: Owner,
    mtime: u64,
}

fn archive_err(err: &io::Error) -> Error {
    Error::Archive(err.to_string())
}

impl<W: Write> TarWriterSystem<W> {
    /// A writer producing members relative to `dir`
    pub fn new(writer: W, dir: AbsPath) -> Self {
        TarWriterSystem {
            builder: RefCell::new(Builder::new(writer)),
            dir,
            owner: Owner::current(),
            mtime: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        }
    }

    /// Finish the archive and return the underlying writer
    pub fn finish(self) -> Result<W> {
        self.builder.into_inner().into_inner().map_err(|e| archive_err(&e))
    }

    fn header(&self, kind: EntryType, perm: u32, size: u64) -> Result<Header> {
        let mut header = Header::new_gnu();
        header.set_entry_type(kind);
        header.set_mode(perm);
        header.set_size(size);
        header.set_mtime(self.mtime);
        header.set_uid(self.owner.uid);
        header.set_gid(self.owner.gid);
        header.set_username(&self.owner.uname).map_err(|e| archive_err(&e))?;
        header.set_groupname(&self.owner.gname).map_err(|e| archive_err(&e))?;
        Ok(header)
    }

    fn append_file(&self, name: &str, data: &[u8], perm: u32) -> Result<()> {
        let mut header = self.header(EntryType::Regular, perm, data.len() as u64)?;
        self.builder
            .borrow_mut()
            .append_data(&mut header, name, data)
            .map_err(|e| archive_err(&e))
    }
}

impl<W: Write> System for TarWriterSystem<W> {
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
        let mut header = self.header(EntryType::Directory, perm, 0)?;
        let name = format!("{}/", display_rel(path, &self.dir));
        self.builder
            .borrow_mut()
            .append_data(&mut header, name, io::empty())
            .map_err(|e| archive_err(&e))
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
        let mut header = self.header(EntryType::Symlink, 0o777, 0)?;
        self.builder
            .borrow_mut()
            .append_link(&mut header, display_rel(newname, &self.dir), oldname)
            .map_err(|e| archive_err(&e))
    }
}
