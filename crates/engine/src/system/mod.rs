//! System abstraction for filesystem and process operations
//!
//! Every read and every mutation performed while reading, applying, or
//! adding goes through a [`System`]. Backends compose as decorators around
//! [`RealSystem`]:
//!
//! - [`ReadOnlySystem`]: fails every mutation
//! - [`DryRunSystem`]: turns every mutation into a successful no-op
//! - [`GitDiffSystem`]: writes a git-style diff of each mutation
//! - [`DebugSystem`]: logs every call
//!
//! Sinks implement the same trait so one apply algorithm can write an
//! archive or a dump instead of touching the filesystem:
//! [`DumpSystem`], [`TarWriterSystem`], [`ZipWriterSystem`], and the
//! read-only [`ArchiveReaderSystem`].
//!
//! Decorators own the system they wrap. Blanket implementations for `&S`,
//! `Box<S>`, and `Rc<S>` let them wrap borrowed or shared systems too.

mod archive_reader;
mod debug;
mod dry_run;
mod dump;
mod git_diff;
mod read_only;
mod real;
mod tar_writer;
mod zip_writer;

pub use archive_reader::{ArchiveFormat, ArchiveReaderSystem};
pub use debug::DebugSystem;
pub use dry_run::DryRunSystem;
pub use dump::{DumpEntry, DumpSystem};
pub use git_diff::GitDiffSystem;
pub use read_only::ReadOnlySystem;
pub use real::RealSystem;
pub use tar_writer::TarWriterSystem;
pub use zip_writer::ZipWriterSystem;

use crate::error::{Error, Result};
use hearth_core::path::{AbsPath, RelPath};
use std::fmt;
use std::rc::Rc;

/// Kind of a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// A directory
    Dir,
    /// A regular file
    File,
    /// A symbolic link
    Symlink,
    /// Anything else (sockets, devices, ...)
    Other,
}

/// Metadata about one filesystem entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Base name
    pub name: String,
    /// Entry kind
    pub kind: FileKind,
    /// Permission bits
    pub perm: u32,
    /// Size in bytes
    pub size: u64,
}

impl FileInfo {
    /// Whether this is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    /// Whether this is a regular file
    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Whether this is a symbolic link
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// An external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    /// Program to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub dir: Option<AbsPath>,
    /// Bytes fed to standard input
    pub stdin: Option<Vec<u8>>,
}

impl Cmd {
    /// A command with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Cmd {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn dir(mut self, dir: AbsPath) -> Self {
        self.dir = Some(dir);
        self
    }

    /// Set standard input
    #[must_use]
    pub fn stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Capability surface for all filesystem and process operations
pub trait System {
    /// Change the permission bits of `path`
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()>;

    /// Find paths under `base` matching the slash-separated `pattern`
    fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>>;

    /// Metadata of `path`, not following a final symlink
    fn lstat(&self, path: &AbsPath) -> Result<FileInfo>;

    /// Metadata of `path`, following symlinks
    fn stat(&self, path: &AbsPath) -> Result<FileInfo>;

    /// Create a single directory
    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()>;

    /// Resolve `path` through any virtualization
    fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
        Ok(path.clone())
    }

    /// Entries of a directory, sorted by name
    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>>;

    /// Contents of a file
    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>>;

    /// Target of a symlink
    fn readlink(&self, path: &AbsPath) -> Result<String>;

    /// Remove a file or empty directory
    fn remove(&self, path: &AbsPath) -> Result<()>;

    /// Remove `path` and everything below it
    fn remove_all(&self, path: &AbsPath) -> Result<()>;

    /// Rename `old` to `new`
    fn rename(&self, old: &AbsPath, new: &AbsPath) -> Result<()>;

    /// Run a command for its side effects
    fn run_cmd(&self, cmd: &Cmd) -> Result<()>;

    /// Run a command that does not mutate anything and capture its output
    ///
    /// Dry-run and read-only decorators still run these.
    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>>;

    /// Run a script with the given contents in `dir`
    fn run_script(&self, name: &RelPath, dir: &AbsPath, data: &[u8]) -> Result<()>;

    /// Write a file, replacing any existing one
    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()>;

    /// Create a symlink at `newname` pointing to `oldname`
    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()>;
}

macro_rules! forward_system {
    ($($ty:ty),*) => {$(
        impl<S: System + ?Sized> System for $ty {
            fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
                (**self).chmod(path, perm)
            }
            fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>> {
                (**self).glob(base, pattern)
            }
            fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
                (**self).lstat(path)
            }
            fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
                (**self).stat(path)
            }
            fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
                (**self).mkdir(path, perm)
            }
            fn raw_path(&self, path: &AbsPath) -> Result<AbsPath> {
                (**self).raw_path(path)
            }
            fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
                (**self).read_dir(path)
            }
            fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
                (**self).read_file(path)
            }
            fn readlink(&self, path: &AbsPath) -> Result<String> {
                (**self).readlink(path)
            }
            fn remove(&self, path: &AbsPath) -> Result<()> {
                (**self).remove(path)
            }
            fn remove_all(&self, path: &AbsPath) -> Result<()> {
                (**self).remove_all(path)
            }
            fn rename(&self, old: &AbsPath, new: &AbsPath) -> Result<()> {
                (**self).rename(old, new)
            }
            fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
                (**self).run_cmd(cmd)
            }
            fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
                (**self).idempotent_cmd_output(cmd)
            }
            fn run_script(&self, name: &RelPath, dir: &AbsPath, data: &[u8]) -> Result<()> {
                (**self).run_script(name, dir, data)
            }
            fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
                (**self).write_file(path, data, perm)
            }
            fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
                (**self).write_symlink(oldname, newname)
            }
        }
    )*};
}

forward_system!(&S, Box<S>, Rc<S>);

/// The error returned when a sink has nothing at `path`
pub(crate) fn not_found(path: &AbsPath) -> Error {
    Error::Metadata {
        path: path.clone(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    }
}

/// The error returned by sinks for operations they cannot perform
pub(crate) fn unsupported(op: &'static str, path: &AbsPath) -> Error {
    Error::Unsupported {
        op,
        path: path.clone(),
    }
}

/// Metadata of `path`, or `None` if it does not exist
pub fn lstat_opt(system: &dyn System, path: &AbsPath) -> Result<Option<FileInfo>> {
    match system.lstat(path) {
        Ok(info) => Ok(Some(info)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Create `path` and any missing parents
pub fn mkdir_all(system: &dyn System, path: &AbsPath, perm: u32) -> Result<()> {
    match lstat_opt(system, path)? {
        Some(info) if info.is_dir() => return Ok(()),
        Some(_) => {
            return Err(Error::DirectoryCreate {
                path: path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            });
        }
        None => {}
    }
    if let Some(parent) = path.parent() {
        mkdir_all(system, &parent, perm)?;
    }
    system.mkdir(path, perm)
}

/// Path of `path` relative to `base`, falling back to the full path
pub(crate) fn display_rel(path: &AbsPath, base: &AbsPath) -> String {
    path.strip_prefix(base)
        .map_or_else(|_| path.to_slash(), |rel| rel.as_str().to_string())
}
