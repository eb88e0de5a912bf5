//! The real filesystem

use super::{Cmd, FileInfo, FileKind, System};
use crate::error::{Error, Result};
use crate::patterns::glob_match;
use hearth_core::path::{AbsPath, RelPath};
use std::fs::{self, Metadata};
use std::io::Write;
use tracing::warn;
use walkdir::WalkDir;

/// Real filesystem implementation
///
/// Scripts are written to a private (mode 0700), single-use temporary file
/// that is removed on every exit path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealSystem;

impl RealSystem {
    /// Create a new real system
    pub fn new() -> Self {
        RealSystem
    }
}

fn file_info(name: String, metadata: &Metadata) -> FileInfo {
    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        FileKind::Dir
    } else if file_type.is_file() {
        FileKind::File
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else {
        FileKind::Other
    };
    FileInfo {
        name,
        kind,
        perm: perm_of(metadata),
        size: metadata.len(),
    }
}

#[cfg(unix)]
fn perm_of(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn perm_of(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

#[cfg(unix)]
fn set_perm(path: &AbsPath, perm: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path.as_path(), fs::Permissions::from_mode(perm))
}

#[cfg(not(unix))]
fn set_perm(path: &AbsPath, perm: u32) -> std::io::Result<()> {
    let mut permissions = fs::metadata(path.as_path())?.permissions();
    permissions.set_readonly(perm & 0o222 == 0);
    fs::set_permissions(path.as_path(), permissions)
}

fn name_of(path: &AbsPath) -> String {
    path.file_name().unwrap_or_default().to_string()
}

/// The static directory prefix of a glob pattern
fn literal_prefix(pattern: &str) -> &str {
    let end = pattern
        .find(['*', '?', '['])
        .map_or(pattern.len(), |i| pattern[..i].rfind('/').unwrap_or(0));
    &pattern[..end]
}

fn compile(pattern: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

/// One pattern per directory level, or `None` when a `**` segment lets the
/// pattern reach any depth
fn segment_patterns(rest: &str) -> Result<Option<Vec<glob::Pattern>>> {
    if rest.is_empty() {
        return Ok(Some(Vec::new()));
    }
    if rest.split('/').any(|segment| segment.contains("**")) {
        return Ok(None);
    }
    rest.split('/').map(compile).collect::<Result<Vec<_>>>().map(Some)
}

fn duct_cmd(cmd: &Cmd) -> duct::Expression {
    let mut expr = duct::cmd(cmd.program.as_str(), &cmd.args);
    if let Some(dir) = &cmd.dir {
        expr = expr.dir(dir.as_path());
    }
    if let Some(stdin) = &cmd.stdin {
        expr = expr.stdin_bytes(stdin.clone());
    }
    expr
}

impl System for RealSystem {
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        set_perm(path, perm).map_err(|e| Error::Modify {
            op: "chmod",
            path: path.clone(),
            source: e,
        })
    }

    fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>> {
        let compiled = compile(pattern)?;
        let prefix = literal_prefix(pattern);
        let root = base.join_str(prefix);
        if !root.as_path().exists() {
            return Ok(Vec::new());
        }
        let segments = segment_patterns(pattern[prefix.len()..].trim_start_matches('/'))?;

        let walker = WalkDir::new(root.as_path())
            .sort_by_file_name()
            .max_depth(segments.as_ref().map_or(usize::MAX, Vec::len))
            .into_iter()
            .filter_entry(|entry| {
                let Some(segments) = &segments else {
                    return true;
                };
                entry.depth() == 0
                    || segments
                        .get(entry.depth() - 1)
                        .is_some_and(|segment| glob_match(segment, &entry.file_name().to_string_lossy()))
            });

        let mut matches = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = ?e.path(), error = %e, "skipping unreadable path while globbing");
                    continue;
                }
            };
            let path = AbsPath::from_path(entry.path())?;
            let Ok(rel) = path.strip_prefix(base) else {
                continue;
            };
            if !rel.is_empty() && glob_match(&compiled, rel.as_str()) {
                matches.push(path);
            }
        }
        Ok(matches)
    }

    fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
        let metadata = fs::symlink_metadata(path.as_path()).map_err(|e| Error::Metadata {
            path: path.clone(),
            source: e,
        })?;
        Ok(file_info(name_of(path), &metadata))
    }

    fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
        let metadata = fs::metadata(path.as_path()).map_err(|e| Error::Metadata {
            path: path.clone(),
            source: e,
        })?;
        Ok(file_info(name_of(path), &metadata))
    }

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        let create = || -> std::io::Result<()> {
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                fs::DirBuilder::new().mode(perm).create(path.as_path())
            }
            #[cfg(not(unix))]
            {
                let _ = perm;
                fs::create_dir(path.as_path())
            }
        };
        create().map_err(|e| Error::DirectoryCreate {
            path: path.clone(),
            source: e,
        })
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
        let read_err = |e| Error::DirectoryRead {
            path: path.clone(),
            source: e,
        };
        let mut infos = Vec::new();
        for entry in fs::read_dir(path.as_path()).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let metadata = entry.metadata().map_err(read_err)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            infos.push(file_info(name, &metadata));
        }
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        fs::read(path.as_path()).map_err(|e| Error::FileRead {
            path: path.clone(),
            source: e,
        })
    }

    fn readlink(&self, path: &AbsPath) -> Result<String> {
        let target = fs::read_link(path.as_path()).map_err(|e| Error::FileRead {
            path: path.clone(),
            source: e,
        })?;
        Ok(target.to_string_lossy().replace('\\', "/"))
    }

    fn remove(&self, path: &AbsPath) -> Result<()> {
        let metadata = fs::symlink_metadata(path.as_path()).map_err(|e| Error::Metadata {
            path: path.clone(),
            source: e,
        })?;
        let result = if metadata.is_dir() {
            fs::remove_dir(path.as_path())
        } else {
            fs::remove_file(path.as_path())
        };
        result.map_err(|e| Error::Modify {
            op: "remove",
            path: path.clone(),
            source: e,
        })
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        let metadata = match fs::symlink_metadata(path.as_path()) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::Metadata {
                    path: path.clone(),
                    source: e,
                });
            }
        };
        let result = if metadata.is_dir() {
            fs::remove_dir_all(path.as_path())
        } else {
            fs::remove_file(path.as_path())
        };
        result.map_err(|e| Error::Modify {
            op: "remove",
            path: path.clone(),
            source: e,
        })
    }

    fn rename(&self, old: &AbsPath, new: &AbsPath) -> Result<()> {
        fs::rename(old.as_path(), new.as_path()).map_err(|e| Error::Modify {
            op: "rename",
            path: old.clone(),
            source: e,
        })
    }

    #[tracing::instrument(skip(self), fields(cmd = %cmd))]
    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        duct_cmd(cmd)
            .run()
            .map(|_| ())
            .map_err(|e| Error::Command {
                command: cmd.to_string(),
                source: e,
            })
    }

    #[tracing::instrument(skip(self), fields(cmd = %cmd))]
    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        duct_cmd(cmd)
            .stdout_capture()
            .run()
            .map(|output| output.stdout)
            .map_err(|e| Error::Command {
                command: cmd.to_string(),
                source: e,
            })
    }

    #[tracing::instrument(skip(self, data), fields(script = %name))]
    fn run_script(&self, name: &RelPath, dir: &AbsPath, data: &[u8]) -> Result<()> {
        let script_err = |e: std::io::Error| Error::Command {
            command: name.to_string(),
            source: e,
        };

        let suffix = name
            .file_name()
            .and_then(|n| n.rfind('.').map(|i| n[i..].to_string()))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("hearth-script-")
            .suffix(&suffix)
            .tempfile()
            .map_err(script_err)?;
        file.write_all(data).map_err(script_err)?;
        file.flush().map_err(script_err)?;
        // Close the handle so the script can be executed; the path is
        // removed when `script` drops.
        let script = file.into_temp_path();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script, fs::Permissions::from_mode(0o700)).map_err(script_err)?;
        }

        // Run in the nearest existing ancestor of the requested directory.
        let mut work_dir = dir.clone();
        while !work_dir.as_path().is_dir() {
            match work_dir.parent() {
                Some(parent) => work_dir = parent,
                None => break,
            }
        }

        duct::cmd!(script.to_path_buf())
            .dir(work_dir.as_path())
            .run()
            .map(|_| ())
            .map_err(script_err)
    }

    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
        let write_err = |e| Error::FileWrite {
            path: path.clone(),
            source: e,
        };
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(perm);
        }
        let mut file = options.open(path.as_path()).map_err(write_err)?;
        file.write_all(data).map_err(write_err)?;
        // The mode passed to open only applies to new files.
        set_perm(path, perm).map_err(write_err)
    }

    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
        #[cfg(unix)]
        let result = std::os::unix::fs::symlink(oldname, newname.as_path());
        #[cfg(windows)]
        let result = std::os::windows::fs::symlink_file(oldname, newname.as_path());
        result.map_err(|e| Error::FileWrite {
            path: newname.clone(),
            source: e,
        })
    }
}
