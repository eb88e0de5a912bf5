//! A read-only system backed by the contents of an archive

use super::{Cmd, FileInfo, FileKind, RealSystem, System, not_found};
use crate::error::{Error, Result};
use crate::patterns::glob_match;
use flate2::read::GzDecoder;
use hearth_core::path::{AbsPath, RelPath};
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

const MAX_SYMLINK_DEPTH: usize = 40;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Uncompressed tar
    Tar,
    /// Gzip-compressed tar
    TarGz,
    /// Zip
    Zip,
}

impl ArchiveFormat {
    /// Guess the format from a file name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if name.ends_with(".tar") {
            Some(ArchiveFormat::Tar)
        } else if name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }

    /// Parse a format name as given on the command line
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "tar" => Some(ArchiveFormat::Tar),
            "tar.gz" | "tgz" => Some(ArchiveFormat::TarGz),
            "zip" => Some(ArchiveFormat::Zip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir { perm: u32 },
    File { perm: u32, data: Vec<u8> },
    Symlink { linkname: String },
}

impl Node {
    fn info(&self, name: String) -> FileInfo {
        match self {
            Node::Dir { perm } => FileInfo {
                name,
                kind: FileKind::Dir,
                perm: *perm,
                size: 0,
            },
            Node::File { perm, data } => FileInfo {
                name,
                kind: FileKind::File,
                perm: *perm,
                size: data.len() as u64,
            },
            Node::Symlink { linkname } => FileInfo {
                name,
                kind: FileKind::Symlink,
                perm: 0o777,
                size: linkname.len() as u64,
            },
        }
    }
}

/// An archive unpacked into memory and mounted at `dir`
///
/// Directories missing from the archive but implied by its members are
/// created with mode `0o755`. Every mutation fails.
#[derive(Debug)]
pub struct ArchiveReaderSystem {
    dir: AbsPath,
    nodes: BTreeMap<RelPath, Node>,
}

fn archive_err(err: impl std::fmt::Display) -> Error {
    Error::Archive(err.to_string())
}

impl ArchiveReaderSystem {
    /// Read `data` in `format`, dropping the first `strip_components` path
    /// components of every member
    pub fn new(dir: AbsPath, data: &[u8], format: ArchiveFormat, strip_components: usize) -> Result<Self> {
        let mut system = ArchiveReaderSystem {
            dir,
            nodes: BTreeMap::new(),
        };
        system.nodes.insert(RelPath::empty(), Node::Dir { perm: 0o755 });
        match format {
            ArchiveFormat::Tar => system.read_tar(data, strip_components)?,
            ArchiveFormat::TarGz => system.read_tar(GzDecoder::new(data), strip_components)?,
            ArchiveFormat::Zip => system.read_zip(data, strip_components)?,
        }
        Ok(system)
    }

    /// The directory the archive is mounted at
    pub fn dir(&self) -> &AbsPath {
        &self.dir
    }

    fn insert(&mut self, name: &str, strip_components: usize, node: Node) -> Result<()> {
        let components: Vec<&str> = name
            .split('/')
            .filter(|c| !c.is_empty() && *c != ".")
            .skip(strip_components)
            .collect();
        if components.is_empty() {
            return Ok(());
        }
        let rel = RelPath::new(components.join("/")).map_err(archive_err)?;
        let mut parent = rel.parent();
        while let Some(dir) = parent {
            if dir.is_empty() {
                break;
            }
            parent = dir.parent();
            self.nodes.entry(dir).or_insert(Node::Dir { perm: 0o755 });
        }
        self.nodes.insert(rel, node);
        Ok(())
    }

    fn read_tar(&mut self, reader: impl Read, strip_components: usize) -> Result<()> {
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries().map_err(archive_err)? {
            let mut entry = entry.map_err(archive_err)?;
            let name = entry.path().map_err(archive_err)?.to_string_lossy().into_owned();
            let perm = entry.header().mode().map_err(archive_err)? & 0o7777;
            let kind = entry.header().entry_type();
            let node = if kind.is_dir() {
                Node::Dir { perm }
            } else if kind.is_symlink() {
                let linkname = entry
                    .link_name()
                    .map_err(archive_err)?
                    .map(|l| l.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Node::Symlink { linkname }
            } else if kind.is_file() {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).map_err(archive_err)?;
                Node::File { perm, data }
            } else {
                tracing::debug!(%name, "skipping unsupported archive member");
                continue;
            };
            self.insert(&name, strip_components, node)?;
        }
        Ok(())
    }

    fn read_zip(&mut self, data: &[u8], strip_components: usize) -> Result<()> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).map_err(archive_err)?;
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(archive_err)?;
            let name = file.name().to_string();
            let perm = file.unix_mode().map_or(0o644, |m| m & 0o7777);
            let node = if file.is_dir() {
                Node::Dir { perm }
            } else {
                let mut data = Vec::new();
                file.read_to_end(&mut data).map_err(archive_err)?;
                if file.is_symlink() {
                    Node::Symlink {
                        linkname: String::from_utf8_lossy(&data).into_owned(),
                    }
                } else {
                    Node::File { perm, data }
                }
            };
            self.insert(&name, strip_components, node)?;
        }
        Ok(())
    }

    fn rel(&self, path: &AbsPath) -> Result<RelPath> {
        path.strip_prefix(&self.dir).map_err(|_| not_found(path))
    }

    fn node(&self, path: &AbsPath) -> Result<(RelPath, &Node)> {
        let rel = self.rel(path)?;
        match self.nodes.get(&rel) {
            Some(node) => Ok((rel, node)),
            None => Err(not_found(path)),
        }
    }

    fn read_only(op: &'static str, path: &AbsPath) -> Error {
        Error::ReadOnly {
            op,
            path: path.clone(),
        }
    }
}

impl System for ArchiveReaderSystem {
    fn chmod(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(Self::read_only("chmod", path))
    }

    fn glob(&self, base: &AbsPath, pattern: &str) -> Result<Vec<AbsPath>> {
        let pattern = glob::Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.msg.to_string(),
        })?;
        Ok(self
            .nodes
            .keys()
            .map(|rel| self.dir.join(rel))
            .filter_map(|abs| {
                let rel = abs.strip_prefix(base).ok()?;
                (!rel.is_empty() && glob_match(&pattern, rel.as_str())).then_some(abs)
            })
            .collect())
    }

    fn lstat(&self, path: &AbsPath) -> Result<FileInfo> {
        let (rel, node) = self.node(path)?;
        Ok(node.info(rel.file_name().unwrap_or_default().to_string()))
    }

    fn stat(&self, path: &AbsPath) -> Result<FileInfo> {
        let mut current = path.clone();
        for _ in 0..MAX_SYMLINK_DEPTH {
            let (rel, node) = self.node(&current)?;
            let Node::Symlink { linkname } = node else {
                return Ok(node.info(rel.file_name().unwrap_or_default().to_string()));
            };
            current = if linkname.starts_with('/') {
                AbsPath::new(linkname.into())?
            } else {
                current.parent().unwrap_or_else(|| self.dir.clone()).join_str(linkname)
            };
        }
        Err(not_found(path))
    }

    fn mkdir(&self, path: &AbsPath, _perm: u32) -> Result<()> {
        Err(Self::read_only("mkdir", path))
    }

    fn read_dir(&self, path: &AbsPath) -> Result<Vec<FileInfo>> {
        let (rel, node) = self.node(path)?;
        if !matches!(node, Node::Dir { .. }) {
            return Err(Error::DirectoryRead {
                path: path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotADirectory),
            });
        }
        Ok(self
            .nodes
            .iter()
            .filter(|(child, _)| !child.is_empty() && child.parent().as_ref() == Some(&rel))
            .map(|(child, node)| node.info(child.file_name().unwrap_or_default().to_string()))
            .collect())
    }

    fn read_file(&self, path: &AbsPath) -> Result<Vec<u8>> {
        match self.node(path)? {
            (_, Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(Error::FileRead {
                path: path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            }),
        }
    }

    fn readlink(&self, path: &AbsPath) -> Result<String> {
        match self.node(path)? {
            (_, Node::Symlink { linkname }) => Ok(linkname.clone()),
            _ => Err(Error::FileRead {
                path: path.clone(),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            }),
        }
    }

    fn remove(&self, path: &AbsPath) -> Result<()> {
        Err(Self::read_only("remove", path))
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        Err(Self::read_only("remove", path))
    }

    fn rename(&self, old: &AbsPath, _new: &AbsPath) -> Result<()> {
        Err(Self::read_only("rename", old))
    }

    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        Err(Self::read_only("run command in", cmd.dir.as_ref().unwrap_or(&self.dir)))
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        RealSystem.idempotent_cmd_output(cmd)
    }

    fn run_script(&self, _name: &RelPath, dir: &AbsPath, _data: &[u8]) -> Result<()> {
        Err(Self::read_only("run script in", dir))
    }

    fn write_file(&self, path: &AbsPath, _data: &[u8], _perm: u32) -> Result<()> {
        Err(Self::read_only("write", path))
    }

    fn write_symlink(&self, _oldname: &str, newname: &AbsPath) -> Result<()> {
        Err(Self::read_only("symlink", newname))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::system::{TarWriterSystem, ZipWriterSystem};
    use flate2::Compression;
    use flate2::write::GzEncoder;

    fn root() -> AbsPath {
        AbsPath::new("/import".into()).unwrap()
    }

    fn sample_tar() -> Vec<u8> {
        let base = AbsPath::new("/src".into()).unwrap();
        let writer = TarWriterSystem::new(Vec::new(), base.clone());
        writer
            .write_file(&base.join_str("project/.config/app.toml"), b"x = 1\n", 0o600)
            .unwrap();
        writer
            .write_symlink("app.toml", &base.join_str("project/.config/link"))
            .unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ArchiveFormat::from_name("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_name("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_name("a.rar"), None);
    }

    #[test]
    fn test_tar_with_strip_components() {
        let system = ArchiveReaderSystem::new(root(), &sample_tar(), ArchiveFormat::Tar, 1).unwrap();

        let config = root().join_str(".config");
        let info = system.lstat(&config).unwrap();
        assert!(info.is_dir());
        assert_eq!(info.perm, 0o755);

        let names: Vec<_> = system.read_dir(&config).unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["app.toml", "link"]);
        assert_eq!(system.read_file(&config.join_str("app.toml")).unwrap(), b"x = 1\n");
        assert_eq!(system.lstat(&config.join_str("app.toml")).unwrap().perm, 0o600);
        assert_eq!(system.readlink(&config.join_str("link")).unwrap(), "app.toml");
        assert!(system.stat(&config.join_str("link")).unwrap().is_file());
        assert!(system.lstat(&root().join_str("project")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_tar_gz() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, &sample_tar()).unwrap();
        let data = encoder.finish().unwrap();
        let system = ArchiveReaderSystem::new(root(), &data, ArchiveFormat::TarGz, 0).unwrap();
        assert!(system.lstat(&root().join_str("project/.config/app.toml")).unwrap().is_file());
    }

    #[test]
    fn test_zip() {
        let base = AbsPath::new("/src".into()).unwrap();
        let writer = ZipWriterSystem::new(Cursor::new(Vec::new()), base.clone());
        writer.write_file(&base.join_str("bin/tool"), b"#!/bin/sh\n", 0o755).unwrap();
        let data = writer.finish().unwrap().into_inner();

        let system = ArchiveReaderSystem::new(root(), &data, ArchiveFormat::Zip, 0).unwrap();
        assert!(system.lstat(&root().join_str("bin")).unwrap().is_dir());
        assert_eq!(system.lstat(&root().join_str("bin/tool")).unwrap().perm, 0o755);
    }

    #[test]
    fn test_glob_and_read_only() {
        let system = ArchiveReaderSystem::new(root(), &sample_tar(), ArchiveFormat::Tar, 1).unwrap();
        let found = system.glob(&root(), ".config/*").unwrap();
        assert_eq!(found.len(), 2);
        assert!(matches!(
            system.write_file(&root().join_str("x"), b"", 0o644),
            Err(Error::ReadOnly { .. })
        ));
    }
}
