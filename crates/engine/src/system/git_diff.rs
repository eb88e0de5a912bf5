//! A system that reports mutations as a git-style diff

use super::{Cmd, FileInfo, FileKind, System, display_rel, lstat_opt};
use crate::error::Result;
use hearth_core::path::{AbsPath, RelPath};
use similar::TextDiff;
use std::cell::RefCell;
use std::fmt::Write as _;
use std::io::Write;

const MODE_FILE: u32 = 0o100_000;
const MODE_DIR: u32 = 0o040_000;
const MODE_SYMLINK: u32 = 0o120_000;

/// Mode and contents of one side of a diff
type Side = (u32, Vec<u8>);

/// Wraps a system and writes a diff of every mutation before delegating
///
/// Paths in the diff are relative to `dir`. Wrap a [`DryRunSystem`] to
/// preview changes without making them.
///
/// [`DryRunSystem`]: super::DryRunSystem
pub struct GitDiffSystem<S> {
    system: S,
    dir: AbsPath,
    writer: RefCell<Box<dyn Write>>,
}

impl<S: System> GitDiffSystem<S> {
    /// Wrap `system`, writing diffs to `writer`
    pub fn new(system: S, writer: Box<dyn Write>, dir: AbsPath) -> Self {
        GitDiffSystem {
            system,
            dir,
            writer: RefCell::new(writer),
        }
    }

    /// The wrapped system
    pub fn inner(&self) -> &S {
        &self.system
    }

    fn current(&self, path: &AbsPath) -> Result<Option<Side>> {
        let Some(info) = lstat_opt(&self.system, path)? else {
            return Ok(None);
        };
        let data = match info.kind {
            FileKind::File => self.system.read_file(path)?,
            FileKind::Symlink => self.system.readlink(path)?.into_bytes(),
            FileKind::Dir | FileKind::Other => Vec::new(),
        };
        Ok(Some((git_mode(&info), data)))
    }

    fn emit(&self, text: &str) -> Result<()> {
        self.writer.borrow_mut().write_all(text.as_bytes())?;
        Ok(())
    }

    fn write_diff(&self, name: &str, old: Option<&Side>, new: Option<&Side>) -> Result<()> {
        if old == new {
            return Ok(());
        }
        self.emit(&encode_diff(name, old, new))
    }
}

fn git_mode(info: &FileInfo) -> u32 {
    match info.kind {
        FileKind::Dir => MODE_DIR | info.perm,
        FileKind::Symlink => MODE_SYMLINK,
        FileKind::File | FileKind::Other => MODE_FILE | info.perm,
    }
}

fn encode_diff(name: &str, old: Option<&Side>, new: Option<&Side>) -> String {
    let mut out = format!("diff --git a/{name} b/{name}\n");
    match (old, new) {
        (None, Some((mode, _))) => {
            let _ = writeln!(out, "new file mode {mode:06o}");
        }
        (Some((mode, _)), None) => {
            let _ = writeln!(out, "deleted file mode {mode:06o}");
        }
        (Some((old_mode, _)), Some((new_mode, _))) if old_mode != new_mode => {
            let _ = writeln!(out, "old mode {old_mode:06o}\nnew mode {new_mode:06o}");
        }
        _ => {}
    }

    let old_data = old.map_or(&[][..], |(_, data)| data.as_slice());
    let new_data = new.map_or(&[][..], |(_, data)| data.as_slice());
    if old_data == new_data {
        return out;
    }
    let old_label = old.map_or_else(|| "/dev/null".to_string(), |_| format!("a/{name}"));
    let new_label = new.map_or_else(|| "/dev/null".to_string(), |_| format!("b/{name}"));
    match (std::str::from_utf8(old_data), std::str::from_utf8(new_data)) {
        (Ok(old_text), Ok(new_text)) => {
            let diff = TextDiff::from_lines(old_text, new_text);
            let _ = write!(
                out,
                "{}",
                diff.unified_diff()
                    .context_radius(3)
                    .header(&old_label, &new_label)
            );
        }
        _ => {
            let _ = writeln!(out, "Binary files {old_label} and {new_label} differ");
        }
    }
    out
}

impl<S: System> System for GitDiffSystem<S> {
    fn chmod(&self, path: &AbsPath, perm: u32) -> Result<()> {
        if let Some(old) = self.current(path)? {
            let new = ((old.0 & !0o7777) | perm, old.1.clone());
            self.write_diff(&display_rel(path, &self.dir), Some(&old), Some(&new))?;
        }
        self.system.chmod(path, perm)
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

    fn mkdir(&self, path: &AbsPath, perm: u32) -> Result<()> {
        let new = (MODE_DIR | perm, Vec::new());
        self.write_diff(&display_rel(path, &self.dir), None, Some(&new))?;
        self.system.mkdir(path, perm)
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
        let old = self.current(path)?;
        self.write_diff(&display_rel(path, &self.dir), old.as_ref(), None)?;
        self.system.remove(path)
    }

    fn remove_all(&self, path: &AbsPath) -> Result<()> {
        let old = self.current(path)?;
        self.write_diff(&display_rel(path, &self.dir), old.as_ref(), None)?;
        self.system.remove_all(path)
    }

    fn rename(&self, old: &AbsPath, new: &AbsPath) -> Result<()> {
        let from = display_rel(old, &self.dir);
        let to = display_rel(new, &self.dir);
        self.emit(&format!(
            "diff --git a/{from} b/{to}\nsimilarity index 100%\nrename from {from}\nrename to {to}\n"
        ))?;
        self.system.rename(old, new)
    }

    fn run_cmd(&self, cmd: &Cmd) -> Result<()> {
        self.system.run_cmd(cmd)
    }

    fn idempotent_cmd_output(&self, cmd: &Cmd) -> Result<Vec<u8>> {
        self.system.idempotent_cmd_output(cmd)
    }

    fn run_script(&self, name: &RelPath, dir: &AbsPath, data: &[u8]) -> Result<()> {
        let new = (MODE_FILE | 0o755, data.to_vec());
        self.write_diff(name.as_str(), None, Some(&new))?;
        self.system.run_script(name, dir, data)
    }

    fn write_file(&self, path: &AbsPath, data: &[u8], perm: u32) -> Result<()> {
        let old = self.current(path)?;
        let new = (MODE_FILE | perm, data.to_vec());
        self.write_diff(&display_rel(path, &self.dir), old.as_ref(), Some(&new))?;
        self.system.write_file(path, data, perm)
    }

    fn write_symlink(&self, oldname: &str, newname: &AbsPath) -> Result<()> {
        let old = self.current(newname)?;
        let new = (MODE_SYMLINK, oldname.as_bytes().to_vec());
        self.write_diff(&display_rel(newname, &self.dir), old.as_ref(), Some(&new))?;
        self.system.write_symlink(oldname, newname)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::system::{DryRunSystem, RealSystem};
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    #[test]
    fn test_new_file() {
        let diff = encode_diff(".bashrc", None, Some(&(0o100_644, b"a\n".to_vec())));
        assert!(diff.starts_with(
            "diff --git a/.bashrc b/.bashrc\nnew file mode 100644\n--- /dev/null\n+++ b/.bashrc\n"
        ));
        assert!(diff.ends_with("+a\n"));
    }

    #[test]
    fn test_mode_change_only() {
        let diff = encode_diff(
            "bin/x",
            Some(&(0o100_644, b"x".to_vec())),
            Some(&(0o100_755, b"x".to_vec())),
        );
        assert_eq!(diff, "diff --git a/bin/x b/bin/x\nold mode 100644\nnew mode 100755\n");
    }

    #[test]
    fn test_binary() {
        let diff = encode_diff("blob", Some(&(0o100_644, vec![0xff])), Some(&(0o100_644, vec![0xfe])));
        assert!(diff.ends_with("Binary files a/blob and b/blob differ\n"));
    }

    #[test]
    fn test_dry_run_diff_of_existing_file() {
        let temp = TempDir::new().unwrap();
        let root = AbsPath::from_path(temp.path()).unwrap();
        let path = root.join_str(".vimrc");
        RealSystem.write_file(&path, b"one\ntwo\n", 0o644).unwrap();

        let buf = SharedBuf::default();
        let system = GitDiffSystem::new(DryRunSystem::new(RealSystem), Box::new(buf.clone()), root.clone());
        system.write_file(&path, b"one\nthree\n", 0o644).unwrap();
        system.write_file(&path, b"one\ntwo\n", 0o644).unwrap();

        let text = buf.text();
        assert!(text.starts_with("diff --git a/.vimrc b/.vimrc\n--- a/.vimrc\n+++ b/.vimrc\n"));
        assert!(text.contains("-two\n+three\n"));
        assert_eq!(text.matches("diff --git").count(), 1);
        assert!(system.inner().modified());
        assert_eq!(RealSystem.read_file(&path).unwrap(), b"one\ntwo\n");
    }
}
