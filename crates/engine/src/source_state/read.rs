//! Building the source state from the source directory

use super::{
    CONTROL_PREFIX, DATA_NAME, IGNORE_FILE, REMOVE_FILE, SCRIPTS_DIR, SourceState, TEMPLATES_DIR, VERSION_FILE,
};
use crate::attr::{DirAttr, FileAttr, SourceFileType, TEMPLATE_SUFFIX};
use crate::entry::SourceStateEntry;
use crate::error::{Error, Result};
use crate::format::{self, Format};
use crate::lazy::LazyContents;
use crate::patterns::PatternSet;
use crate::processor::ContentProcessor;
use crate::system::{FileKind, System, lstat_opt};
use crate::version::Version;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::rc::Rc;
use tracing::debug;

/// Inputs to [`SourceState::read`]
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Root of the source tree
    pub source_dir: AbsPath,
    /// Root of the destination
    pub dest_dir: AbsPath,
    /// Template data
    pub data: Value,
    /// Data merged over `.chezmoidata` files, usually the configured `[data]`
    pub priority_data: Value,
    /// Version of the running program, checked against `.chezmoiversion`
    pub version: Version,
}

/// Scratch state of one read
struct ReadContext<'a> {
    dest_system: &'a dyn System,
    all: BTreeMap<RelPath, Vec<SourceStateEntry>>,
    removes: Vec<(SourceRelPath, PatternSet)>,
    exact_dirs: Vec<(RelPath, SourceRelPath)>,
    max_version: Option<Version>,
}

impl SourceState {
    /// Read the source state
    ///
    /// `source_system` serves every source read, now and when lazy contents
    /// are evaluated later. `dest_system` is consulted for `.chezmoiremove`
    /// globs and the children of exact directories, and later for the
    /// current contents fed to `modify_` entries.
    ///
    /// A missing source directory reads as an empty state.
    pub fn read(
        source_system: Rc<dyn System>,
        dest_system: Rc<dyn System>,
        mut processor: ContentProcessor,
        options: ReadOptions,
    ) -> Result<Self> {
        let ReadOptions {
            source_dir,
            dest_dir,
            mut data,
            priority_data,
            version,
        } = options;

        let exists = lstat_opt(&*source_system, &source_dir)?.is_some();
        if exists {
            let templates_dir = source_dir.join_str(TEMPLATES_DIR);
            read_templates(&*source_system, &templates_dir, &RelPath::empty(), &mut processor)?;
            // Every template sees the same data, so it is complete before the walk
            read_data(&*source_system, &source_dir, &mut data)?;
            merge_value(&mut data, priority_data);
        } else {
            debug!(source_dir = %source_dir, "source directory does not exist");
        }

        let mut state = SourceState {
            source_dir,
            dest_dir,
            entries: BTreeMap::new(),
            ignore: PatternSet::new(),
            remove_dirs: BTreeSet::new(),
            processor: Rc::new(processor),
            data,
            source_system,
            dest_system: Rc::clone(&dest_system),
            min_version: None,
        };
        if !exists {
            return Ok(state);
        }

        let mut cx = ReadContext {
            dest_system: &*dest_system,
            all: BTreeMap::new(),
            removes: Vec::new(),
            exact_dirs: Vec::new(),
            max_version: None,
        };
        let root = state.source_dir.clone();
        state.walk(&mut cx, &root, &SourceRelPath::empty(), &RelPath::empty())?;

        if let Some(need) = cx.max_version {
            if need > version {
                return Err(Error::TooOld {
                    have: version.to_string(),
                    need: need.to_string(),
                });
            }
            state.min_version = Some(need);
        }

        state.add_removes(&mut cx)?;
        state.add_exact_removes(&mut cx)?;

        for (target, mut entries) in cx.all {
            if entries.len() > 1 {
                let mut sources: Vec<SourceRelPath> = entries
                    .iter()
                    .filter_map(|e| e.source_rel_path().cloned())
                    .collect();
                sources.sort();
                return Err(Error::DuplicateTarget { target, sources });
            }
            if let Some(entry) = entries.pop() {
                state.entries.insert(target, entry);
            }
        }
        debug!(entries = state.entries.len(), "read source state");
        Ok(state)
    }

    fn walk(
        &mut self,
        cx: &mut ReadContext<'_>,
        dir: &AbsPath,
        source_rel: &SourceRelPath,
        target_rel: &RelPath,
    ) -> Result<()> {
        let infos = self.source_system.read_dir(dir)?;

        // Control files apply to their siblings, so they are read first
        for info in &infos {
            let path = dir.join_str(&info.name);
            let control_rel = source_rel.join_str(&info.name);
            match info.name.as_str() {
                VERSION_FILE => {
                    let version = self.read_version(&path)?;
                    cx.max_version = cx.max_version.max(Some(version));
                }
                name if is_pattern_file(name, IGNORE_FILE) => {
                    let patterns = self.read_patterns(&path, &control_rel, target_rel)?;
                    for (pattern, include) in patterns {
                        self.ignore.add(&pattern, include)?;
                    }
                }
                name if is_pattern_file(name, REMOVE_FILE) => {
                    let mut set = PatternSet::new();
                    for (pattern, include) in self.read_patterns(&path, &control_rel, target_rel)? {
                        set.add(&pattern, include)?;
                    }
                    cx.removes.push((control_rel, set));
                }
                _ => {}
            }
        }

        if let Some(info) = infos.iter().find(|info| info.name == SCRIPTS_DIR) {
            let path = dir.join_str(&info.name);
            let kind = if info.is_symlink() {
                self.source_system.stat(&path)?.kind
            } else {
                info.kind
            };
            if kind != FileKind::Dir {
                return Err(Error::NotDir { path });
            }
            self.read_scripts_dir(
                cx,
                &path,
                &source_rel.join_str(SCRIPTS_DIR),
                &target_rel.join_str(SCRIPTS_DIR),
            )?;
        }

        for info in &infos {
            if info.name.starts_with('.') {
                continue;
            }
            let path = dir.join_str(&info.name);
            let entry_rel = source_rel.join_str(&info.name);
            let kind = if info.is_symlink() {
                self.source_system.stat(&path)?.kind
            } else {
                info.kind
            };
            match kind {
                FileKind::Dir => {
                    let attr = DirAttr::parse(&info.name);
                    let entry_target = target_rel.join_str(&attr.target_name);
                    if self.ignored(&entry_target) {
                        debug!(target = %entry_target, "ignoring directory");
                        continue;
                    }
                    if attr.exact {
                        cx.exact_dirs.push((entry_target.clone(), entry_rel.clone()));
                    }
                    if attr.remove {
                        self.remove_dirs.insert(entry_target.clone());
                    }
                    cx.all.entry(entry_target.clone()).or_default().push(SourceStateEntry::Dir {
                        source_rel_path: entry_rel.clone(),
                        attr,
                    });
                    self.walk(cx, &path, &entry_rel, &entry_target)?;
                }
                FileKind::File => {
                    let attr = FileAttr::parse(&info.name, self.processor.encrypted_suffix());
                    let entry_target = target_rel.join_str(&attr.target_name);
                    if self.ignored(&entry_target) {
                        debug!(target = %entry_target, "ignoring file");
                        continue;
                    }
                    let entry = self.file_entry(&path, entry_rel, attr, &entry_target)?;
                    cx.all.entry(entry_target).or_default().push(entry);
                }
                FileKind::Symlink | FileKind::Other => {
                    return Err(Error::UnsupportedFileType { path });
                }
            }
        }
        Ok(())
    }

    /// Read the scripts below a scripts directory
    ///
    /// Only scripts may live there. Their targets sit below the scripts
    /// directory, which never becomes a directory in the destination.
    fn read_scripts_dir(
        &mut self,
        cx: &mut ReadContext<'_>,
        dir: &AbsPath,
        source_rel: &SourceRelPath,
        target_rel: &RelPath,
    ) -> Result<()> {
        for info in self.source_system.read_dir(dir)? {
            let path = dir.join_str(&info.name);
            if info.name.starts_with(CONTROL_PREFIX) {
                return Err(Error::NotAllowed { path, dir: SCRIPTS_DIR });
            }
            if info.name.starts_with('.') {
                continue;
            }
            let entry_rel = source_rel.join_str(&info.name);
            let kind = if info.is_symlink() {
                self.source_system.stat(&path)?.kind
            } else {
                info.kind
            };
            match kind {
                FileKind::Dir => {
                    let attr = DirAttr::parse(&info.name);
                    self.read_scripts_dir(cx, &path, &entry_rel, &target_rel.join_str(&attr.target_name))?;
                }
                FileKind::File => {
                    let attr = FileAttr::parse(&info.name, self.processor.encrypted_suffix());
                    if attr.kind != SourceFileType::Script {
                        return Err(Error::NotAScript { path });
                    }
                    let entry_target = target_rel.join_str(&attr.target_name);
                    if self.ignored(&entry_target) {
                        debug!(target = %entry_target, "ignoring script");
                        continue;
                    }
                    let entry = self.file_entry(&path, entry_rel, attr, &entry_target)?;
                    cx.all.entry(entry_target).or_default().push(entry);
                }
                FileKind::Symlink | FileKind::Other => {
                    return Err(Error::UnsupportedFileType { path });
                }
            }
        }
        Ok(())
    }

    fn file_entry(
        &self,
        path: &AbsPath,
        source_rel_path: SourceRelPath,
        attr: FileAttr,
        target_rel: &RelPath,
    ) -> Result<SourceStateEntry> {
        // Syntax errors in plain templates fail the read; encrypted ones can
        // only be checked once decrypted
        if attr.template && !attr.encrypted {
            let text = read_text(&*self.source_system, path)?;
            self.processor.check(&path.to_string(), &text)?;
        }

        let data = if attr.template {
            self.file_data(&source_rel_path, &self.dest_dir.join(target_rel))
        } else {
            Value::Null
        };
        let system = Rc::clone(&self.source_system);
        let processor = Rc::clone(&self.processor);
        let file_path = path.clone();
        let file_attr = attr.clone();
        let contents = LazyContents::new(move || {
            let raw = system.read_file(&file_path)?;
            processor.process(&file_path, raw, &file_attr, &data)
        });
        Ok(SourceStateEntry::File {
            source_rel_path,
            attr,
            contents,
        })
    }

    fn read_version(&self, path: &AbsPath) -> Result<Version> {
        let text = read_text(&*self.source_system, path)?;
        text.trim().parse().map_err(|_| Error::InvalidVersion {
            path: path.clone(),
            value: text.trim().to_string(),
        })
    }

    /// Render a pattern file and parse it into `(pattern, include)` pairs
    ///
    /// Patterns are prefixed with the target path of the directory holding
    /// the file.
    fn read_patterns(
        &self,
        path: &AbsPath,
        control_rel: &SourceRelPath,
        target_rel: &RelPath,
    ) -> Result<Vec<(String, bool)>> {
        let raw = self.source_system.read_file(path)?;
        let data = self.file_data(control_rel, &self.dest_dir.join(target_rel));
        let rendered = self.processor.render(control_rel.as_str(), raw, &data)?;
        let text = String::from_utf8_lossy(&rendered);

        let mut patterns = Vec::new();
        for line in text.lines() {
            let line = line.split_once('#').map_or(line, |(before, _)| before).trim();
            if line.is_empty() {
                continue;
            }
            let (line, include) = match line.strip_prefix('!') {
                Some(rest) => (rest.trim(), false),
                None => (line, true),
            };
            let line = line.trim_start_matches('/');
            let pattern = if target_rel.is_empty() {
                line.to_string()
            } else {
                format!("{target_rel}/{line}")
            };
            patterns.push((pattern, include));
        }
        Ok(patterns)
    }

    fn add_removes(&self, cx: &mut ReadContext<'_>) -> Result<()> {
        let removes = std::mem::take(&mut cx.removes);
        for (control_rel, set) in removes {
            for target in set.glob(cx.dest_system, &self.dest_dir)? {
                if self.ignored(&target) {
                    continue;
                }
                cx.all.entry(target).or_default().push(SourceStateEntry::Remove {
                    source_rel_path: Some(control_rel.clone()),
                });
            }
        }
        Ok(())
    }

    /// Mark destination children of exact directories that the source does
    /// not have
    fn add_exact_removes(&self, cx: &mut ReadContext<'_>) -> Result<()> {
        let exact_dirs = std::mem::take(&mut cx.exact_dirs);
        for (target_rel, source_rel) in exact_dirs {
            let dir = self.dest_dir.join(&target_rel);
            let children = match cx.dest_system.read_dir(&dir) {
                Ok(children) => children,
                Err(e) if e.is_not_found() || e.io_kind() == Some(ErrorKind::NotADirectory) => continue,
                Err(e) => return Err(e),
            };
            for child in children {
                let child_rel = target_rel.join_str(&child.name);
                if cx.all.contains_key(&child_rel) || self.ignored(&child_rel) {
                    continue;
                }
                cx.all.entry(child_rel).or_default().push(SourceStateEntry::Remove {
                    source_rel_path: Some(source_rel.clone()),
                });
            }
        }
        Ok(())
    }
}

/// `.chezmoiignore` or `.chezmoiremove`, optionally with the template suffix
fn is_pattern_file(name: &str, stem: &str) -> bool {
    name.strip_prefix(stem)
        .is_some_and(|rest| rest.is_empty() || rest == TEMPLATE_SUFFIX)
}

/// The format of a `.chezmoidata.<format>` file
fn data_format(name: &str) -> Option<Box<dyn Format>> {
    let extension = name.strip_prefix(DATA_NAME)?.strip_prefix('.')?;
    format::from_name(extension)
}

/// Merge every `.chezmoidata.<format>` file below `dir` into `data`
///
/// Files are merged parents first and in name order, so later files win.
/// Directories starting with `.` are not searched.
fn read_data(system: &dyn System, dir: &AbsPath, data: &mut Value) -> Result<()> {
    let mut subdirs = Vec::new();
    for info in system.read_dir(dir)? {
        let path = dir.join_str(&info.name);
        if let Some(format) = data_format(&info.name) {
            let raw = system.read_file(&path)?;
            let value = format.unmarshal(&raw).map_err(|e| e.context(path.to_string()))?;
            if !value.is_object() {
                return Err(Error::Format {
                    format: format.name(),
                    message: format!("{path}: template data must be a map"),
                });
            }
            debug!(path = %path, "merging template data");
            merge_value(data, value);
        } else if !info.name.starts_with('.') {
            let kind = if info.is_symlink() {
                system.stat(&path)?.kind
            } else {
                info.kind
            };
            if kind == FileKind::Dir {
                subdirs.push(path);
            }
        }
    }
    for subdir in subdirs {
        read_data(system, &subdir, data)?;
    }
    Ok(())
}

/// Deep-merge the object `src` into `dst`
///
/// Nested objects merge, anything else replaces. A `src` that is not an
/// object is ignored.
fn merge_value(dst: &mut Value, src: Value) {
    let Value::Object(src) = src else {
        return;
    };
    if !dst.is_object() {
        *dst = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(dst) = dst {
        for (key, value) in src {
            match dst.get_mut(&key) {
                Some(existing) if existing.is_object() && value.is_object() => merge_value(existing, value),
                _ => {
                    dst.insert(key, value);
                }
            }
        }
    }
}

/// Register every file below `dir` as a shared template named by its path
/// relative to the templates directory
fn read_templates(
    system: &dyn System,
    dir: &AbsPath,
    prefix: &RelPath,
    processor: &mut ContentProcessor,
) -> Result<()> {
    let infos = match system.read_dir(dir) {
        Ok(infos) => infos,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    };
    for info in infos {
        let path = dir.join_str(&info.name);
        let name = prefix.join_str(&info.name);
        let kind = if info.is_symlink() {
            system.stat(&path)?.kind
        } else {
            info.kind
        };
        match kind {
            FileKind::Dir => read_templates(system, &path, &name, processor)?,
            FileKind::File => {
                let text = read_text(system, &path)?;
                debug!(template = %name, "registering shared template");
                processor.add_template(name.as_str(), &text)?;
            }
            FileKind::Symlink | FileKind::Other => return Err(Error::UnsupportedFileType { path }),
        }
    }
    Ok(())
}

fn read_text(system: &dyn System, path: &AbsPath) -> Result<String> {
    String::from_utf8(system.read_file(path)?).map_err(|e| Error::TemplateRender {
        path: path.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::super::tests::Fixture;
    use super::*;
    use serde_json::json;

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn test_missing_source_dir_is_empty() {
        let fx = Fixture::new();
        std::fs::remove_dir(fx.source.as_path()).unwrap();
        assert!(fx.read().unwrap().is_empty());
    }

    #[test]
    fn test_data_files_merge_parents_first() {
        let fx = Fixture::new();
        fx.source_file(".chezmoidata.json", r#"{"git": {"name": "me", "email": "a@x"}}"#);
        fx.source_file(".chezmoidata.toml", "[git]\nemail = \"b@x\"\n");
        fx.source_file("dot_config/.chezmoidata.yaml", "editor: vi\n");
        fx.source_file(".hidden/.chezmoidata.yaml", "editor: emacs\n");
        let state = fx.read_with(json!({"git": {"name": "default"}})).unwrap();

        assert_eq!(state.data()["git"]["name"], "me");
        assert_eq!(state.data()["git"]["email"], "b@x");
        assert_eq!(state.data()["editor"], "vi");
        assert!(state.entries().all(|(r, _)| !r.as_str().contains("chezmoidata")));
    }

    #[test]
    fn test_data_file_must_be_a_map() {
        let fx = Fixture::new();
        fx.source_file(".chezmoidata.json", "[1, 2]");
        assert!(matches!(fx.read(), Err(Error::Format { format: "json", .. })));
    }

    #[test]
    fn test_merge_value() {
        let mut data = json!({"a": {"b": 1, "c": 2}, "d": 3});
        merge_value(&mut data, json!({"a": {"b": 10}, "d": {"e": 4}}));
        assert_eq!(data, json!({"a": {"b": 10, "c": 2}, "d": {"e": 4}}));
        merge_value(&mut data, Value::Null);
        assert_eq!(data["a"]["b"], 10);
    }

    #[test]
    fn test_scripts_dir() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiscripts/run_once_before_install.sh", "#!/bin/sh\n");
        fx.source_file(".chezmoiscripts/linux/run_setup.sh", "#!/bin/sh\n");
        let state = fx.read().unwrap();

        assert!(state.entry(&rel(".chezmoiscripts")).is_none());
        let Some(SourceStateEntry::File { attr, .. }) = state.entry(&rel(".chezmoiscripts/install.sh")) else {
            panic!("expected script");
        };
        assert_eq!(attr.kind, SourceFileType::Script);
        assert!(state.entry(&rel(".chezmoiscripts/linux/setup.sh")).is_some());
        assert_eq!(state.target_rel_paths()[0], rel(".chezmoiscripts/install.sh"));
    }

    #[test]
    fn test_scripts_dir_holds_only_scripts() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiscripts/dot_profile", "x\n");
        assert!(matches!(fx.read(), Err(Error::NotAScript { .. })));

        let fx = Fixture::new();
        fx.source_file(".chezmoiscripts/.chezmoiignore", "x\n");
        assert!(matches!(fx.read(), Err(Error::NotAllowed { dir: ".chezmoiscripts", .. })));
    }

    #[test]
    fn test_pattern_files_accept_template_suffix() {
        assert!(is_pattern_file(".chezmoiignore", IGNORE_FILE));
        assert!(is_pattern_file(".chezmoiignore.tmpl", IGNORE_FILE));
        assert!(!is_pattern_file(".chezmoiignore.bak", IGNORE_FILE));

        let fx = Fixture::new();
        fx.source_file(".chezmoiignore.tmpl", "{{ skipped }}\n");
        fx.source_file("dot_skip", "x\n");
        fx.source_file("dot_keep", "y\n");
        let state = fx.read_with(json!({"skipped": ".skip"})).unwrap();
        assert!(state.entry(&rel(".skip")).is_none());
        assert!(state.entry(&rel(".keep")).is_some());
    }

    #[test]
    fn test_decodes_names() {
        let fx = Fixture::new();
        fx.source_file("private_dot_ssh/config", "Host *\n");
        fx.source_file("executable_dot_local_bin", "#!/bin/sh\n");
        fx.source_file("dot_git/ignored", "x");
        fx.source_file(".git/HEAD", "ref");
        let state = fx.read().unwrap();

        let Some(SourceStateEntry::Dir { attr, .. }) = state.entry(&rel(".ssh")) else {
            panic!("expected dir");
        };
        assert!(attr.private);
        assert!(state.entry(&rel(".ssh/config")).is_some());
        let Some(SourceStateEntry::File { attr, .. }) = state.entry(&rel(".local_bin")) else {
            panic!("expected file");
        };
        assert!(attr.executable);
        assert!(state.entry(&rel(".git/ignored")).is_some());
        assert!(state.entries().all(|(r, _)| !r.as_str().starts_with(".git/HEAD")));
    }

    #[test]
    fn test_ignore_file() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiignore", "# comment\nREADME.md\n*.bak # trailing\n!keep.bak\n");
        fx.source_file("README.md", "docs");
        fx.source_file("a.bak", "a");
        fx.source_file("keep.bak", "k");
        fx.source_file("dot_config/.chezmoiignore", "secret\n");
        fx.source_file("dot_config/secret", "s");
        fx.source_file("dot_config/public", "p");
        let state = fx.read().unwrap();

        assert!(state.entry(&rel("README.md")).is_none());
        assert!(state.entry(&rel("a.bak")).is_none());
        assert!(state.entry(&rel("keep.bak")).is_some());
        assert!(state.entry(&rel(".config/secret")).is_none());
        assert!(state.entry(&rel(".config/public")).is_some());
        assert!(state.ignored(&rel(".config/secret")));
    }

    #[test]
    fn test_ignore_file_is_a_template() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiignore", "{{ host }}.conf\n");
        fx.source_file("work.conf", "w");
        fx.source_file("home.conf", "h");
        let state = fx.read_with(json!({"host": "work"})).unwrap();
        assert!(state.entry(&rel("work.conf")).is_none());
        assert!(state.entry(&rel("home.conf")).is_some());
    }

    #[test]
    fn test_ignored_directory_is_not_descended() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiignore", ".cache\n");
        fx.source_file("dot_cache/a/b", "x");
        let state = fx.read().unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_remove_file() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiremove", ".old*\n");
        fx.dest_file(".oldrc", "old");
        fx.dest_file(".old_profile", "old");
        fx.dest_file(".keep", "keep");
        let state = fx.read().unwrap();

        for target in [".oldrc", ".old_profile"] {
            let Some(SourceStateEntry::Remove { source_rel_path }) = state.entry(&rel(target)) else {
                panic!("expected remove for {target}");
            };
            assert_eq!(source_rel_path.as_ref().unwrap().as_str(), ".chezmoiremove");
        }
        assert!(state.entry(&rel(".keep")).is_none());
    }

    #[test]
    fn test_remove_respects_ignore() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiremove", ".old*\n");
        fx.source_file(".chezmoiignore", ".oldrc\n");
        fx.dest_file(".oldrc", "old");
        let state = fx.read().unwrap();
        assert!(state.entry(&rel(".oldrc")).is_none());
    }

    #[test]
    fn test_exact_dir_removes_unmanaged_children() {
        let fx = Fixture::new();
        fx.source_file("exact_dot_dir/file1", "1");
        fx.dest_file(".dir/file1", "1");
        fx.dest_file(".dir/file3", "3");
        let state = fx.read().unwrap();
        assert!(matches!(state.entry(&rel(".dir/file1")), Some(SourceStateEntry::File { .. })));
        let Some(SourceStateEntry::Remove { source_rel_path }) = state.entry(&rel(".dir/file3")) else {
            panic!("expected remove");
        };
        assert_eq!(source_rel_path.as_ref().unwrap().as_str(), "exact_dot_dir");
    }

    #[test]
    fn test_duplicate_targets() {
        for (a, b) in [
            ("dot_file", "literal_.file"),
            ("run_once_script.sh", "run_script.sh"),
            ("dot_file", "private_dot_file"),
        ] {
            let fx = Fixture::new();
            fx.source_file(a, "x");
            fx.source_file(b, "y");
            let err = fx.read().unwrap_err();
            let Error::DuplicateTarget { sources, .. } = err else {
                panic!("expected duplicate error, got {err}");
            };
            let mut expected = vec![SourceRelPath::new(a).unwrap(), SourceRelPath::new(b).unwrap()];
            expected.sort();
            assert_eq!(sources, expected);
        }
    }

    #[test]
    fn test_duplicate_dirs() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.source.join_str("dot_dir").as_path()).unwrap();
        std::fs::create_dir_all(fx.source.join_str("private_dot_dir").as_path()).unwrap();
        assert!(matches!(fx.read(), Err(Error::DuplicateTarget { .. })));
    }

    #[test]
    fn test_version_gate() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiversion", "1.5.0\n");
        fx.source_file("dot_sub/.chezmoiversion", "1.9.0\n");
        assert_eq!(fx.read().unwrap().min_version(), Some(Version::new(1, 9, 0)));

        fx.source_file(".chezmoiversion", "3.0.0\n");
        let err = fx.read().unwrap_err();
        assert!(matches!(err, Error::TooOld { ref need, .. } if need == "3.0.0"));

        fx.source_file(".chezmoiversion", "soon\n");
        assert!(matches!(fx.read(), Err(Error::InvalidVersion { .. })));
    }

    #[test]
    fn test_template_syntax_checked_eagerly() {
        let fx = Fixture::new();
        fx.source_file("dot_broken.tmpl", "{{ oops\n");
        assert!(matches!(fx.read(), Err(Error::TemplateRender { .. })));
    }

    #[test]
    fn test_template_errors_are_deferred() {
        let fx = Fixture::new();
        fx.source_file("dot_missing.tmpl", "{{ missing }}\n");
        fx.source_file("dot_ok.tmpl", "{{ name }}\n");
        let state = fx.read_with(json!({"name": "me"})).unwrap();

        let Some(entry) = state.entry(&rel(".missing")) else {
            panic!("expected entry");
        };
        assert!(entry.evaluate().is_err());
        let Some(SourceStateEntry::File { contents, attr, .. }) = state.entry(&rel(".ok")) else {
            panic!("expected file");
        };
        assert_eq!(attr.kind, SourceFileType::File);
        assert_eq!(&*contents.contents().unwrap(), b"me\n");
    }

    #[test]
    fn test_shared_templates() {
        let fx = Fixture::new();
        fx.source_file(".chezmoitemplates/part", "shared");
        fx.source_file("dot_x.tmpl", "{% include \"part\" %}\n");
        let state = fx.read().unwrap();
        let Some(SourceStateEntry::File { contents, .. }) = state.entry(&rel(".x")) else {
            panic!("expected file");
        };
        assert_eq!(&*contents.contents().unwrap(), b"shared\n");
    }

    #[test]
    fn test_encrypted_contents_decrypted_lazily() {
        let fx = Fixture::new();
        let ciphertext: String = "secret".chars().rev().collect();
        fx.source_file("encrypted_dot_token.rev", &ciphertext);
        let state = fx.read().unwrap();
        let Some(SourceStateEntry::File { contents, .. }) = state.entry(&rel(".token")) else {
            panic!("expected file");
        };
        assert_eq!(&*contents.contents().unwrap(), b"secret");
    }

    #[test]
    fn test_remove_dirs_collected() {
        let fx = Fixture::new();
        fx.source_file("remove_dot_old/remove_file", "");
        let state = fx.read().unwrap();
        assert!(state.remove_dirs.contains(&rel(".old")));
    }
}
