//! Common utilities and types shared across CLI commands

use crate::error::{CommandError, Result};
use anyhow::Context;
use clap::Args;
use hearth_config::Config;
use hearth_core::Umask;
use hearth_core::path::{AbsPath, RelPath};
use hearth_crypto::DebugEncryption;
use hearth_engine::persistent::{
    DebugPersistentState, MockPersistentState, PersistentState, RedbPersistentState,
};
use hearth_engine::system::{DebugSystem, FileKind, ReadOnlySystem, RealSystem, System};
use hearth_engine::{ContentProcessor, EntryTypeFilter, EntryTypeSet, ReadOptions, SourceState, Version};
use hearth_template::{TemplateContext, TemplateEngine};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

/// Absolute source and destination directories
#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    /// Root of the source tree, which may not exist yet
    pub source_dir: AbsPath,
    /// Root of the destination, canonicalized
    pub dest_dir: AbsPath,
}

impl ResolvedPaths {
    /// Resolve both directories
    ///
    /// The destination must exist. A missing source directory reads as an
    /// empty source state, so it only has to be absolute.
    pub fn resolve(source_dir: &Path, dest_dir: &Path) -> Result<Self> {
        let dest = fs::canonicalize(dest_dir)
            .with_context(|| format!("Failed to resolve destination directory {}", dest_dir.display()))?;
        Ok(Self {
            source_dir: resolve_absolute_path(source_dir)?,
            dest_dir: AbsPath::new(dest)?,
        })
    }
}

/// Runtime context for CLI commands
///
/// Built once in [`run`](crate::run) and handed to every command.
pub struct RuntimeContext {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Resolved directories
    pub paths: ResolvedPaths,
    /// Umask for every permission hearth writes
    pub umask: Umask,
    /// Where the persistent state lives
    pub state_path: PathBuf,
    /// The configuration file that was loaded, if any
    pub config_file: Option<PathBuf>,
    /// Wrap systems, state and encryption in logging decorators
    pub debug: bool,
}

impl RuntimeContext {
    /// Build a context from a loaded configuration
    ///
    /// `process_umask` is used unless the configuration sets one.
    pub fn new(config: Config, paths: ResolvedPaths, process_umask: Umask) -> Result<Self> {
        let state_path = config.persistent_state()?;
        let umask = config.umask(process_umask);
        Ok(Self {
            config: Arc::new(config),
            paths,
            umask,
            state_path,
            config_file: None,
            debug: false,
        })
    }

    /// Root of the source tree
    pub fn source_dir(&self) -> &AbsPath {
        &self.paths.source_dir
    }

    /// Root of the destination
    pub fn dest_dir(&self) -> &AbsPath {
        &self.paths.dest_dir
    }

    /// The real filesystem, logged when debugging
    pub fn system(&self) -> Rc<dyn System> {
        if self.debug {
            Rc::new(DebugSystem::new(RealSystem))
        } else {
            Rc::new(RealSystem)
        }
    }

    /// [`Self::system`] refusing every mutation, for commands that only inspect
    pub fn read_only_system(&self) -> Rc<dyn System> {
        Rc::new(ReadOnlySystem::new(self.system()))
    }

    /// Template data: the `chezmoi` defaults with `[data]` merged over them
    pub fn template_data(&self) -> Value {
        TemplateContext::new(self.source_dir().as_path(), self.dest_dir().as_path())
            .with_data(&self.config.data)
            .to_value()
    }

    /// The configured `[data]` alone, which wins over `.chezmoidata` files
    pub fn config_data(&self) -> Value {
        Value::Object(
            self.config
                .data
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// Content processor for the configured encryption
    pub fn processor(&self) -> Result<ContentProcessor> {
        let encryption = self.config.encryption()?;
        let encryption: Box<dyn hearth_core::Encryption> = if self.debug {
            Box::new(DebugEncryption::new(encryption))
        } else {
            encryption
        };
        Ok(ContentProcessor::new(encryption, Box::new(TemplateEngine::new())))
    }

    /// Read the source state, consulting `dest_system` for the destination
    pub fn read_source_state(&self, dest_system: &Rc<dyn System>) -> Result<SourceState> {
        let state = SourceState::read(
            self.system(),
            Rc::clone(dest_system),
            self.processor()?,
            ReadOptions {
                source_dir: self.source_dir().clone(),
                dest_dir: self.dest_dir().clone(),
                data: self.template_data(),
                priority_data: self.config_data(),
                version: Version::current(),
            },
        )?;
        tracing::debug!(entries = state.len(), source = %self.source_dir(), "read source state");
        Ok(state)
    }

    /// Open the persistent state for writing, creating it if needed
    pub fn open_state(&self) -> Result<Box<dyn PersistentState>> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }
        let state = RedbPersistentState::new(&self.state_path)?;
        Ok(self.wrap_state(state))
    }

    /// An in-memory copy of the persistent state
    ///
    /// Commands that must not record anything work on the copy. A missing
    /// state file yields an empty copy.
    pub fn snapshot_state(&self) -> Result<Box<dyn PersistentState>> {
        let snapshot = MockPersistentState::new();
        if self.state_path.is_file() {
            RedbPersistentState::read_only(&self.state_path)?.copy_to(&snapshot)?;
        }
        Ok(self.wrap_state(snapshot))
    }

    fn wrap_state<P: PersistentState + 'static>(&self, state: P) -> Box<dyn PersistentState> {
        if self.debug {
            Box::new(DebugPersistentState::new(state))
        } else {
            Box::new(state)
        }
    }

    /// Target paths for the files named on the command line
    pub fn target_rel_paths(&self, files: &[PathBuf]) -> Result<Vec<RelPath>> {
        files
            .iter()
            .map(|file| {
                let abs = resolve_absolute_path(&expand_tilde(file))?;
                abs.strip_prefix(self.dest_dir())
                    .map_err(|_| CommandError::PathNotUnderDestination {
                        path: abs.into_path_buf(),
                        dest_dir: self.dest_dir().as_path().to_path_buf(),
                    })
            })
            .collect()
    }

    /// Targets to operate on: everything when `files` is empty, otherwise
    /// the named targets with their managed ancestors and descendants
    pub fn selected_targets(&self, state: &SourceState, files: &[PathBuf]) -> Result<Vec<RelPath>> {
        if files.is_empty() {
            return Ok(state.target_rel_paths());
        }
        let rels = self.target_rel_paths(files)?;
        Ok(state.select(&rels)?)
    }
}

/// `--include` and `--exclude` entry type lists
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only these entry types (dirs, files, remove, scripts, symlinks, encrypted, templates, always)
    #[arg(short, long, value_delimiter = ',', value_name = "TYPES")]
    pub include: Vec<String>,

    /// Never these entry types
    #[arg(short = 'x', long, value_delimiter = ',', value_name = "TYPES")]
    pub exclude: Vec<String>,
}

impl FilterArgs {
    /// The entry type filter these lists describe
    pub fn filter(&self) -> Result<EntryTypeFilter> {
        let include = if self.include.is_empty() {
            EntryTypeSet::all()
        } else {
            self.include.join(",").parse()?
        };
        let exclude = if self.exclude.is_empty() {
            EntryTypeSet::empty()
        } else {
            self.exclude.join(",").parse()?
        };
        Ok(EntryTypeFilter::new(include, exclude))
    }
}

/// `path` and everything below it, parents first
///
/// Symlinks are listed but not followed.
pub fn walk(system: &dyn System, path: &AbsPath) -> Result<Vec<AbsPath>> {
    let mut paths = vec![path.clone()];
    let mut i = 0;
    while i < paths.len() {
        let current = paths[i].clone();
        i += 1;
        if system.lstat(&current)?.kind != FileKind::Dir {
            continue;
        }
        let mut children = system.read_dir(&current)?;
        children.sort_by(|a, b| a.name.cmp(&b.name));
        paths.extend(children.iter().map(|child| current.join_str(&child.name)));
    }
    paths.sort_by(|a, b| a.as_path().cmp(b.as_path()));
    Ok(paths)
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    if !path.as_os_str().as_encoded_bytes().starts_with(b"~") {
        return path.to_path_buf();
    }
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };
    match path.to_str() {
        Some("~") => home,
        Some(s) if s.starts_with("~/") => home.join(&s[2..]),
        _ => path.to_path_buf(),
    }
}

/// Make `path` absolute against the current directory
///
/// Existing paths are not canonicalized, so a symlink given on the command
/// line is the symlink itself and not what it points to.
pub fn resolve_absolute_path(path: &Path) -> Result<AbsPath> {
    if path.is_absolute() {
        return Ok(AbsPath::new(path.to_path_buf())?);
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(AbsPath::new(cwd.join(path))?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> RuntimeContext {
        let source = temp.path().join("source");
        let dest = temp.path().join("home");
        fs::create_dir_all(&dest).unwrap();
        let config = Config {
            persistent_state: Some(temp.path().join("state/hearthstate.redb")),
            ..Config::default()
        };
        let paths = ResolvedPaths::resolve(&source, &dest).unwrap();
        RuntimeContext::new(config, paths, Umask::new(0o022)).unwrap()
    }

    #[test]
    fn test_resolve_requires_dest() {
        let temp = TempDir::new().unwrap();
        assert!(ResolvedPaths::resolve(&temp.path().join("s"), &temp.path().join("missing")).is_err());
        let paths = ResolvedPaths::resolve(&temp.path().join("s"), temp.path()).unwrap();
        assert!(paths.source_dir.as_path().ends_with("s"));
    }

    #[test]
    fn test_configured_umask_wins() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        assert_eq!(ctx.umask, Umask::new(0o022));

        let config = Config {
            umask: Some(Umask::new(0o077)),
            persistent_state: Some(temp.path().join("s.redb")),
            ..Config::default()
        };
        let ctx = RuntimeContext::new(config, ctx.paths.clone(), Umask::new(0o022)).unwrap();
        assert_eq!(ctx.umask, Umask::new(0o077));
    }

    #[test]
    fn test_target_rel_paths() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let inside = ctx.dest_dir().join_str(".config/app").into_path_buf();
        let rels = ctx.target_rel_paths(&[inside]).unwrap();
        assert_eq!(rels[0].as_str(), ".config/app");

        let err = ctx.target_rel_paths(&[PathBuf::from("/etc/hosts")]).unwrap_err();
        assert!(matches!(err, CommandError::PathNotUnderDestination { .. }));
    }

    #[test]
    fn test_template_data_merges_config() {
        let temp = TempDir::new().unwrap();
        let mut ctx = context(&temp);
        let mut config = (*ctx.config).clone();
        config.data.insert("email".to_string(), Value::from("me@example.org"));
        ctx.config = Arc::new(config);

        let data = ctx.template_data();
        assert_eq!(data["email"], "me@example.org");
        assert_eq!(data["chezmoi"]["destDir"], ctx.dest_dir().to_string());
    }

    #[test]
    fn test_read_only_system_refuses_writes() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let path = ctx.dest_dir().join_str(".bashrc");
        assert!(ctx.read_only_system().write_file(&path, b"x", 0o644).is_err());
        assert!(!path.as_path().exists());
    }

    #[test]
    fn test_snapshot_without_state_file() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        let snapshot = ctx.snapshot_state().unwrap();
        assert!(snapshot.buckets().unwrap().is_empty());
        assert!(!ctx.state_path.exists());
    }

    #[test]
    fn test_snapshot_copies_state() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp);
        {
            let state = ctx.open_state().unwrap();
            state.set("entryState", b"/x", b"{}").unwrap();
        }
        let snapshot = ctx.snapshot_state().unwrap();
        assert_eq!(snapshot.get("entryState", b"/x").unwrap().unwrap(), b"{}");
    }

    #[test]
    fn test_filter_args() {
        let args = FilterArgs {
            include: vec!["files".to_string(), "dirs".to_string()],
            exclude: vec!["templates".to_string()],
        };
        let filter = args.filter().unwrap();
        assert_eq!(filter.include, EntryTypeSet::FILES | EntryTypeSet::DIRS);
        assert_eq!(filter.exclude, EntryTypeSet::TEMPLATES);
        assert_eq!(FilterArgs::default().filter().unwrap(), EntryTypeFilter::default());

        let bogus = FilterArgs {
            include: vec!["bogus".to_string()],
            ..FilterArgs::default()
        };
        assert!(bogus.filter().is_err());
    }

    #[test]
    fn test_walk_lists_parents_first() {
        let temp = TempDir::new().unwrap();
        let root = AbsPath::from_path(temp.path()).unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/f"), "x").unwrap();
        fs::write(temp.path().join("a/g"), "y").unwrap();

        let paths: Vec<String> = walk(&RealSystem, &root.join_str("a"))
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_string())
            .collect();
        assert_eq!(paths, ["a", "a/b", "a/b/f", "a/g"]);
    }

    #[test]
    #[serial]
    fn test_expand_tilde() {
        temp_env::with_var("HOME", Some("/home/someone"), || {
            assert_eq!(expand_tilde(Path::new("~/.bashrc")), PathBuf::from("/home/someone/.bashrc"));
            assert_eq!(expand_tilde(Path::new("~")), PathBuf::from("/home/someone"));
            assert_eq!(expand_tilde(Path::new("/tmp/~x")), PathBuf::from("/tmp/~x"));
        });
    }
}
