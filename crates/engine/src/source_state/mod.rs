//! The source state: every managed target and how to produce it
//!
//! [`SourceState::read`] walks the source directory once and builds a map
//! from target-relative path to [`SourceStateEntry`]. The map drives the
//! three operations that touch the destination:
//!
//! - [`SourceState::apply`] and [`SourceState::apply_all`] converge the
//!   destination to the target state through any [`System`]
//! - [`SourceState::post_apply`] removes emptied `remove_` directories
//! - [`SourceState::add`] imports destination entries into the source tree
//!
//! [`System`]: crate::system::System

mod add;
mod apply;
mod read;

pub use add::AddOptions;
pub use apply::{ApplyOptions, ApplyReport, EntryOutcome, ErrorPolicy, PreApplyDecision, PreApplyFn};
pub use read::ReadOptions;

use crate::entry::SourceStateEntry;
use crate::error::{Error, Result};
use crate::patterns::PatternSet;
use crate::processor::ContentProcessor;
use crate::system::System;
use crate::version::Version;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Ignore patterns, one per line
pub const IGNORE_FILE: &str = ".chezmoiignore";
/// Patterns of destination paths to remove, one per line
pub const REMOVE_FILE: &str = ".chezmoiremove";
/// Minimum version required to read the source state
pub const VERSION_FILE: &str = ".chezmoiversion";
/// Shared templates, available to every template by name
pub const TEMPLATES_DIR: &str = ".chezmoitemplates";
/// Stem of template data files, `.chezmoidata.json`, `.toml` or `.yaml`
pub const DATA_NAME: &str = ".chezmoidata";
/// Scripts that have no target directory of their own
pub const SCRIPTS_DIR: &str = ".chezmoiscripts";
/// Names starting with this are reserved for control files
pub(crate) const CONTROL_PREFIX: &str = ".chezmoi";

/// All managed targets and their source entries
pub struct SourceState {
    source_dir: AbsPath,
    dest_dir: AbsPath,
    entries: BTreeMap<RelPath, SourceStateEntry>,
    ignore: PatternSet,
    remove_dirs: BTreeSet<RelPath>,
    processor: Rc<ContentProcessor>,
    data: Value,
    source_system: Rc<dyn System>,
    dest_system: Rc<dyn System>,
    min_version: Option<Version>,
}

impl fmt::Debug for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceState")
            .field("source_dir", &self.source_dir)
            .field("dest_dir", &self.dest_dir)
            .field("entries", &self.entries.len())
            .field("remove_dirs", &self.remove_dirs)
            .field("min_version", &self.min_version)
            .finish_non_exhaustive()
    }
}

impl SourceState {
    /// Root of the source tree
    pub fn source_dir(&self) -> &AbsPath {
        &self.source_dir
    }

    /// Root of the destination
    pub fn dest_dir(&self) -> &AbsPath {
        &self.dest_dir
    }

    /// Template data shared by every template
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Highest version named by any `.chezmoiversion`
    pub fn min_version(&self) -> Option<Version> {
        self.min_version
    }

    /// The source entry for `target_rel`
    pub fn entry(&self, target_rel: &RelPath) -> Option<&SourceStateEntry> {
        self.entries.get(target_rel)
    }

    /// All entries in path order
    pub fn entries(&self) -> impl Iterator<Item = (&RelPath, &SourceStateEntry)> {
        self.entries.iter()
    }

    /// Number of managed targets
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is managed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `target_rel` is ignored by `.chezmoiignore`
    pub fn ignored(&self, target_rel: &RelPath) -> bool {
        self.ignore.includes(target_rel.as_str())
    }

    /// All targets in apply order
    ///
    /// Sorted by script order first, so `before_` scripts come first and
    /// `after_` scripts last, then by path so parents precede children.
    pub fn target_rel_paths(&self) -> Vec<RelPath> {
        let mut paths: Vec<(i32, &RelPath)> = self
            .entries
            .iter()
            .map(|(rel, entry)| (entry.order(), rel))
            .collect();
        paths.sort();
        paths.into_iter().map(|(_, rel)| rel.clone()).collect()
    }

    /// Targets at, below, or above any of `selected`, in apply order
    ///
    /// Managed ancestors are included so their directories exist before
    /// their children are written.
    pub fn select(&self, selected: &[RelPath]) -> Result<Vec<RelPath>> {
        for rel in selected {
            if !self.entries.keys().any(|k| k.starts_with(rel)) {
                return Err(Error::NotManaged { target: rel.clone() });
            }
        }
        Ok(self
            .target_rel_paths()
            .into_iter()
            .filter(|k| selected.iter().any(|rel| k.starts_with(rel) || rel.starts_with(k)))
            .collect())
    }

    /// Template data for one file, with `chezmoi.sourceFile` and
    /// `chezmoi.targetFile` set
    pub(crate) fn file_data(&self, source_rel: &SourceRelPath, target_abs: &AbsPath) -> Value {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            let chezmoi = map
                .entry("chezmoi")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if let Value::Object(chezmoi) = chezmoi {
                chezmoi.insert("sourceFile".to_string(), Value::String(source_rel.to_string()));
                chezmoi.insert("targetFile".to_string(), Value::String(target_abs.to_string()));
            }
        }
        data
    }
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::processor::tests::test_processor;
    use crate::system::RealSystem;
    use crate::version::Version;
    use tempfile::TempDir;

    /// A source and a destination directory under one temporary root
    pub(crate) struct Fixture {
        pub(crate) _temp: TempDir,
        pub(crate) source: AbsPath,
        pub(crate) dest: AbsPath,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = AbsPath::from_path(temp.path()).unwrap();
            let source = root.join_str("source");
            let dest = root.join_str("home");
            std::fs::create_dir_all(source.as_path()).unwrap();
            std::fs::create_dir_all(dest.as_path()).unwrap();
            Fixture {
                _temp: temp,
                source,
                dest,
            }
        }

        /// Write a file below the source directory, creating parents
        pub(crate) fn source_file(&self, rel: &str, contents: &str) {
            write(&self.source.join_str(rel), contents);
        }

        /// Write a file below the destination directory, creating parents
        pub(crate) fn dest_file(&self, rel: &str, contents: &str) {
            write(&self.dest.join_str(rel), contents);
        }

        pub(crate) fn read(&self) -> Result<SourceState> {
            self.read_with(serde_json::json!({}))
        }

        pub(crate) fn read_with(&self, data: Value) -> Result<SourceState> {
            SourceState::read(
                Rc::new(RealSystem),
                Rc::new(RealSystem),
                test_processor(),
                ReadOptions {
                    source_dir: self.source.clone(),
                    dest_dir: self.dest.clone(),
                    data,
                    priority_data: Value::Null,
                    version: Version::new(2, 0, 0),
                },
            )
        }
    }

    fn write(path: &AbsPath, contents: &str) {
        std::fs::create_dir_all(path.as_path().parent().unwrap()).unwrap();
        std::fs::write(path.as_path(), contents).unwrap();
    }

    fn rel(s: &str) -> RelPath {
        RelPath::new(s).unwrap()
    }

    #[test]
    fn test_target_rel_paths_order() {
        let fx = Fixture::new();
        fx.source_file("run_after_zz.sh", "#!/bin/sh\n");
        fx.source_file("run_before_aa.sh", "#!/bin/sh\n");
        fx.source_file("dot_dir/file", "x\n");
        fx.source_file("dot_b", "b\n");
        let state = fx.read().unwrap();
        let order: Vec<String> = state
            .target_rel_paths()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect();
        assert_eq!(order, ["aa.sh", ".b", ".dir", ".dir/file", "zz.sh"]);
    }

    #[test]
    fn test_select_includes_ancestors() {
        let fx = Fixture::new();
        fx.source_file("dot_dir/sub/file", "x\n");
        fx.source_file("dot_dir/other", "y\n");
        fx.source_file("dot_top", "z\n");
        let state = fx.read().unwrap();
        let selected = state.select(&[rel(".dir/sub")]).unwrap();
        assert_eq!(selected, [rel(".dir"), rel(".dir/sub"), rel(".dir/sub/file")]);
        assert!(matches!(
            state.select(&[rel(".missing")]),
            Err(Error::NotManaged { .. })
        ));
    }

    #[test]
    fn test_file_data_sets_file_names() {
        let fx = Fixture::new();
        let state = fx.read_with(serde_json::json!({"chezmoi": {"os": "linux"}})).unwrap();
        let data = state.file_data(
            &SourceRelPath::new("dot_x.tmpl").unwrap(),
            &fx.dest.join_str(".x"),
        );
        assert_eq!(data["chezmoi"]["os"], "linux");
        assert_eq!(data["chezmoi"]["sourceFile"], "dot_x.tmpl");
        assert_eq!(data["chezmoi"]["targetFile"], fx.dest.join_str(".x").to_string());
    }
}
