//! Importing destination entries into the source tree

use super::SourceState;
use crate::attr::{DirAttr, FileAttr, SourceFileType};
use crate::autotemplate::auto_template;
use crate::entry::{ActualStateEntry, SourceStateEntry, TargetStateEntry};
use crate::entry_state::EntryState;
use crate::entry_types::EntryTypeFilter;
use crate::error::{Error, Result};
use crate::lazy::LazyContents;
use crate::persistent::{ENTRY_STATE_BUCKET, NullPersistentState, PersistentState, set_json};
use crate::system::System;
use hearth_core::Umask;
use hearth_core::path::{AbsPath, RelPath, SourceRelPath};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Marker file that keeps an otherwise empty source directory
const KEEP_FILE: &str = ".keep";

/// Options for [`SourceState::add`]
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    /// Replace data values in file contents with template references
    pub autotemplate: bool,
    /// Add files as `create_`
    pub create: bool,
    /// Encrypt file contents
    pub encrypt: bool,
    /// Add directories as `exact_`
    pub exact: bool,
    /// Add files as templates
    pub template: bool,
    /// Which entry types to add
    pub filter: EntryTypeFilter,
    /// Mask for permissions written to the source tree
    pub umask: Umask,
}

/// One change to the source tree, recorded against a destination path
struct Update {
    dest_abs: AbsPath,
    entry_state: EntryState,
    ops: Vec<(SourceRelPath, TargetStateEntry)>,
}

impl SourceState {
    /// Import `dest_abs_paths` into the source tree
    ///
    /// Destination parents that are not yet managed are added too. An entry
    /// that is already managed under a different source name is replaced;
    /// a directory whose encoding changed is renamed in place so its
    /// children follow it. Returns the source paths that were written.
    pub fn add(
        &self,
        source_system: &dyn System,
        persistent: &dyn PersistentState,
        dest_system: &dyn System,
        dest_abs_paths: &[AbsPath],
        options: &AddOptions,
    ) -> Result<Vec<SourceRelPath>> {
        let targets = self.add_targets(dest_abs_paths)?;

        let mut added: BTreeMap<RelPath, SourceRelPath> = BTreeMap::new();
        let mut new_dirs: BTreeSet<SourceRelPath> = BTreeSet::new();
        let mut non_empty_dirs: BTreeSet<SourceRelPath> = BTreeSet::new();
        let mut renames: BTreeMap<SourceRelPath, SourceRelPath> = BTreeMap::new();
        let mut updates = Vec::new();

        for (target_rel, dest_abs) in &targets {
            let parent_source_rel = self.parent_source_rel(target_rel, &added)?;

            let actual = ActualStateEntry::read(dest_system, dest_abs)?;
            let Some(entry) = self.new_source_entry(target_rel, &actual, &parent_source_rel, options)?
            else {
                return Err(crate::system::not_found(dest_abs));
            };
            if !options.filter.include_source(&entry) {
                debug!(target = %target_rel, "excluded by type filter");
                continue;
            }
            let Some(source_rel) = entry.source_rel_path().cloned() else {
                continue;
            };

            let mut ops = Vec::new();
            if let Some(old) = self.entries.get(target_rel) {
                if let Some(old_source_rel) = old.source_rel_path() {
                    if *old_source_rel != source_rel {
                        if matches!(old, SourceStateEntry::Dir { .. }) && matches!(entry, SourceStateEntry::Dir { .. }) {
                            // Children still address the old name until the rename
                            renames.insert(old_source_rel.clone(), source_rel);
                            continue;
                        }
                        ops.push((old_source_rel.clone(), TargetStateEntry::Absent));
                    }
                }
            }

            if matches!(entry, SourceStateEntry::Dir { .. }) {
                new_dirs.insert(source_rel.clone());
            }
            non_empty_dirs.insert(parent_source_rel);
            ops.push((source_rel.clone(), source_target(&entry)));
            added.insert(target_rel.clone(), source_rel);
            updates.push(Update {
                dest_abs: dest_abs.clone(),
                entry_state: actual.entry_state()?,
                ops,
            });
        }

        let mut written: Vec<SourceRelPath> = added.values().cloned().collect();

        for update in &updates {
            for (source_rel, target) in &update.ops {
                self.write_source(source_system, source_rel, target, options.umask)?;
            }
            set_json(
                persistent,
                ENTRY_STATE_BUCKET,
                update.dest_abs.to_slash().as_bytes(),
                &update.entry_state,
            )?;
        }

        for dir in new_dirs.difference(&non_empty_dirs) {
            let keep = dir.join_str(KEEP_FILE);
            self.write_source(source_system, &keep, &empty_file(), options.umask)?;
            written.push(keep);
        }

        // Deepest first, so a renamed parent does not move a pending child
        for (old, new) in renames.into_iter().rev() {
            info!(from = %old, to = %new, "renaming source directory");
            let rename = SourceStateEntry::RenameDir {
                old_source_rel_path: old,
                new_source_rel_path: new.clone(),
            };
            let new_abs = self.source_dir.join_str(new.as_str());
            let target = rename.target_state_entry(source_system, &self.source_dir, &RelPath::empty(), &new_abs)?;
            target.apply(
                source_system,
                &NullPersistentState,
                &ActualStateEntry::Absent,
                &new_abs,
                options.umask,
            )?;
            written.push(new);
        }

        written.sort();
        Ok(written)
    }

    /// Targets to add with their destination paths, parents first
    fn add_targets(&self, dest_abs_paths: &[AbsPath]) -> Result<BTreeMap<RelPath, AbsPath>> {
        let mut targets = BTreeMap::new();
        for dest_abs in dest_abs_paths {
            let target_rel = dest_abs.strip_prefix(&self.dest_dir)?;
            if target_rel.is_empty() {
                return Err(Error::InvalidPathPrefix {
                    path: Arc::new(dest_abs.as_path().to_path_buf()),
                    base: Arc::new(self.dest_dir.as_path().to_path_buf()),
                });
            }
            if self.ignored(&target_rel) {
                debug!(target = %target_rel, "ignored, not adding");
                continue;
            }
            let mut parent = target_rel.parent();
            while let Some(rel) = parent {
                if rel.is_empty() || matches!(self.entries.get(&rel), Some(SourceStateEntry::Dir { .. })) {
                    break;
                }
                parent = rel.parent();
                targets.insert(rel.clone(), self.dest_dir.join(&rel));
            }
            targets.insert(target_rel, dest_abs.clone());
        }
        Ok(targets)
    }

    /// Source directory that holds the entry for `target_rel`
    fn parent_source_rel(
        &self,
        target_rel: &RelPath,
        added: &BTreeMap<RelPath, SourceRelPath>,
    ) -> Result<SourceRelPath> {
        let parent = target_rel.parent().unwrap_or_else(RelPath::empty);
        if parent.is_empty() {
            return Ok(SourceRelPath::empty());
        }
        if let Some(source_rel) = added.get(&parent) {
            return Ok(source_rel.clone());
        }
        match self.entries.get(&parent) {
            Some(SourceStateEntry::Dir { source_rel_path, .. }) => Ok(source_rel_path.clone()),
            _ => Err(Error::NotManaged { target: parent }),
        }
    }

    /// The source entry that reproduces `actual`, or `None` if nothing exists
    fn new_source_entry(
        &self,
        target_rel: &RelPath,
        actual: &ActualStateEntry,
        parent_source_rel: &SourceRelPath,
        options: &AddOptions,
    ) -> Result<Option<SourceStateEntry>> {
        let target_name = target_rel.file_name().unwrap_or_default().to_string();
        let suffix = self.processor.encrypted_suffix();
        Ok(Some(match actual {
            ActualStateEntry::Absent => return Ok(None),
            ActualStateEntry::Dir { perm } => {
                let attr = DirAttr {
                    target_name,
                    exact: options.exact,
                    private: perm & 0o077 == 0,
                    read_only: perm & 0o222 == 0,
                    remove: false,
                };
                SourceStateEntry::Dir {
                    source_rel_path: parent_source_rel.join_str(&attr.source_name()),
                    attr,
                }
            }
            ActualStateEntry::File { perm, contents } => {
                let mut contents = contents.contents()?.to_vec();
                let mut template = options.template;
                if options.autotemplate {
                    let (text, replaced) = auto_template(&String::from_utf8_lossy(&contents), &self.data);
                    if replaced {
                        contents = text.into_bytes();
                        template = true;
                    }
                }
                let attr = FileAttr {
                    target_name,
                    kind: if options.create {
                        SourceFileType::Create
                    } else {
                        SourceFileType::File
                    },
                    empty: contents.is_empty(),
                    encrypted: options.encrypt,
                    executable: perm & 0o111 != 0,
                    private: perm & 0o077 == 0,
                    read_only: perm & 0o222 == 0,
                    template,
                    ..FileAttr::default()
                };
                let source_rel_path = parent_source_rel.join_str(&attr.source_name(suffix));
                if options.encrypt {
                    let source_abs = self.source_dir.join_str(source_rel_path.as_str());
                    contents = self.processor.encrypt(&source_abs, &contents)?;
                }
                SourceStateEntry::File {
                    source_rel_path,
                    attr,
                    contents: LazyContents::from_bytes(contents),
                }
            }
            ActualStateEntry::Symlink { linkname } => {
                let mut linkname = linkname.clone();
                let mut template = options.template;
                if options.autotemplate {
                    let (text, replaced) = auto_template(&linkname, &self.data);
                    if replaced {
                        linkname = text;
                        template = true;
                    }
                }
                let attr = FileAttr {
                    target_name,
                    kind: SourceFileType::Symlink,
                    template,
                    ..FileAttr::default()
                };
                linkname.push('\n');
                SourceStateEntry::File {
                    source_rel_path: parent_source_rel.join_str(&attr.source_name(suffix)),
                    attr,
                    contents: LazyContents::from_bytes(linkname.into_bytes()),
                }
            }
        }))
    }

    /// Converge one source path through `source_system`
    fn write_source(
        &self,
        source_system: &dyn System,
        source_rel: &SourceRelPath,
        target: &TargetStateEntry,
        umask: Umask,
    ) -> Result<()> {
        let source_abs = self.source_dir.join_str(source_rel.as_str());
        let actual = ActualStateEntry::read(source_system, &source_abs)?;
        debug!(path = %source_rel, "writing source entry");
        target.apply(source_system, &NullPersistentState, &actual, &source_abs, umask)?;
        Ok(())
    }
}

/// How a new source entry is laid down in the source tree
///
/// Source files are plain files whatever their target type, so scripts are
/// stored rather than run.
fn source_target(entry: &SourceStateEntry) -> TargetStateEntry {
    match entry {
        SourceStateEntry::Dir { .. } => TargetStateEntry::Dir { perm: 0o777 },
        SourceStateEntry::File { contents, .. } => TargetStateEntry::File {
            perm: 0o666,
            contents: contents.clone(),
            empty: true,
        },
        SourceStateEntry::Remove { .. } | SourceStateEntry::RenameDir { .. } => TargetStateEntry::Absent,
    }
}

fn empty_file() -> TargetStateEntry {
    TargetStateEntry::File {
        perm: 0o666,
        contents: LazyContents::default(),
        empty: true,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use crate::entry_state::EntryStateType;
    use crate::entry_types::EntryTypeSet;
    use crate::persistent::{MockPersistentState, get_json};
    use crate::source_state::tests::Fixture;
    use crate::system::RealSystem;
    use std::os::unix::fs::{PermissionsExt, symlink};

    fn options() -> AddOptions {
        AddOptions {
            umask: Umask::new(0o022),
            ..AddOptions::default()
        }
    }

    fn add(fx: &Fixture, paths: &[&str], options: &AddOptions) -> Result<Vec<String>> {
        add_with(fx, paths, options, &MockPersistentState::new())
    }

    fn add_with(
        fx: &Fixture,
        paths: &[&str],
        options: &AddOptions,
        persistent: &MockPersistentState,
    ) -> Result<Vec<String>> {
        let state = fx.read()?;
        let paths: Vec<AbsPath> = paths.iter().map(|p| fx.dest.join_str(p)).collect();
        let written = state.add(&RealSystem, persistent, &RealSystem, &paths, options)?;
        Ok(written.iter().map(ToString::to_string).collect())
    }

    fn source_exists(fx: &Fixture, rel: &str) -> bool {
        fx.source.join_str(rel).as_path().exists()
    }

    fn chmod(fx: &Fixture, rel: &str, mode: u32) {
        std::fs::set_permissions(fx.dest.join_str(rel).as_path(), std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_add_file() {
        let fx = Fixture::new();
        fx.dest_file(".bashrc", "export A=1\n");
        let persistent = MockPersistentState::new();
        let written = add_with(&fx, &[".bashrc"], &options(), &persistent).unwrap();
        assert_eq!(written, ["dot_bashrc"]);
        let contents = std::fs::read_to_string(fx.source.join_str("dot_bashrc").as_path()).unwrap();
        assert_eq!(contents, "export A=1\n");

        let key = fx.dest.join_str(".bashrc").to_slash();
        let recorded: EntryState = get_json(&persistent, ENTRY_STATE_BUCKET, key.as_bytes()).unwrap().unwrap();
        assert_eq!(recorded.kind, EntryStateType::File);
    }

    #[test]
    fn test_add_attributes_from_mode() {
        let fx = Fixture::new();
        fx.dest_file("run.sh", "#!/bin/sh\n");
        fx.dest_file("secret", "s\n");
        fx.dest_file("locked", "l\n");
        fx.dest_file("blank", "");
        chmod(&fx, "run.sh", 0o755);
        chmod(&fx, "secret", 0o600);
        chmod(&fx, "locked", 0o444);
        let written = add(&fx, &["run.sh", "secret", "locked", "blank"], &options()).unwrap();
        assert_eq!(
            written,
            ["empty_blank", "executable_run.sh", "private_secret", "readonly_locked"]
        );
    }

    #[test]
    fn test_add_creates_missing_parents() {
        let fx = Fixture::new();
        fx.dest_file(".config/nvim/init.lua", "x\n");
        let written = add(&fx, &[".config/nvim/init.lua"], &options()).unwrap();
        assert_eq!(
            written,
            ["dot_config", "dot_config/nvim", "dot_config/nvim/init.lua"]
        );
        assert!(source_exists(&fx, "dot_config/nvim/init.lua"));
    }

    #[test]
    fn test_add_under_managed_parent() {
        let fx = Fixture::new();
        fx.source_file("private_dot_ssh/config", "Host *\n");
        fx.dest_file(".ssh/known_hosts", "h\n");
        let written = add(&fx, &[".ssh/known_hosts"], &options()).unwrap();
        assert_eq!(written, ["private_dot_ssh/known_hosts"]);
    }

    #[test]
    fn test_add_empty_dir_gets_keep() {
        let fx = Fixture::new();
        std::fs::create_dir_all(fx.dest.join_str(".cache").as_path()).unwrap();
        let written = add(&fx, &[".cache"], &options()).unwrap();
        assert_eq!(written, ["dot_cache", "dot_cache/.keep"]);
        assert!(source_exists(&fx, "dot_cache/.keep"));
    }

    #[test]
    fn test_add_exact_dir() {
        let fx = Fixture::new();
        fx.dest_file(".vim/vimrc", "set nu\n");
        let opts = AddOptions {
            exact: true,
            ..options()
        };
        let written = add(&fx, &[".vim", ".vim/vimrc"], &opts).unwrap();
        assert_eq!(written, ["exact_dot_vim", "exact_dot_vim/vimrc"]);
    }

    #[test]
    fn test_add_symlink() {
        let fx = Fixture::new();
        symlink("/etc/hosts", fx.dest.join_str(".hosts").as_path()).unwrap();
        let written = add(&fx, &[".hosts"], &options()).unwrap();
        assert_eq!(written, ["symlink_dot_hosts"]);
        let contents = std::fs::read_to_string(fx.source.join_str("symlink_dot_hosts").as_path()).unwrap();
        assert_eq!(contents, "/etc/hosts\n");
    }

    #[test]
    fn test_add_encrypted() {
        let fx = Fixture::new();
        fx.dest_file(".token", "abc");
        let opts = AddOptions {
            encrypt: true,
            ..options()
        };
        let written = add(&fx, &[".token"], &opts).unwrap();
        assert_eq!(written, ["encrypted_dot_token.rev"]);
        let stored = std::fs::read(fx.source.join_str("encrypted_dot_token.rev").as_path()).unwrap();
        assert_eq!(stored, b"cba");
    }

    #[test]
    fn test_add_autotemplate() {
        let fx = Fixture::new();
        fx.dest_file(".gitconfig", "name = alice\n");
        let opts = AddOptions {
            autotemplate: true,
            ..options()
        };
        let state = fx.read_with(serde_json::json!({"user": "alice"})).unwrap();
        let written = state
            .add(
                &RealSystem,
                &MockPersistentState::new(),
                &RealSystem,
                &[fx.dest.join_str(".gitconfig")],
                &opts,
            )
            .unwrap();
        assert_eq!(written[0].as_str(), "dot_gitconfig.tmpl");
        let contents = std::fs::read_to_string(fx.source.join_str("dot_gitconfig.tmpl").as_path()).unwrap();
        assert_eq!(contents, "name = {{ .user }}\n");
    }

    #[test]
    fn test_add_replaces_old_encoding() {
        let fx = Fixture::new();
        fx.source_file("dot_profile", "old\n");
        fx.dest_file(".profile", "new\n");
        chmod(&fx, ".profile", 0o600);
        let written = add(&fx, &[".profile"], &options()).unwrap();
        assert_eq!(written, ["private_dot_profile"]);
        assert!(!source_exists(&fx, "dot_profile"));
        assert!(source_exists(&fx, "private_dot_profile"));
    }

    #[test]
    fn test_add_renames_reencoded_dir() {
        let fx = Fixture::new();
        fx.source_file("dot_ssh/config", "Host *\n");
        fx.dest_file(".ssh/config", "Host *\n");
        chmod(&fx, ".ssh", 0o700);
        let written = add(&fx, &[".ssh"], &options()).unwrap();
        assert_eq!(written, ["private_dot_ssh"]);
        assert!(!source_exists(&fx, "dot_ssh"));
        assert!(source_exists(&fx, "private_dot_ssh/config"));
    }

    #[test]
    fn test_add_skips_ignored() {
        let fx = Fixture::new();
        fx.source_file(".chezmoiignore", ".cache\n");
        fx.dest_file(".cache", "c\n");
        let written = add(&fx, &[".cache"], &options()).unwrap();
        assert!(written.is_empty());
        assert!(!source_exists(&fx, "dot_cache"));
    }

    #[test]
    fn test_add_filter() {
        let fx = Fixture::new();
        fx.dest_file(".a", "a\n");
        symlink("/x", fx.dest.join_str(".b").as_path()).unwrap();
        let opts = AddOptions {
            filter: EntryTypeFilter::new(EntryTypeSet::all(), EntryTypeSet::SYMLINKS),
            ..options()
        };
        let written = add(&fx, &[".a", ".b"], &opts).unwrap();
        assert_eq!(written, ["dot_a"]);
    }

    #[test]
    fn test_add_missing_path() {
        let fx = Fixture::new();
        let err = add(&fx, &[".nope"], &options()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_add_outside_dest() {
        let fx = Fixture::new();
        let state = fx.read().unwrap();
        let outside = AbsPath::new("/elsewhere/file".into()).unwrap();
        let err = state
            .add(&RealSystem, &MockPersistentState::new(), &RealSystem, &[outside], &options())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPathPrefix { .. }));
    }
}
