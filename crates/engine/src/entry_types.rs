//! Filtering entries by type
//!
//! Commands accept `--include` and `--exclude` lists such as
//! `files,symlinks` or `all,noscripts`.

use crate::attr::{ScriptCondition, SourceFileType};
use crate::entry::{SourceStateEntry, TargetStateEntry};
use crate::error::{Error, Result};
use std::str::FromStr;

bitflags::bitflags! {
    /// A set of entry types
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EntryTypeSet: u16 {
        /// Directories
        const DIRS = 1 << 0;
        /// Regular, create, and modify files
        const FILES = 1 << 1;
        /// Removals
        const REMOVE = 1 << 2;
        /// Scripts
        const SCRIPTS = 1 << 3;
        /// Symlinks
        const SYMLINKS = 1 << 4;
        /// Encrypted files
        const ENCRYPTED = 1 << 5;
        /// Templates
        const TEMPLATES = 1 << 6;
        /// Scripts that run on every apply
        const ALWAYS = 1 << 7;
    }
}

impl EntryTypeSet {
    fn from_type_name(name: &str) -> Option<Self> {
        Some(match name {
            "all" => Self::all(),
            "none" => Self::empty(),
            "dirs" | "d" => Self::DIRS,
            "files" | "f" => Self::FILES,
            "remove" => Self::REMOVE,
            "scripts" | "s" => Self::SCRIPTS,
            "symlinks" => Self::SYMLINKS,
            "encrypted" => Self::ENCRYPTED,
            "templates" => Self::TEMPLATES,
            "always" => Self::ALWAYS,
            _ => return None,
        })
    }
}

impl FromStr for EntryTypeSet {
    type Err = Error;

    /// Parse a comma-separated list
    ///
    /// A `no` prefix removes a type. A list starting with a removal starts
    /// from every type.
    fn from_str(s: &str) -> Result<Self> {
        let mut set = Self::empty();
        for (i, element) in s.split(',').map(str::trim).filter(|e| !e.is_empty()).enumerate() {
            let (exclude, name) = match element.strip_prefix("no") {
                Some(rest) if Self::from_type_name(element).is_none() => (true, rest),
                _ => (false, element),
            };
            let bits = Self::from_type_name(name).ok_or_else(|| Error::Format {
                format: "entry types",
                message: format!("{element}: unknown entry type"),
            })?;
            if exclude {
                if i == 0 {
                    set = Self::all();
                }
                set.remove(bits);
            } else {
                set.insert(bits);
            }
        }
        Ok(set)
    }
}

/// Include and exclude sets applied to entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryTypeFilter {
    /// Types to include
    pub include: EntryTypeSet,
    /// Types to exclude, taking precedence
    pub exclude: EntryTypeSet,
}

impl Default for EntryTypeFilter {
    fn default() -> Self {
        Self {
            include: EntryTypeSet::all(),
            exclude: EntryTypeSet::empty(),
        }
    }
}

impl EntryTypeFilter {
    /// A filter from include and exclude sets
    pub fn new(include: EntryTypeSet, exclude: EntryTypeSet) -> Self {
        Self { include, exclude }
    }

    /// Whether an entry with base type `base` and modifiers `extra` passes
    fn include_bits(&self, base: EntryTypeSet, extra: EntryTypeSet) -> bool {
        self.include.intersects(base) && !self.exclude.intersects(base) && !self.exclude.intersects(extra)
    }

    /// Whether a source entry passes
    pub fn include_source(&self, entry: &SourceStateEntry) -> bool {
        match entry {
            SourceStateEntry::Dir { attr, .. } if attr.remove => {
                self.include_bits(EntryTypeSet::REMOVE, EntryTypeSet::empty())
            }
            SourceStateEntry::Dir { .. } | SourceStateEntry::RenameDir { .. } => {
                self.include_bits(EntryTypeSet::DIRS, EntryTypeSet::empty())
            }
            SourceStateEntry::Remove { .. } => self.include_bits(EntryTypeSet::REMOVE, EntryTypeSet::empty()),
            SourceStateEntry::File { attr, .. } => {
                let base = match attr.kind {
                    SourceFileType::File | SourceFileType::Create | SourceFileType::Modify => EntryTypeSet::FILES,
                    SourceFileType::Remove => EntryTypeSet::REMOVE,
                    SourceFileType::Script => EntryTypeSet::SCRIPTS,
                    SourceFileType::Symlink => EntryTypeSet::SYMLINKS,
                };
                let mut extra = EntryTypeSet::empty();
                extra.set(EntryTypeSet::ENCRYPTED, attr.encrypted);
                extra.set(EntryTypeSet::TEMPLATES, attr.template);
                extra.set(
                    EntryTypeSet::ALWAYS,
                    attr.kind == SourceFileType::Script && attr.condition == ScriptCondition::Always,
                );
                self.include_bits(base, extra)
            }
        }
    }

    /// Whether a target entry passes
    pub fn include_target(&self, entry: &TargetStateEntry) -> bool {
        let none = EntryTypeSet::empty();
        match entry {
            TargetStateEntry::Absent => self.include_bits(EntryTypeSet::REMOVE, none),
            TargetStateEntry::Dir { .. } | TargetStateEntry::RenameDir { .. } => self.include_bits(EntryTypeSet::DIRS, none),
            TargetStateEntry::File { .. } | TargetStateEntry::Present { .. } => {
                self.include_bits(EntryTypeSet::FILES, none)
            }
            TargetStateEntry::Script { condition, .. } => {
                let extra = if *condition == ScriptCondition::Always {
                    EntryTypeSet::ALWAYS
                } else {
                    none
                };
                self.include_bits(EntryTypeSet::SCRIPTS, extra)
            }
            TargetStateEntry::Symlink { .. } => self.include_bits(EntryTypeSet::SYMLINKS, none),
        }
    }
}
