//! Source name attribute parsing and encoding
//!
//! Every entry in the source directory encodes its target name and its
//! metadata in its own name. Prefixes are stripped in a fixed order, then a
//! leading `dot_` becomes a literal `.`, and finally the template suffix (and
//! for encrypted files the encryption suffix) is removed.
//!
//! | source name                          | target   | attributes                  |
//! |--------------------------------------|----------|-----------------------------|
//! | `dot_bashrc`                         | `.bashrc`|                             |
//! | `private_executable_dot_x.tmpl`      | `.x`     | private, executable, template |
//! | `exact_dot_config`                   | `.config`| exact directory             |
//! | `run_once_before_install.sh`         | `install.sh` | script, once, order -1  |
//! | `literal_dot_git`                    | `dot_git`|                             |
//!
//! Parsing is total: any name decodes to something. Encoding is the exact
//! inverse, adding `literal_` and `.literal` where a target name would
//! otherwise be mistaken for an attribute.
//!
//! # Examples
//!
//! ```
//! use hearth_engine::attr::{FileAttr, ScriptCondition, SourceFileType};
//!
//! let attr = FileAttr::parse("run_once_before_dot_setup.sh.tmpl", ".age");
//! assert_eq!(attr.kind, SourceFileType::Script);
//! assert_eq!(attr.condition, ScriptCondition::Once);
//! assert_eq!(attr.order, -1);
//! assert!(attr.template);
//! assert_eq!(attr.target_name, ".setup.sh");
//! assert_eq!(attr.source_name(".age"), "run_once_before_dot_setup.sh.tmpl");
//! ```

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub(crate) const AFTER_PREFIX: &str = "after_";
pub(crate) const BEFORE_PREFIX: &str = "before_";
pub(crate) const CREATE_PREFIX: &str = "create_";
pub(crate) const DOT_PREFIX: &str = "dot_";
pub(crate) const EMPTY_PREFIX: &str = "empty_";
pub(crate) const ENCRYPTED_PREFIX: &str = "encrypted_";
pub(crate) const EXACT_PREFIX: &str = "exact_";
pub(crate) const EXECUTABLE_PREFIX: &str = "executable_";
pub(crate) const LITERAL_PREFIX: &str = "literal_";
pub(crate) const MODIFY_PREFIX: &str = "modify_";
pub(crate) const ONCE_PREFIX: &str = "once_";
pub(crate) const ONCHANGE_PREFIX: &str = "onchange_";
pub(crate) const PRIVATE_PREFIX: &str = "private_";
pub(crate) const READONLY_PREFIX: &str = "readonly_";
pub(crate) const REMOVE_PREFIX: &str = "remove_";
pub(crate) const RUN_PREFIX: &str = "run_";
pub(crate) const SYMLINK_PREFIX: &str = "symlink_";

/// Suffix marking a file as a template
pub const TEMPLATE_SUFFIX: &str = ".tmpl";
pub(crate) const LITERAL_SUFFIX: &str = ".literal";

static DIR_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(dot|exact|literal|readonly|private|remove)_").expect("Failed to compile attribute pattern")
});

static FILE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A(after|before|create|dot|empty|encrypted|executable|literal|modify|once|onchange|private|readonly|remove|run|symlink)_",
    )
    .expect("Failed to compile attribute pattern")
});

static FILE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(literal|tmpl)\z").expect("Failed to compile attribute pattern"));

/// What a source file turns into in the target state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceFileType {
    /// `create_`: written only if missing
    Create,
    /// A regular file
    #[default]
    File,
    /// `modify_`: a script that rewrites the current contents
    Modify,
    /// `remove_`: the target must not exist
    Remove,
    /// `run_`: a script executed during apply
    Script,
    /// `symlink_`: contents are the link target
    Symlink,
}

/// When a script runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptCondition {
    /// Every apply
    #[default]
    Always,
    /// Once per distinct contents
    Once,
    /// Whenever the contents differ from the last run
    OnChange,
}

/// Decoded directory attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirAttr {
    /// Name in the destination
    pub target_name: String,
    /// Children not in the source are removed
    pub exact: bool,
    /// No group or other permissions
    pub private: bool,
    /// No write permissions
    pub read_only: bool,
    /// The directory is removed if empty
    pub remove: bool,
}

/// Decoded file attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttr {
    /// Name in the destination
    pub target_name: String,
    /// What the file becomes
    #[serde(rename = "type")]
    pub kind: SourceFileType,
    /// When a script runs
    pub condition: ScriptCondition,
    /// -1 for `before_` scripts, 1 for `after_`, otherwise 0
    pub order: i32,
    /// Kept even when empty
    pub empty: bool,
    /// Contents are encrypted
    pub encrypted: bool,
    /// Executable bits set
    pub executable: bool,
    /// No group or other permissions
    pub private: bool,
    /// No write permissions
    pub read_only: bool,
    /// Contents are a template
    pub template: bool,
}

fn take(name: &mut &str, prefix: &str) -> bool {
    match name.strip_prefix(prefix) {
        Some(rest) => {
            *name = rest;
            true
        }
        None => false,
    }
}

fn decode_dot(name: &str) -> String {
    if let Some(rest) = name.strip_prefix(DOT_PREFIX) {
        format!(".{rest}")
    } else if let Some(rest) = name.strip_prefix(LITERAL_PREFIX) {
        rest.to_string()
    } else {
        name.to_string()
    }
}

fn encode_dot(out: &mut String, target_name: &str, prefix_re: &Regex) {
    if let Some(rest) = target_name.strip_prefix('.') {
        out.push_str(DOT_PREFIX);
        out.push_str(rest);
    } else if prefix_re.is_match(target_name) {
        out.push_str(LITERAL_PREFIX);
        out.push_str(target_name);
    } else {
        out.push_str(target_name);
    }
}

impl DirAttr {
    /// Decode a directory's source name
    ///
    /// ```
    /// use hearth_engine::attr::DirAttr;
    ///
    /// let attr = DirAttr::parse("exact_private_dot_ssh");
    /// assert!(attr.exact && attr.private);
    /// assert_eq!(attr.target_name, ".ssh");
    /// ```
    pub fn parse(source_name: &str) -> Self {
        let mut name = source_name;
        let remove = take(&mut name, REMOVE_PREFIX);
        let exact = take(&mut name, EXACT_PREFIX);
        let private = take(&mut name, PRIVATE_PREFIX);
        let read_only = take(&mut name, READONLY_PREFIX);
        DirAttr {
            target_name: decode_dot(name),
            exact,
            private,
            read_only,
            remove,
        }
    }

    /// Encode back into a source name
    pub fn source_name(&self) -> String {
        let mut out = String::with_capacity(self.target_name.len() + 16);
        if self.remove {
            out.push_str(REMOVE_PREFIX);
        }
        if self.exact {
            out.push_str(EXACT_PREFIX);
        }
        if self.private {
            out.push_str(PRIVATE_PREFIX);
        }
        if self.read_only {
            out.push_str(READONLY_PREFIX);
        }
        encode_dot(&mut out, &self.target_name, &DIR_PREFIX_RE);
        out
    }

    /// Permission bits before the umask is applied
    pub fn perm(&self) -> u32 {
        let mut perm = 0o777;
        if self.private {
            perm &= !0o077;
        }
        if self.read_only {
            perm &= !0o222;
        }
        perm
    }
}

impl FileAttr {
    /// Decode a file's source name
    ///
    /// `encrypted_suffix` is stripped from encrypted files only.
    pub fn parse(source_name: &str, encrypted_suffix: &str) -> Self {
        let mut attr = FileAttr::default();
        let mut name = source_name;

        if take(&mut name, CREATE_PREFIX) {
            attr.kind = SourceFileType::Create;
            attr.encrypted = take(&mut name, ENCRYPTED_PREFIX);
            attr.private = take(&mut name, PRIVATE_PREFIX);
            attr.read_only = take(&mut name, READONLY_PREFIX);
            attr.executable = take(&mut name, EXECUTABLE_PREFIX);
        } else if take(&mut name, REMOVE_PREFIX) {
            attr.kind = SourceFileType::Remove;
        } else if take(&mut name, RUN_PREFIX) {
            attr.kind = SourceFileType::Script;
            if take(&mut name, ONCE_PREFIX) {
                attr.condition = ScriptCondition::Once;
            } else if take(&mut name, ONCHANGE_PREFIX) {
                attr.condition = ScriptCondition::OnChange;
            }
            if take(&mut name, BEFORE_PREFIX) {
                attr.order = -1;
            } else if take(&mut name, AFTER_PREFIX) {
                attr.order = 1;
            }
        } else if take(&mut name, SYMLINK_PREFIX) {
            attr.kind = SourceFileType::Symlink;
        } else if take(&mut name, MODIFY_PREFIX) {
            attr.kind = SourceFileType::Modify;
            attr.encrypted = take(&mut name, ENCRYPTED_PREFIX);
            attr.private = take(&mut name, PRIVATE_PREFIX);
            attr.read_only = take(&mut name, READONLY_PREFIX);
            attr.executable = take(&mut name, EXECUTABLE_PREFIX);
        } else {
            attr.encrypted = take(&mut name, ENCRYPTED_PREFIX);
            attr.private = take(&mut name, PRIVATE_PREFIX);
            attr.read_only = take(&mut name, READONLY_PREFIX);
            attr.empty = take(&mut name, EMPTY_PREFIX);
            attr.executable = take(&mut name, EXECUTABLE_PREFIX);
        }

        let mut target = decode_dot(name);
        if attr.encrypted && !encrypted_suffix.is_empty() {
            if let Some(stripped) = target.strip_suffix(encrypted_suffix) {
                target.truncate(stripped.len());
            }
        }
        if let Some(stripped) = target.strip_suffix(LITERAL_SUFFIX) {
            target.truncate(stripped.len());
        } else if let Some(stripped) = target.strip_suffix(TEMPLATE_SUFFIX) {
            attr.template = true;
            let stripped = stripped.strip_suffix(LITERAL_SUFFIX).unwrap_or(stripped);
            target.truncate(stripped.len());
        }
        attr.target_name = target;
        attr
    }

    /// Encode back into a source name
    pub fn source_name(&self, encrypted_suffix: &str) -> String {
        let mut out = String::with_capacity(self.target_name.len() + 32);
        let flags = |out: &mut String, empty: bool| {
            if self.encrypted {
                out.push_str(ENCRYPTED_PREFIX);
            }
            if self.private {
                out.push_str(PRIVATE_PREFIX);
            }
            if self.read_only {
                out.push_str(READONLY_PREFIX);
            }
            if empty && self.empty {
                out.push_str(EMPTY_PREFIX);
            }
            if self.executable {
                out.push_str(EXECUTABLE_PREFIX);
            }
        };
        match self.kind {
            SourceFileType::Create => {
                out.push_str(CREATE_PREFIX);
                flags(&mut out, false);
            }
            SourceFileType::File => flags(&mut out, true),
            SourceFileType::Modify => {
                out.push_str(MODIFY_PREFIX);
                flags(&mut out, false);
            }
            SourceFileType::Remove => out.push_str(REMOVE_PREFIX),
            SourceFileType::Script => {
                out.push_str(RUN_PREFIX);
                match self.condition {
                    ScriptCondition::Always => {}
                    ScriptCondition::Once => out.push_str(ONCE_PREFIX),
                    ScriptCondition::OnChange => out.push_str(ONCHANGE_PREFIX),
                }
                match self.order {
                    o if o < 0 => out.push_str(BEFORE_PREFIX),
                    o if o > 0 => out.push_str(AFTER_PREFIX),
                    _ => {}
                }
            }
            SourceFileType::Symlink => out.push_str(SYMLINK_PREFIX),
        }
        encode_dot(&mut out, &self.target_name, &FILE_PREFIX_RE);
        if FILE_SUFFIX_RE.is_match(&self.target_name) {
            out.push_str(LITERAL_SUFFIX);
        }
        if self.template {
            out.push_str(TEMPLATE_SUFFIX);
        }
        if self.encrypted {
            out.push_str(encrypted_suffix);
        }
        out
    }

    /// Whether this is a script that runs at most once per contents
    pub fn once(&self) -> bool {
        self.condition == ScriptCondition::Once
    }

    /// Permission bits before the umask is applied
    pub fn perm(&self) -> u32 {
        let mut perm = 0o666;
        if self.executable {
            perm |= 0o111;
        }
        if self.private {
            perm &= !0o077;
        }
        if self.read_only {
            perm &= !0o222;
        }
        perm
    }
}
