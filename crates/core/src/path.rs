//! Type-safe path types
//!
//! This module provides three distinct path types using the newtype pattern:
//!
//! - [`AbsPath`]: Absolute filesystem paths, lexically cleaned
//! - [`RelPath`]: Target-relative paths, always forward-slash separated
//! - [`SourceRelPath`]: Source-relative paths carrying the attribute-encoded names
//!
//! Relative paths are stored as normalized strings: no leading or trailing
//! slash, no empty or `.` segments, and no `..` segments. They are the keys of
//! the target state, so two spellings of one path always compare equal.
//!
//! # Examples
//!
//! ```
//! use hearth_core::path::{AbsPath, RelPath};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let home = AbsPath::new("/home/user".into())?;
//! let config = RelPath::new(".config//nvim/./init.lua")?;
//!
//! let nvim_config = home.join(&config);
//! assert_eq!(nvim_config.to_string(), "/home/user/.config/nvim/init.lua");
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// An absolute path on the filesystem
///
/// `.` segments are dropped and `..` segments are resolved lexically on
/// construction.
///
/// # Examples
///
/// ```
/// use hearth_core::path::AbsPath;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let abs = AbsPath::new("/home/user/../other/./x".into())?;
/// assert_eq!(abs.as_path(), std::path::Path::new("/home/other/x"));
///
/// assert!(AbsPath::new("relative/path".into()).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AbsPath(PathBuf);

impl AbsPath {
    /// Create a new `AbsPath` from a `PathBuf`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn new(path: PathBuf) -> Result<Self> {
        if !path.is_absolute() {
            return Err(Error::PathNotAbsolute { path });
        }
        let mut clean = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    clean.pop();
                }
                other => clean.push(other.as_os_str()),
            }
        }
        Ok(AbsPath(clean))
    }

    /// Create a new `AbsPath` from a reference to a `Path`
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::new(path.to_path_buf())
    }

    /// Get the underlying `Path`
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to a `PathBuf`
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Join with a relative path to create a new absolute path
    ///
    /// An empty relative path returns `self` unchanged.
    pub fn join(&self, rel: &RelPath) -> Self {
        if rel.is_empty() {
            return self.clone();
        }
        AbsPath(self.0.join(rel.as_str()))
    }

    /// Join with a single file name or a slash-separated relative string
    pub fn join_str(&self, rel: &str) -> Self {
        match RelPath::new(rel) {
            Ok(rel) => self.join(&rel),
            Err(_) => self.clone(),
        }
    }

    /// Get the parent directory
    ///
    /// Returns `None` if this is the root directory.
    pub fn parent(&self) -> Option<Self> {
        self.0.parent().map(|p| AbsPath(p.to_path_buf()))
    }

    /// Strip a base directory prefix to get a relative path
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not under `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_core::path::AbsPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let home = AbsPath::new("/home/user".into())?;
    /// let file = AbsPath::new("/home/user/.config/git".into())?;
    /// assert_eq!(file.strip_prefix(&home)?.as_str(), ".config/git");
    /// assert!(home.strip_prefix(&file).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn strip_prefix(&self, base: &AbsPath) -> Result<RelPath> {
        let invalid = || Error::InvalidPathPrefix {
            path: Arc::new(self.as_path().to_path_buf()),
            base: Arc::new(base.as_path().to_path_buf()),
        };
        let rel = self.0.strip_prefix(&base.0).map_err(|_| invalid())?;
        RelPath::from_path(rel).map_err(|_| invalid())
    }

    /// Get the file name
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name().and_then(|s| s.to_str())
    }

    /// The path as a forward-slash string, used as a persistent-state key
    pub fn to_slash(&self) -> String {
        self.0.to_string_lossy().replace('\\', "/")
    }
}

impl AsRef<Path> for AbsPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

fn normalize(raw: &str) -> Result<String> {
    if raw.starts_with('/') {
        return Err(Error::PathNotRelative {
            path: PathBuf::from(raw),
        });
    }
    let mut out = String::with_capacity(raw.len());
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(Error::Path(format!("{raw}: parent segments are not allowed"))),
            segment => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(segment);
            }
        }
    }
    Ok(out)
}

macro_rules! rel_path_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a normalized relative path
            ///
            /// # Errors
            ///
            /// Returns an error if the path is absolute or contains `..`.
            pub fn new(path: impl AsRef<str>) -> Result<Self> {
                normalize(path.as_ref()).map($name)
            }

            /// Create from a filesystem path
            ///
            /// # Errors
            ///
            /// Returns an error if the path is absolute, contains `..`,
            /// or is not valid UTF-8.
            pub fn from_path(path: &Path) -> Result<Self> {
                let s = path
                    .to_str()
                    .ok_or_else(|| Error::Path(format!("{}: not valid UTF-8", path.display())))?;
                Self::new(s)
            }

            /// The empty path, naming the root of its tree
            pub fn empty() -> Self {
                $name(String::new())
            }

            /// Whether this path names the root of its tree
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Forward-slash string form
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Borrow as a filesystem path
            pub fn as_path(&self) -> &Path {
                Path::new(&self.0)
            }

            /// Join with another relative path
            pub fn join(&self, other: &$name) -> Self {
                self.join_str(&other.0)
            }

            /// Append a single, already-normalized name
            pub fn join_str(&self, name: &str) -> Self {
                match (self.0.is_empty(), name.is_empty()) {
                    (_, true) => self.clone(),
                    (true, false) => $name(name.to_string()),
                    (false, false) => $name(format!("{}/{}", self.0, name)),
                }
            }

            /// Get the parent directory
            ///
            /// Returns `None` for the empty path. A single component path
            /// has the empty path as its parent.
            pub fn parent(&self) -> Option<Self> {
                if self.0.is_empty() {
                    return None;
                }
                Some(match self.0.rfind('/') {
                    Some(i) => $name(self.0[..i].to_string()),
                    None => $name::empty(),
                })
            }

            /// Get the last component
            pub fn file_name(&self) -> Option<&str> {
                if self.0.is_empty() {
                    return None;
                }
                Some(self.0.rsplit('/').next().unwrap_or(&self.0))
            }

            /// Iterate over components
            pub fn components(&self) -> impl Iterator<Item = &str> {
                self.0.split('/').filter(|s| !s.is_empty())
            }

            /// Number of components
            pub fn depth(&self) -> usize {
                self.components().count()
            }

            /// Whether `self` is `prefix` or lies below it
            pub fn starts_with(&self, prefix: &$name) -> bool {
                prefix.0.is_empty()
                    || self.0 == prefix.0
                    || (self.0.starts_with(&prefix.0)
                        && self.0.as_bytes().get(prefix.0.len()) == Some(&b'/'))
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(s: String) -> Result<Self> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(p: $name) -> String {
                p.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

rel_path_type!(
    /// A path relative to the destination directory
    ///
    /// Target state is keyed by `RelPath`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_core::path::RelPath;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let rel = RelPath::new(".config/nvim/init.lua")?;
    /// assert_eq!(rel.file_name(), Some("init.lua"));
    /// assert_eq!(rel.parent().unwrap().as_str(), ".config/nvim");
    /// assert!(RelPath::new("../escape").is_err());
    /// # Ok(())
    /// # }
    /// ```
    RelPath
);

rel_path_type!(
    /// A path relative to the source directory with encoded attributes
    ///
    /// Names look like `private_dot_ssh/encrypted_private_id_ed25519.age`.
    SourceRelPath
);

impl RelPath {
    /// Reinterpret as a source-relative path without re-encoding
    pub fn to_source(&self) -> SourceRelPath {
        SourceRelPath(self.0.clone())
    }
}

impl SourceRelPath {
    /// Reinterpret as a plain relative path without decoding
    pub fn to_rel_path(&self) -> RelPath {
        RelPath(self.0.clone())
    }
}

impl fmt::Display for AbsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
