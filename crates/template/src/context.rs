//! Template data
//!
//! Every template sees the default data under the `chezmoi` key, merged
//! with the user's `[data]` table from the configuration:
//!
//! ```text
//! chezmoi.os          "linux", "darwin", ...
//! chezmoi.arch        "amd64", "arm64", ...
//! chezmoi.hostname    short host name
//! chezmoi.username    login name
//! chezmoi.homeDir     home directory
//! chezmoi.sourceDir   root of the source tree
//! chezmoi.destDir     destination directory
//! chezmoi.version     hearth version
//! ```
//!
//! `chezmoi.sourceFile` and `chezmoi.targetFile` are added per file while
//! rendering.

use hearth_core::platform::CURRENT_PLATFORM;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::env;
use std::path::Path;

/// The default data under the `chezmoi` key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChezmoiInfo {
    /// Operating system, using kernel names
    pub os: String,
    /// CPU architecture, using Go names
    pub arch: String,
    /// Short host name
    pub hostname: String,
    /// Login name
    pub username: String,
    /// Home directory
    pub home_dir: String,
    /// Root of the source tree
    pub source_dir: String,
    /// Destination directory
    pub dest_dir: String,
    /// hearth version
    pub version: String,
}

impl ChezmoiInfo {
    /// Detect system information for the given directories
    pub fn detect(source_dir: &Path, dest_dir: &Path) -> Self {
        Self {
            os: CURRENT_PLATFORM.os.to_string(),
            arch: CURRENT_PLATFORM.arch.to_string(),
            hostname: detect_hostname(),
            username: detect_username(),
            home_dir: dirs::home_dir().map_or_else(String::new, |p| p.to_string_lossy().into_owned()),
            source_dir: source_dir.to_string_lossy().into_owned(),
            dest_dir: dest_dir.to_string_lossy().into_owned(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// chezmoi.hostname is the name up to the first dot
fn detect_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.split('.').next().unwrap_or_default().to_string())
        .unwrap_or_default()
}

fn detect_username() -> String {
    uzers::get_current_username()
        .and_then(|name| name.into_string().ok())
        .or_else(|| env::var("USER").ok())
        .or_else(|| env::var("USERNAME").ok())
        .unwrap_or_default()
}

/// Builder for the data passed to every template
#[derive(Debug, Clone)]
pub struct TemplateContext {
    chezmoi: ChezmoiInfo,
    data: IndexMap<String, Value>,
}

impl TemplateContext {
    /// Context with detected system information and no user data
    #[must_use]
    pub fn new(source_dir: &Path, dest_dir: &Path) -> Self {
        Self::from_info(ChezmoiInfo::detect(source_dir, dest_dir))
    }

    /// Context with explicit default data
    #[must_use]
    pub fn from_info(chezmoi: ChezmoiInfo) -> Self {
        Self {
            chezmoi,
            data: IndexMap::new(),
        }
    }

    /// Merge user data over the defaults
    #[must_use]
    pub fn with_data(mut self, data: &IndexMap<String, Value>) -> Self {
        Clone::clone_from(&mut self.data, data);
        self
    }

    /// The default data
    pub fn chezmoi(&self) -> &ChezmoiInfo {
        &self.chezmoi
    }

    /// The merged data as one JSON object
    pub fn to_value(&self) -> Value {
        let mut root = Map::new();
        if let Ok(chezmoi) = serde_json::to_value(&self.chezmoi) {
            root.insert("chezmoi".to_string(), chezmoi);
        }
        let mut root = Value::Object(root);
        for (key, value) in &self.data {
            merge(&mut root, key, value.clone());
        }
        root
    }
}

/// Deep-merge `value` into `root[key]`
///
/// Objects merge recursively. Anything else replaces what was there.
pub fn merge(root: &mut Value, key: &str, value: Value) {
    let Value::Object(map) = root else {
        return;
    };
    match (map.get_mut(key), value) {
        (Some(existing @ Value::Object(_)), Value::Object(overlay)) => {
            for (k, v) in overlay {
                merge(existing, &k, v);
            }
        }
        (_, value) => {
            map.insert(key.to_string(), value);
        }
    }
}
