//! Configuration management
//!
//! hearth reads `hearth.toml` from the config directory. Every key is
//! optional:
//!
//! ```toml
//! sourceDir = "~/dotfiles"
//! destDir = "~"
//! umask = "077"
//! keepGoing = true
//! encryption = "age"
//!
//! [age]
//! identity = "~/.config/hearth/key.txt"
//! recipient = "age1ql3z7hjy54pw3hyww5ayyfg7zqgvc7w3j2elw8zmrj2kg5sfn9aqmcac8p"
//!
//! [data]
//! email = "me@example.com"
//!
//! [add]
//! autotemplate = true
//! ```

use crate::dirs;
use crate::{Error, Result};
use hearth_core::{Encryption, Umask};
use hearth_crypto::{AgeEncryption, GpgEncryption, NoEncryption, Recipient, load_identities};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Encryption backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionKind {
    /// No encryption; encrypted source files fail to apply
    #[default]
    None,
    /// The builtin age implementation
    Age,
    /// An external gpg command
    Gpg,
}

/// `[age]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeConfig {
    /// Single identity file (age or SSH key)
    pub identity: Option<PathBuf>,

    /// Multiple identity files
    #[serde(default)]
    pub identities: Vec<PathBuf>,

    /// Single recipient public key
    pub recipient: Option<String>,

    /// Multiple recipient public keys
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Suffix of encrypted source files, `.age` when unset
    pub suffix: Option<String>,
}

/// `[gpg]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpgConfig {
    /// gpg executable, `gpg` when unset
    pub command: Option<String>,

    /// Recipient key; symmetric encryption when unset
    pub recipient: Option<String>,

    /// Extra arguments passed before every operation
    #[serde(default)]
    pub args: Vec<String>,

    /// Suffix of encrypted source files, `.asc` when unset
    pub suffix: Option<String>,
}

/// `[add]` section: defaults for the add command
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddConfig {
    /// Replace known data values with template references
    #[serde(default)]
    pub autotemplate: bool,

    /// Encrypt added files
    #[serde(default)]
    pub encrypt: bool,
}

/// hearth configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Source directory
    pub source_dir: Option<PathBuf>,

    /// Destination directory
    pub dest_dir: Option<PathBuf>,

    /// Umask for created entries, overriding the process umask
    #[serde(default, deserialize_with = "deserialize_umask")]
    pub umask: Option<Umask>,

    /// Continue past failing entries
    #[serde(default)]
    pub keep_going: bool,

    /// Encryption backend
    #[serde(default)]
    pub encryption: EncryptionKind,

    /// Age settings
    #[serde(default)]
    pub age: AgeConfig,

    /// gpg settings
    #[serde(default)]
    pub gpg: GpgConfig,

    /// Template data, merged over the defaults
    #[serde(default)]
    pub data: IndexMap<String, serde_json::Value>,

    /// Persistent state file
    pub persistent_state: Option<PathBuf>,

    /// Add defaults
    #[serde(default)]
    pub add: AddConfig,
}

// Accepts `umask = "022"` or a TOML integer such as `umask = 0o022`
fn deserialize_umask<'de, D>(deserializer: D) -> std::result::Result<Option<Umask>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u32),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Int(bits)) if bits <= 0o777 => Ok(Some(Umask::new(bits))),
        Some(Raw::Int(bits)) => Err(serde::de::Error::custom(format!("umask {bits:o} exceeds 777"))),
        Some(Raw::Str(s)) => match Umask::parse(&s) {
            Ok(umask) => Ok(Some(umask)),
            Err(_) => Err(serde::de::Error::custom(Error::InvalidUmask(s))),
        },
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// Relative paths resolve against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&content, base_dir).map_err(|e| match e {
            Error::Parse { source, .. } => Error::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Load `path` if given, else the default config file if it exists
    ///
    /// An explicit path must exist. A missing default file yields the
    /// default configuration.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match dirs::default_config_file() {
            Some(path) if path.is_file() => Self::load(path),
            _ => {
                tracing::debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from TOML, resolving relative paths against
    /// `base_dir`
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| Error::Parse {
            path: PathBuf::from("<string>"),
            source: Box::new(e),
        })?;
        config.resolve_relative_paths(base_dir);
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, base_dir: &Path) {
        for path in [&mut self.source_dir, &mut self.dest_dir, &mut self.persistent_state, &mut self.age.identity]
            .into_iter()
            .flatten()
        {
            *path = resolve_path(path, base_dir);
        }
        for path in &mut self.age.identities {
            *path = resolve_path(path, base_dir);
        }
    }

    /// Source directory, defaulting to `$XDG_DATA_HOME/hearth`
    pub fn source_dir(&self) -> Result<PathBuf> {
        match &self.source_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::default_source_dir().ok_or(Error::NoXdgDir("data")),
        }
    }

    /// Destination directory, defaulting to the home directory
    pub fn dest_dir(&self) -> Result<PathBuf> {
        match &self.dest_dir {
            Some(dir) => Ok(dir.clone()),
            None => ::dirs::home_dir().ok_or(Error::NoHomeDir),
        }
    }

    /// Persistent state file, defaulting to `$XDG_CONFIG_HOME/hearth/hearthstate.redb`
    pub fn persistent_state(&self) -> Result<PathBuf> {
        match &self.persistent_state {
            Some(path) => Ok(path.clone()),
            None => dirs::default_persistent_state().ok_or(Error::NoXdgDir("config")),
        }
    }

    /// The configured umask, or `process` when none is set
    pub fn umask(&self, process: Umask) -> Umask {
        self.umask.unwrap_or(process)
    }

    /// All configured age recipients
    ///
    /// When none are configured, the public keys of the identities are used.
    pub fn age_recipients(&self) -> Result<Vec<Recipient>> {
        let configured: Vec<&String> = self.age.recipient.iter().chain(&self.age.recipients).collect();
        if configured.is_empty() {
            return Ok(self
                .age_identities()?
                .iter()
                .map(hearth_crypto::Identity::to_public)
                .collect());
        }
        configured
            .into_iter()
            .map(|s| s.parse::<Recipient>().map_err(Error::from))
            .collect()
    }

    /// All identities from the configured identity files
    pub fn age_identities(&self) -> Result<Vec<hearth_crypto::Identity>> {
        let mut identities = Vec::new();
        for path in self.age.identity.iter().chain(&self.age.identities) {
            identities.extend(load_identities(path)?);
        }
        Ok(identities)
    }

    /// Build the configured encryption backend
    pub fn encryption(&self) -> Result<Box<dyn Encryption>> {
        Ok(match self.encryption {
            EncryptionKind::None => Box::new(NoEncryption),
            EncryptionKind::Age => {
                let mut age = AgeEncryption::new(self.age_recipients()?, self.age_identities()?);
                if let Some(suffix) = &self.age.suffix {
                    age = age.with_suffix(suffix);
                }
                Box::new(age)
            }
            EncryptionKind::Gpg => {
                let mut gpg = match &self.gpg.command {
                    Some(command) => GpgEncryption::new(command),
                    None => GpgEncryption::default(),
                };
                if let Some(recipient) = &self.gpg.recipient {
                    gpg = gpg.with_recipient(recipient);
                }
                if !self.gpg.args.is_empty() {
                    gpg = gpg.with_args(self.gpg.args.clone());
                }
                if let Some(suffix) = &self.gpg.suffix {
                    gpg = gpg.with_suffix(suffix);
                }
                Box::new(gpg)
            }
        })
    }
}

/// Expand `~/` and resolve relative paths against `base_dir`
fn resolve_path(path: &Path, base_dir: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    if let Some(stripped) = path_str.strip_prefix("~/") {
        if let Some(home) = ::dirs::home_dir() {
            return home.join(stripped);
        }
    } else if path_str == "~"
        && let Some(home) = ::dirs::home_dir()
    {
        return home;
    }

    if path.is_relative() {
        base_dir.join(path)
    } else {
        path.to_path_buf()
    }
}
