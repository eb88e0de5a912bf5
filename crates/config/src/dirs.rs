//! XDG directory utilities
//!
//! Defaults follow the XDG Base Directory specification via the `xdg` crate:
//! - `XDG_CONFIG_HOME` defaults to ~/.config
//! - `XDG_DATA_HOME` defaults to ~/.local/share

use std::path::PathBuf;
use xdg::BaseDirectories;

/// The hearth config directory
///
/// Returns `$XDG_CONFIG_HOME/hearth` or `~/.config/hearth`
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hearth").get_config_home()
}

/// The hearth data directory
///
/// Returns `$XDG_DATA_HOME/hearth` or `~/.local/share/hearth`
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    BaseDirectories::with_prefix("hearth").get_data_home()
}

/// Default source directory
#[must_use]
pub fn default_source_dir() -> Option<PathBuf> {
    data_dir()
}

/// Default config file, `hearth.toml` in [`config_dir`]
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join("hearth.toml"))
}

/// Default persistent state file, `hearthstate.redb` in [`config_dir`]
#[must_use]
pub fn default_persistent_state() -> Option<PathBuf> {
    config_dir().map(|d| d.join("hearthstate.redb"))
}
