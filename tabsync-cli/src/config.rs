//! Configuration lookup for the tabsync CLI.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tabsync_client::Config;

/// File name looked up in the user's config directory.
pub const CONFIG_FILE_NAME: &str = "tabsync.toml";

/// Load `path`, or the default config file if it exists, or defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!("Using config file {}", path.display());
            Config::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        _ => Ok(Config::default()),
    }
}

/// Default config file location for this platform.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "tabsync", "tabsync")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
