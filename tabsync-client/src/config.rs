//! Configuration loading for tabsync.
//!
//! Configuration is loaded from a TOML file (default: `tabsync.toml`).
//! Every section and field is optional.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tabsync_types::DeviceType;

/// Root configuration for the session associator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Local session identity.
    #[serde(default)]
    pub session: SessionConfig,
    /// Favicon syncing.
    #[serde(default)]
    pub favicons: FaviconConfig,
    /// Stale session cleanup.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Local session identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Browser profile whose tabs are synced (default: "Default").
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Device type written into the local header (default: other).
    #[serde(default)]
    pub device_type: DeviceType,
    /// Display name for the local session. Host name if unset.
    #[serde(default)]
    pub session_name: Option<String>,
    /// Fixed machine tag instead of one derived from the store.
    #[serde(default)]
    pub machine_tag_override: Option<String>,
    /// Test mode: skip profile and window checks, fixed session name.
    #[serde(default)]
    pub setup_for_test: bool,
}

/// Favicon syncing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconConfig {
    /// Fetch and write favicons for local tabs (default: true).
    #[serde(default = "default_favicons_enabled")]
    pub enabled: bool,
}

/// Stale session cleanup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Foreign sessions idle longer than this many days are deleted (default: 14).
    #[serde(default = "default_stale_session_threshold_days")]
    pub stale_session_threshold_days: u32,
    /// Sweep interval in seconds (default: 3600 = 1 hour).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable periodic sweeps (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_profile() -> String {
    "Default".to_string()
}

fn default_favicons_enabled() -> bool {
    true
}

fn default_stale_session_threshold_days() -> u32 {
    14 // 2 weeks
}

fn default_cleanup_interval() -> u64 {
    3600 // 1 hour
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            device_type: DeviceType::default(),
            session_name: None,
            machine_tag_override: None,
            setup_for_test: false,
        }
    }
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            enabled: default_favicons_enabled(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            stale_session_threshold_days: default_stale_session_threshold_days(),
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl CleanupConfig {
    /// Sweep interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Configuration for tests: fixed machine tag, test mode on.
    pub fn for_test(machine_tag: &str) -> Self {
        let mut config = Self::default();
        config.session.machine_tag_override = Some(machine_tag.to_string());
        config.session.setup_for_test = true;
        config
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
