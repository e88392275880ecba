//! CLI command implementations.

pub mod delete;
pub mod init;
pub mod inspect;
pub mod show_config;
pub mod sweep;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tabsync_client::{
    Config, FaviconError, FaviconFetcher, FaviconImage, MemoryStore, MockBrowser,
    SessionAssociator,
};

use crate::snapshot;

/// Session name the CLI writes when none is configured.
pub const CLI_SESSION_NAME: &str = "tabsync-cli";

/// The CLI never has favicons to offer.
struct NoFavicons;

#[async_trait]
impl FaviconFetcher for NoFavicons {
    async fn fetch(&self, page_url: &str) -> Result<FaviconImage, FaviconError> {
        Err(FaviconError::NotAvailable(page_url.to_string()))
    }
}

/// A snapshot loaded and associated.
pub struct Opened {
    /// Store loaded from the snapshot.
    pub store: MemoryStore,
    /// Associator over `store`, already associated.
    pub associator: SessionAssociator<MemoryStore>,
}

/// Load `path` and associate it as a device with no open tabs.
pub async fn open(path: &Path, config: &Config) -> Result<Opened> {
    let store = snapshot::load(path).await?;

    let mut config = config.clone();
    config.favicons.enabled = false;
    if config.session.session_name.is_none() {
        config.session.session_name = Some(CLI_SESSION_NAME.to_string());
    }

    let mut associator = SessionAssociator::new(store.clone(), Arc::new(NoFavicons), config);
    associator
        .associate_models(&MockBrowser::new())
        .context("Failed to associate store snapshot")?;
    Ok(Opened { store, associator })
}

/// Format a modification time relative to now.
pub fn format_age(time: SystemTime) -> String {
    let Ok(age) = SystemTime::now().duration_since(time) else {
        return "in the future".to_string();
    };
    let secs = age.as_secs();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{} minutes ago", secs / 60)
    } else if secs < 86400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86400)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tabsync_types::{
        DeviceType, NavigationSpecifics, SessionHeader, SessionSpecifics, TabId, TabSpecifics,
        WindowId, WindowSpecifics,
    };

    /// One day.
    pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    /// Add a foreign session with one window holding one tab at `url`.
    pub fn add_session(store: &MemoryStore, tag: &str, name: &str, url: &str, modified: SystemTime) {
        let mut window = WindowSpecifics::new(WindowId::new(1));
        window.tabs.push(TabId::new(1));
        let header = SessionSpecifics::header(
            tag,
            SessionHeader {
                client_name: Some(name.to_string()),
                device_type: Some(DeviceType::Phone),
                windows: vec![window],
            },
        );
        let mut tab = TabSpecifics::new(TabId::new(1), WindowId::new(1));
        tab.navigations.push(NavigationSpecifics {
            virtual_url: url.to_string(),
            title: "Example".to_string(),
            ..Default::default()
        });
        store.insert_node(tag, &header, modified).unwrap();
        store
            .insert_node(&format!("{} 0", tag), &SessionSpecifics::tab(tag, tab), modified)
            .unwrap();
    }

    /// Write a snapshot holding a fresh session and one 30 days old.
    pub async fn write_store(dir: &Path) -> PathBuf {
        let store = MemoryStore::with_root();
        let now = SystemTime::now();
        add_session(&store, "phone", "Phone", "https://a.example/", now);
        add_session(&store, "tablet", "Tablet", "https://b.example/", now - 30 * DAY);
        let path = dir.join("store.json");
        snapshot::save(&store, &path).await.unwrap();
        path
    }
}
