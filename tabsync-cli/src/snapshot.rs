//! Store snapshot files.

use anyhow::{Context, Result};
use std::path::Path;
use tabsync_client::{MemoryStore, StoreSnapshot};

/// Load a store from a JSON snapshot file.
pub async fn load(path: &Path) -> Result<MemoryStore> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: StoreSnapshot =
        serde_json::from_str(&contents).context("Invalid store snapshot")?;
    MemoryStore::from_snapshot(&snapshot).context("Inconsistent store snapshot")
}

/// Save a store as a JSON snapshot file.
pub async fn save(store: &MemoryStore, path: &Path) -> Result<()> {
    let contents = serde_json::to_string_pretty(&store.snapshot())?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    tracing::debug!("Saved snapshot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_then_load_keeps_nodes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = MemoryStore::with_root();

        save(&store, &path).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded.node_count(), 1);
        assert_eq!(loaded.snapshot().cache_guid, store.snapshot().cache_guid);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid store snapshot"));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let dir = tempdir().unwrap();
        let err = load(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read snapshot"));
    }
}
