//! Create an empty store snapshot.

use anyhow::{bail, Result};
use std::path::Path;
use tabsync_client::MemoryStore;

use crate::snapshot;

/// Run the init command.
pub async fn run(path: &Path, cache_guid: Option<&str>) -> Result<()> {
    if path.exists() {
        bail!("Snapshot {} already exists", path.display());
    }

    let cache_guid = match cache_guid {
        Some(guid) => guid.to_string(),
        None => uuid::Uuid::new_v4().simple().to_string(),
    };
    let store = MemoryStore::new(cache_guid.as_str());
    store.create_root();
    snapshot::save(&store, path).await?;

    println!("Store snapshot created: {}", path.display());
    println!("  Cache GUID: {}", cache_guid);
    Ok(())
}
