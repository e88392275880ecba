//! Delete one foreign session.

use anyhow::{bail, Result};
use std::path::Path;
use tabsync_client::Config;

use super::open;
use crate::snapshot;

/// Run the delete command.
///
/// Returns the number of nodes removed.
pub async fn run(path: &Path, config: &Config, tag: &str, write: bool) -> Result<usize> {
    let mut opened = open(path, config).await?;
    if opened.associator.current_machine_tag() == Some(tag) {
        bail!("{} is the local session of this tool, refusing to delete it", tag);
    }

    let removed = opened.associator.delete_foreign_session(tag)?;
    if removed == 0 {
        println!("No nodes found for session {}", tag);
        return Ok(0);
    }
    println!("Deleted session {} ({} nodes)", tag, removed);

    if write {
        snapshot::save(&opened.store, path).await?;
        println!("Snapshot updated: {}", path.display());
    } else {
        println!("Dry run, pass --write to save");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::write_store;
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn delete_with_write() {
        let dir = tempdir().unwrap();
        let path = write_store(dir.path()).await;

        assert_eq!(run(&path, &Config::default(), "phone", true).await.unwrap(), 2);
        assert!(snapshot::load(&path)
            .await
            .unwrap()
            .nodes_for_session("phone")
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_tag_removes_nothing() {
        let dir = tempdir().unwrap();
        let path = write_store(dir.path()).await;

        assert_eq!(run(&path, &Config::default(), "laptop", true).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn local_tag_is_refused() {
        let dir = tempdir().unwrap();
        let path = write_store(dir.path()).await;
        let config = tabsync_client::Config::for_test("session_synccli");

        assert!(run(&path, &config, "session_synccli", true).await.is_err());
    }
}
