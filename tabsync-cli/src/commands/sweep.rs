//! Delete stale foreign sessions.

use anyhow::Result;
use std::path::Path;
use tabsync_client::Config;

use super::open;
use crate::snapshot;

/// Run the sweep command.
///
/// Returns the number of sessions deleted.
pub async fn run(
    path: &Path,
    config: &Config,
    threshold_days: Option<u32>,
    write: bool,
) -> Result<usize> {
    let mut opened = open(path, config).await?;
    if let Some(days) = threshold_days {
        opened.associator.set_stale_session_threshold(days);
    }

    let deleted = opened.associator.delete_stale_sessions()?;
    println!(
        "Deleted {} stale sessions (threshold: {} days)",
        deleted,
        opened.associator.stale_session_threshold()
    );

    if write {
        snapshot::save(&opened.store, path).await?;
        println!("Snapshot updated: {}", path.display());
    } else if deleted > 0 {
        println!("Dry run, pass --write to save");
    }
    Ok(deleted)
}
