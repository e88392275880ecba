//! Show the sessions in a store snapshot.

use anyhow::Result;
use serde_json::json;
use std::path::Path;
use tabsync_client::Config;
use tabsync_core::SyncedSession;

use super::{format_age, open};

/// Run the inspect command.
pub async fn run(path: &Path, config: &Config, as_json: bool) -> Result<()> {
    let opened = open(path, config).await?;
    let associator = &opened.associator;
    let sessions = associator.get_all_foreign_sessions();

    if as_json {
        let report = json!({
            "machine_tag": associator.current_machine_tag(),
            "nodes": opened.store.node_count(),
            "sessions": sessions.iter().copied().map(session_json).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== tabsync inspect ===");
    println!();
    println!("Store:");
    println!("  Nodes:     {}", opened.store.node_count());
    println!(
        "  Local tag: {}",
        associator.current_machine_tag().unwrap_or("-")
    );
    println!();

    if sessions.is_empty() {
        println!("Foreign sessions: NONE");
        return Ok(());
    }

    println!("Foreign sessions: {}", sessions.len());
    for session in sessions {
        println!(
            "  [{}] {} ({:?}), modified {}",
            session.session_tag,
            session.session_name,
            session.device_type,
            format_age(session.modified_time)
        );
        for window in session.windows.values() {
            println!("    Window {}:", window.window_id);
            for tab_id in &window.tabs {
                let url = session
                    .tabs
                    .get(tab_id)
                    .and_then(|tab| tab.current_navigation())
                    .map_or("-", |navigation| navigation.virtual_url());
                println!("      Tab {}: {}", tab_id, url);
            }
        }
    }

    Ok(())
}

fn session_json(session: &SyncedSession) -> serde_json::Value {
    let windows: Vec<_> = session
        .windows
        .values()
        .map(|window| {
            let tabs: Vec<_> = window
                .tabs
                .iter()
                .filter_map(|id| session.tabs.get(id))
                .map(|tab| {
                    let navigation = tab.current_navigation();
                    json!({
                        "tab_id": tab.tab_id.value(),
                        "url": navigation.map(|n| n.virtual_url()),
                        "title": navigation.map(|n| n.title()),
                    })
                })
                .collect();
            json!({ "window_id": window.window_id.value(), "tabs": tabs })
        })
        .collect();

    json!({
        "tag": session.session_tag,
        "name": session.session_name,
        "device_type": session.device_type,
        "age": format_age(session.modified_time),
        "windows": windows,
    })
}
