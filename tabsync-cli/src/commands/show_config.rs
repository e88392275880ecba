//! Print the effective configuration.

use anyhow::{Context, Result};
use tabsync_client::Config;

/// Run the config command.
pub fn run(config: &Config) -> Result<()> {
    println!("{}", render(config)?);
    Ok(())
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}
