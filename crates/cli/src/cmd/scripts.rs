//! List the scripts that can receive updates

use crate::config::Config;
use anyhow::{Context, Result};
use hmr_core::ScriptRegistry;
use owo_colors::OwoColorize;

pub async fn run(config: Config) -> Result<()> {
    let session = super::connect(&config).await?;
    let registry = ScriptRegistry::load(&session, config.remote_root.as_deref())
        .await
        .context("Failed to enumerate remote scripts")?;

    if registry.is_empty() {
        println!("{}", "No file-backed scripts loaded in the remote process.".yellow());
        return Ok(());
    }

    println!("{}", "Remote Scripts".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let width = registry
        .iter()
        .map(|record| record.canonical_id.as_str().len())
        .max()
        .unwrap_or(0);

    for record in registry.iter() {
        println!(
            "  {:<width$}  {} {}",
            record.canonical_id.as_str().cyan(),
            "→".dimmed(),
            record.script_id.as_str(),
            width = width
        );
    }

    println!();
    println!("{} script(s)", registry.len());

    Ok(())
}
