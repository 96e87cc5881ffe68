//! Configuration command
//!
//! Shows the effective configuration after all layers are applied.

use crate::config::{self, Config};
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration
pub fn run_show(config: &Config, file: Option<&Path>) -> Result<()> {
    println!("{}", "Effective Configuration".bold());
    match file {
        Some(path) => println!("{}: {}\n", "Source".dimmed(), path.display().dimmed()),
        None => println!("{}\n", "Source: built-in defaults".dimmed()),
    }

    println!("  {} = {}", "endpoint".cyan(), config.endpoint());
    println!("  {} = {}", "watch".cyan(), config.watch_root().display());
    println!(
        "  {} = {} {}",
        "quiet_window_ms".cyan(),
        config.quiet_window_ms,
        format!("({:.1}s)", config.quiet_window_ms as f64 / 1000.0).dimmed()
    );
    println!(
        "  {} = {}",
        "max_wait_ms".cyan(),
        match config.max_wait_ms {
            Some(ms) => ms.to_string(),
            None => "(unbounded)".dimmed().to_string(),
        }
    );
    println!("  {} = {}", "update_timeout_ms".cyan(), config.update_timeout_ms);
    println!("  {} = {}", "dedupe_changes".cyan(), config.dedupe_changes);
    println!(
        "  {} = {}",
        "remote_root".cyan(),
        match &config.remote_root {
            Some(root) => root.clone(),
            None => "(none)".dimmed().to_string(),
        }
    );

    println!("\n{}", "[ignore]".yellow());
    println!("  {} = {}", "use_gitignore".cyan(), config.ignore.use_gitignore);
    println!("  {} = {}", "use_hmrignore".cyan(), config.ignore.use_hmrignore);
    println!(
        "  {} = {:?}",
        "additional_patterns".cyan(),
        config.ignore.additional_patterns
    );

    println!("\n{}", "Valid Ranges:".bold());
    println!("  quiet_window_ms: 1-60,000");
    println!("  update_timeout_ms: 1-600,000");
    println!("  max_wait_ms: at least quiet_window_ms");

    Ok(())
}

/// Print an annotated example config file
pub fn run_example() -> Result<()> {
    println!("{}", config::example_config());
    Ok(())
}
