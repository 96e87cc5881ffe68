//! CLI command implementations

pub mod config;
pub mod scripts;
pub mod watch;

use crate::config::{Config, Overrides};
use anyhow::{anyhow, Context, Result};
use hmr_cdp::{CdpSession, Endpoint};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Resolve the layered configuration for a command
///
/// Returns the validated config and the file it was read from, if any.
pub fn load_config(
    explicit: Option<&Path>,
    overrides: Overrides,
) -> Result<(Config, Option<PathBuf>)> {
    let watch_dir = overrides
        .watch
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    let (mut config, file) = Config::discover(explicit, &watch_dir)?;
    config.apply(overrides);
    config.validate()?;

    Ok((config, file))
}

/// Connect to the configured debug endpoint
pub async fn connect(config: &Config) -> Result<CdpSession> {
    let endpoint: Endpoint = config
        .endpoint()
        .parse()
        .context("Invalid debug endpoint")?;

    match CdpSession::connect_endpoint(&endpoint).await {
        Ok(session) => {
            eprintln!("{}", "Connected to remote debugger.".green());
            Ok(session)
        }
        Err(e) => Err(anyhow!("Unable to connect to remote debugger ({})", e)),
    }
}
