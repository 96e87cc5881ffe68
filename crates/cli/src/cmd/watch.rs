//! Watch a directory and push changes into the remote process

use crate::config::Config;
use anyhow::{Context, Result};
use hmr_core::{pipeline, Aggregator, BatchReport, Dispatcher, PathMapper, ScriptRegistry};
use hmr_watcher::{WatchError, Watcher};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run(config: Config) -> Result<()> {
    let engine = config.engine_config();

    // 1. Connect and snapshot the loaded scripts
    let session = Arc::new(super::connect(&config).await?);
    let registry = ScriptRegistry::load(&*session, engine.remote_root.as_deref())
        .await
        .context("Failed to enumerate remote scripts")?;
    info!(target: "hmr", "{} script(s) available for update", registry.len());

    // 2. Start watching
    let root = config.watch_root();
    let (watcher, mut events) = Watcher::start(&root, config.ignore.clone())
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    info!(
        target: "hmr",
        "Watching {} ({} files)",
        watcher.root().display(),
        watcher.initial_files().len()
    );

    // 3. Wire watcher -> aggregator -> dispatcher
    let mapper = PathMapper::new(watcher.root());
    warn_if_unmapped(
        &registry,
        &mapper,
        watcher.initial_files(),
        engine.remote_root.is_some(),
    );
    let dispatcher = Dispatcher::new(session, Arc::new(registry), mapper, &engine);
    let (aggregator, mut batches) = Aggregator::spawn(&engine);

    let feed = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            aggregator.add(event?);
        }
        Ok::<(), WatchError>(())
    });

    let pipeline = pipeline::drive(&mut batches, &dispatcher, print_failures);
    tokio::pin!(pipeline);

    // Ctrl-C drops the aggregator's producer, which flushes the pending batch
    let stats = tokio::select! {
        stats = &mut pipeline => stats,
        _ = tokio::signal::ctrl_c() => {
            info!(target: "hmr", "Interrupted, pushing pending changes");
            feed.abort();
            pipeline.await
        }
    };

    info!(
        target: "hmr",
        "Stopped after {} batch(es): {} applied, {} skipped, {} failed",
        stats.batches,
        stats.applied,
        stats.skipped,
        stats.failed
    );

    match feed.await {
        Ok(result) => result.context("File watcher failed")?,
        Err(e) if e.is_cancelled() => {}
        Err(e) => return Err(e).context("File watcher task panicked"),
    }

    drop(watcher);
    Ok(())
}

/// Scripts were found but none lines up with a local file
fn warn_if_unmapped(
    registry: &ScriptRegistry,
    mapper: &PathMapper,
    files: &[PathBuf],
    has_remote_root: bool,
) {
    if registry.is_empty() || files.is_empty() {
        return;
    }
    if registry.count_mapped(mapper, files.iter().map(|p| p.as_path())) > 0 {
        return;
    }

    if has_remote_root {
        warn!(
            target: "hmr",
            "None of the {} remote script(s) lie under --remote-root; check that it matches the remote process",
            registry.len()
        );
    } else {
        warn!(
            target: "hmr",
            "None of the {} remote script(s) match a watched file; if the process runs locally try --remote-root {}",
            registry.len(),
            mapper.root().display()
        );
    }
}

fn print_failures(report: &BatchReport) {
    let failed = report.failed();
    if failed > 0 {
        eprintln!(
            "{} {} of {} update(s) failed",
            "✗".red(),
            failed,
            report.items.len()
        );
    }
}
