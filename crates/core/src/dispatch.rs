//! Update dispatch
//!
//! Turns one batch into remote effects. `Change` events are resolved against
//! the script registry and pushed concurrently; `Add` and `Remove` events are
//! only accounted for, since the watch set itself belongs to the watcher.

use crate::config::EngineConfig;
use crate::event::{Batch, EventKind};
use crate::pathmap::{CanonicalId, PathMapper};
use crate::registry::ScriptRegistry;
use crate::session::{DebugSession, RemoteError};
use futures::future::join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a change could not be applied
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureReason {
    /// Local file could not be read
    #[error("failed to read file: {0}")]
    Read(String),

    /// Remote call did not finish in time
    #[error("remote update timed out after {0:?}")]
    Timeout(Duration),

    /// Remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Terminal state of one dispatched `Change` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Remote accepted the new source
    Applied,
    /// No script was loaded for this file at startup
    SkippedNoMapping,
    /// Read or remote update failed
    Failed(FailureReason),
}

/// Outcome for one changed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub path: PathBuf,
    pub canonical_id: Option<CanonicalId>,
    pub outcome: UpdateOutcome,
}

/// Summary of one processed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of `Add` events
    pub added: usize,
    /// Number of `Change` events received (before collapsing duplicates)
    pub changed: usize,
    /// Number of `Remove` events
    pub removed: usize,
    /// `Change` events dropped because a later one targeted the same file
    pub collapsed: usize,
    /// One entry per dispatched `Change` event
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::SkippedNoMapping))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UpdateOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&UpdateOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

/// Events of a batch split by kind, each group in arrival order
#[derive(Debug, Default)]
struct Partitioned {
    added: Vec<PathBuf>,
    changed: Vec<PathBuf>,
    removed: Vec<PathBuf>,
}

fn partition(batch: Batch) -> Partitioned {
    let mut groups = Partitioned::default();
    for event in batch {
        match event.kind {
            EventKind::Add => groups.added.push(event.path),
            EventKind::Change => groups.changed.push(event.path),
            EventKind::Remove => groups.removed.push(event.path),
        }
    }
    groups
}

/// Pushes changed files to the remote session
pub struct Dispatcher {
    session: Arc<dyn DebugSession>,
    registry: Arc<ScriptRegistry>,
    mapper: PathMapper,
    update_timeout: Duration,
    dedupe_changes: bool,
}

impl Dispatcher {
    pub fn new(
        session: Arc<dyn DebugSession>,
        registry: Arc<ScriptRegistry>,
        mapper: PathMapper,
        config: &EngineConfig,
    ) -> Self {
        Self {
            session,
            registry,
            mapper,
            update_timeout: config.update_timeout,
            dedupe_changes: config.dedupe_changes,
        }
    }

    /// Process one batch to completion
    ///
    /// Returns once every `Change` item has reached a terminal outcome. A
    /// failing item never affects its siblings.
    pub async fn dispatch(&self, batch: Batch) -> BatchReport {
        let groups = partition(batch);

        for path in &groups.added {
            debug!(target: "hmr", "added {}", path.display());
        }
        for path in &groups.removed {
            debug!(target: "hmr", "removed {}", path.display());
        }

        let changed = groups.changed.len();
        let targets = if self.dedupe_changes {
            self.last_change_per_file(groups.changed)
        } else {
            groups.changed
        };
        let collapsed = changed - targets.len();

        let items = join_all(targets.into_iter().map(|path| self.update(path))).await;

        BatchReport {
            added: groups.added.len(),
            changed,
            removed: groups.removed.len(),
            collapsed,
            items,
        }
    }

    /// Keep only the last change for each file, preserving relative order
    fn last_change_per_file(&self, changed: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut kept: Vec<PathBuf> = changed
            .into_iter()
            .rev()
            .filter(|path| {
                let key = match self.mapper.canonical_id(path) {
                    Some(id) => id.to_string(),
                    None => path.to_string_lossy().into_owned(),
                };
                seen.insert(key)
            })
            .collect();
        kept.reverse();
        kept
    }

    async fn update(&self, path: PathBuf) -> ItemReport {
        let canonical_id = self.mapper.canonical_id(&path);

        let record = match canonical_id.as_ref().and_then(|id| self.registry.lookup(id)) {
            Some(record) => record,
            None => {
                debug!(
                    target: "hmr",
                    "{} has no loaded script, skipping",
                    path.display()
                );
                return ItemReport {
                    path,
                    canonical_id,
                    outcome: UpdateOutcome::SkippedNoMapping,
                };
            }
        };

        let outcome = match tokio::fs::read_to_string(self.mapper.resolve(&path)).await {
            Ok(source) => {
                let call = self.session.set_source(&record.script_id, &source);
                match tokio::time::timeout(self.update_timeout, call).await {
                    Ok(Ok(())) => UpdateOutcome::Applied,
                    Ok(Err(e)) => UpdateOutcome::Failed(FailureReason::Remote(e)),
                    Err(_) => UpdateOutcome::Failed(FailureReason::Timeout(self.update_timeout)),
                }
            }
            Err(e) => UpdateOutcome::Failed(FailureReason::Read(e.to_string())),
        };

        match &outcome {
            UpdateOutcome::Applied => {
                info!(
                    target: "hmr",
                    "Updated {} (script {})",
                    record.canonical_id,
                    record.script_id
                );
            }
            UpdateOutcome::Failed(reason) => {
                warn!(target: "hmr", "Failed to update {}: {}", record.canonical_id, reason);
            }
            UpdateOutcome::SkippedNoMapping => {}
        }

        ItemReport {
            path,
            canonical_id,
            outcome,
        }
    }
}
