//! Batch aggregation (trailing-edge debounce)
//!
//! Events are appended to one open batch. The batch is emitted once no new
//! event has arrived for the quiet window; every event restarts the wait for
//! the whole batch, not per path. An optional max wait caps how long a
//! non-empty batch can stay open under a steady trickle of events.

use crate::config::EngineConfig;
use crate::event::{Batch, FileEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace, warn};

/// The open batch and its timing, independent of any timer
#[derive(Debug, Default)]
pub struct PendingBatch {
    events: Vec<FileEvent>,
    opened_at: Option<Instant>,
    last_event_at: Option<Instant>,
}

impl PendingBatch {
    /// Append an event that arrived at `now`
    pub fn push(&mut self, event: FileEvent, now: Instant) {
        if self.events.is_empty() {
            self.opened_at = Some(now);
        }
        self.last_event_at = Some(now);
        self.events.push(event);
    }

    /// When the batch is due, or `None` while it is empty
    pub fn deadline(&self, quiet: Duration, max_wait: Option<Duration>) -> Option<Instant> {
        let quiet_deadline = self.last_event_at? + quiet;
        match (max_wait, self.opened_at) {
            (Some(max_wait), Some(opened_at)) => Some(quiet_deadline.min(opened_at + max_wait)),
            _ => Some(quiet_deadline),
        }
    }

    /// Hand over the collected events and start a fresh batch
    pub fn take(&mut self) -> Batch {
        self.opened_at = None;
        self.last_event_at = None;
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Producer handle of the aggregator
///
/// Cheap to clone. When every handle is dropped, the pending batch is
/// flushed and the [`BatchStream`] ends.
#[derive(Debug, Clone)]
pub struct Aggregator {
    tx: mpsc::UnboundedSender<FileEvent>,
}

impl Aggregator {
    /// Start the aggregation task on the current tokio runtime
    pub fn spawn(config: &EngineConfig) -> (Self, BatchStream) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            event_rx,
            batch_tx,
            config.quiet_window,
            config.max_wait,
        ));

        (Self { tx: event_tx }, BatchStream { rx: batch_rx, task })
    }

    /// Append an event to the open batch. Never blocks.
    pub fn add(&self, event: FileEvent) {
        if let Err(rejected) = self.tx.send(event) {
            warn!(
                target: "hmr",
                "Aggregator stopped, dropping {} event for {}",
                rejected.0.kind,
                rejected.0.path.display()
            );
        }
    }
}

/// Consumer side: emitted batches in order
#[derive(Debug)]
pub struct BatchStream {
    rx: mpsc::UnboundedReceiver<Batch>,
    task: JoinHandle<()>,
}

impl BatchStream {
    /// Next emitted batch, or `None` once the aggregator has shut down
    pub async fn next(&mut self) -> Option<Batch> {
        self.rx.recv().await
    }
}

impl Drop for BatchStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    batches: mpsc::UnboundedSender<Batch>,
    quiet: Duration,
    max_wait: Option<Duration>,
) {
    let mut pending = PendingBatch::default();

    loop {
        let deadline = pending.deadline(quiet, max_wait);
        // Evaluated even when the branch is disabled
        let wake_at = deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            received = events.recv() => match received {
                Some(event) => {
                    trace!(target: "hmr", "queued {} {}", event.kind, event.path.display());
                    pending.push(event, Instant::now());
                }
                None => {
                    if !pending.is_empty() {
                        debug!(target: "hmr", "Producer closed, flushing {} pending event(s)", pending.len());
                        let _ = batches.send(pending.take());
                    }
                    break;
                }
            },
            _ = sleep_until(wake_at), if deadline.is_some() => {
                let batch = pending.take();
                debug!(target: "hmr", "Emitting batch of {} event(s)", batch.len());
                if batches.send(batch).is_err() {
                    debug!(target: "hmr", "Batch consumer gone, stopping aggregator");
                    break;
                }
            }
        }
    }
}
