//! Batch pipeline
//!
//! Feeds emitted batches through the dispatcher strictly one at a time:
//! batch N is fully resolved before batch N+1 is taken from the aggregator.
//! The aggregator keeps collecting meanwhile, so nothing is lost; this only
//! bounds the number of in-flight remote calls to a single batch.

use crate::debounce::BatchStream;
use crate::dispatch::{BatchReport, Dispatcher};
use tracing::info;

/// Running totals over all processed batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches: usize,
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl PipelineStats {
    pub fn record(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.applied += report.applied();
        self.skipped += report.skipped();
        self.failed += report.failed();
    }
}

/// Process batches until the stream ends
///
/// `on_report` sees every batch report in emission order.
pub async fn drive<F>(batches: &mut BatchStream, dispatcher: &Dispatcher, mut on_report: F) -> PipelineStats
where
    F: FnMut(&BatchReport),
{
    let mut stats = PipelineStats::default();

    while let Some(batch) = batches.next().await {
        info!(target: "hmr", "Pushing {} file event(s)", batch.len());

        let report = dispatcher.dispatch(batch).await;
        stats.record(&report);
        on_report(&report);
    }

    stats
}
