//! Metrics for settings batches
//!
//! Counters and histograms are emitted through the `metrics` facade; they
//! are no-ops until the host installs a recorder.

use crate::registry::{BatchKind, BatchReport};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!("settings.batch.total", "Save and load batches run");
    describe_counter!("settings.cells.written", "Settings written to storage");
    describe_counter!("settings.cells.loaded", "Settings restored from storage");
    describe_counter!("settings.cells.failed", "Per-setting batch failures");
    describe_counter!("settings.commit.failed", "Failed commits");
    describe_counter!("settings.open.failed", "Batches aborted because the namespace could not be opened");
    describe_counter!("settings.init.failed", "Fatal storage initialization failures");
    describe_histogram!("settings.batch.duration_ms", "Batch duration in milliseconds");
}

pub(crate) fn record_batch(report: &BatchReport) {
    let kind = match report.kind {
        BatchKind::Save => "save",
        BatchKind::Load => "load",
    };
    counter!("settings.batch.total", "kind" => kind).increment(1);
    counter!("settings.cells.written").increment(report.written as u64);
    counter!("settings.cells.loaded").increment(report.loaded as u64);
    counter!("settings.cells.failed", "kind" => kind).increment(report.hard_failures().count() as u64);
    if report.commit_error.is_some() {
        counter!("settings.commit.failed").increment(1);
    }
}

pub(crate) fn record_open_failure() {
    counter!("settings.open.failed").increment(1);
}

pub(crate) fn record_init_failure() {
    counter!("settings.init.failed").increment(1);
}

/// Timer for measuring batch duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!("settings.batch.duration_ms").record(duration.as_secs_f64() * 1000.0);
    }
}
