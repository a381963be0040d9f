//! Synchronizer counters.
//!
//! Counts passes, inserted rows, benign duplicate inserts and failures so the
//! health endpoint can show whether reconciliation is keeping up.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use super::PassReport;

/// Counters for one synchronizer instance.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    /// Number of completed passes (including interrupted ones)
    passes: AtomicUsize,

    /// Passes that could not even list the supported locales
    aborted_passes: AtomicUsize,

    /// Rows created by the synchronizer
    rows_inserted: AtomicUsize,

    /// Inserts that found the row already present (lost races)
    duplicate_inserts: AtomicUsize,

    /// Locale batches that failed and were left for the next pass
    locale_failures: AtomicUsize,

    /// Unix millis of the last finished pass, 0 if none
    last_pass_at: AtomicI64,
}

/// Snapshot of [`SyncMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsReport {
    pub passes: usize,
    pub aborted_passes: usize,
    pub rows_inserted: usize,
    pub duplicate_inserts: usize,
    pub locale_failures: usize,
    pub last_pass_at: Option<DateTime<Utc>>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a finished pass.
    pub fn record_pass(&self, report: &PassReport) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        if report.aborted {
            self.aborted_passes.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_inserted
            .fetch_add(report.inserted, Ordering::Relaxed);
        self.duplicate_inserts
            .fetch_add(report.already_present, Ordering::Relaxed);
        self.locale_failures
            .fetch_add(report.failed_locales.len(), Ordering::Relaxed);
        self.last_pass_at
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn rows_inserted(&self) -> usize {
        self.rows_inserted.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let last_pass_at = match self.last_pass_at.load(Ordering::Relaxed) {
            0 => None,
            millis => DateTime::from_timestamp_millis(millis),
        };

        MetricsReport {
            passes: self.passes(),
            aborted_passes: self.aborted_passes.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted(),
            duplicate_inserts: self.duplicate_inserts.load(Ordering::Relaxed),
            locale_failures: self.locale_failures.load(Ordering::Relaxed),
            last_pass_at,
        }
    }
}
