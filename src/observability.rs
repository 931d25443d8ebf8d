//! Cache job counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording job and metatile counters
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_launched: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_aborted: AtomicU64,
    jobs_failed: AtomicU64,
    metatiles_dispatched: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_launched(&self) {
        self.jobs_launched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_launched", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn job_aborted(&self) {
        self.jobs_aborted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_aborted", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn metatile_dispatched(&self) {
        self.metatiles_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_launched: self.jobs_launched.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_aborted: self.jobs_aborted.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            metatiles_dispatched: self.metatiles_dispatched.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub jobs_launched: u64,
    pub jobs_completed: u64,
    pub jobs_aborted: u64,
    pub jobs_failed: u64,
    pub metatiles_dispatched: u64,
}

impl MetricsSnapshot {
    /// Launched jobs that have not reached a finished state yet.
    pub fn jobs_in_flight(&self) -> u64 {
        self.jobs_launched.saturating_sub(
            self.jobs_completed + self.jobs_aborted + self.jobs_failed,
        )
    }
}
