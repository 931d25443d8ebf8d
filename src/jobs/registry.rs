use parking_lot::RwLock;
use std::collections::BTreeMap;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::error::{JobError, Result};
use super::statistics::CacheJobStatistics;
use super::status::{CacheJobStatus, Status};

/// Latest [`CacheJobStatus`] per job id.
///
/// Each update replaces the stored value under the write lock, so readers
/// only ever see whole snapshots. Status changes are checked against
/// [`Status::can_transition_to`].
#[derive(Debug, Default)]
pub struct CacheJobRegistry {
    jobs: RwLock<BTreeMap<String, CacheJobStatus>>,
    changed: Notify,
}

impl CacheJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, status: CacheJobStatus) -> Result<()> {
        let job_id = status.job_id().to_string();
        {
            let mut jobs = self.jobs.write();
            if jobs.contains_key(&job_id) {
                return Err(JobError::DuplicateJob(job_id));
            }
            jobs.insert(job_id.clone(), status);
        }
        debug!(job_id = %job_id, "Job registered");
        self.changed.notify_waiters();
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Option<CacheJobStatus> {
        self.jobs.read().get(job_id).cloned()
    }

    /// All jobs, ordered by id (UUIDv7 ids sort by creation time).
    pub fn get_all(&self) -> Vec<CacheJobStatus> {
        self.jobs.read().values().cloned().collect()
    }

    /// Jobs not yet in a finished state.
    pub fn get_all_alive(&self) -> Vec<CacheJobStatus> {
        self.jobs
            .read()
            .values()
            .filter(|status| !status.is_finished())
            .cloned()
            .collect()
    }

    pub fn transition(&self, job_id: &str, next: Status) -> Result<CacheJobStatus> {
        self.update(job_id, |_| Some(next))
    }

    /// Atomically picks the next state from the current snapshot; `None`
    /// leaves the job as it is.
    pub fn update<F>(&self, job_id: &str, next: F) -> Result<CacheJobStatus>
    where
        F: FnOnce(&CacheJobStatus) -> Option<Status>,
    {
        let updated = {
            let mut jobs = self.jobs.write();
            let current = jobs
                .get_mut(job_id)
                .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))?;

            let Some(next) = next(current) else {
                return Ok(current.clone());
            };
            let from = current.status();
            if !from.can_transition_to(next) {
                warn!(job_id, %from, to = %next, "Rejected status transition");
                return Err(JobError::IllegalTransition {
                    job_id: job_id.to_string(),
                    from,
                    to: next,
                });
            }
            *current = current.with_status(next);
            current.clone()
        };

        debug!(job_id, status = %updated.status(), "Job status changed");
        self.changed.notify_waiters();
        Ok(updated)
    }

    /// Folds a worker's delta into the job's statistics.
    pub fn merge_statistics(
        &self,
        job_id: &str,
        delta: &CacheJobStatistics,
    ) -> Result<CacheJobStatus> {
        let mut jobs = self.jobs.write();
        let current = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()))?;
        *current = current.with_stats(current.stats().merge(delta));
        Ok(current.clone())
    }

    /// Drops finished jobs, returning what was removed.
    pub fn remove_finished(&self) -> Vec<CacheJobStatus> {
        let mut jobs = self.jobs.write();
        let finished: Vec<String> = jobs
            .iter()
            .filter(|(_, status)| status.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        finished
            .iter()
            .filter_map(|id| jobs.remove(id))
            .collect()
    }

    /// Resolves on the next registration or status change.
    pub(crate) fn changed(&self) -> tokio::sync::futures::Notified<'_> {
        self.changed.notified()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
