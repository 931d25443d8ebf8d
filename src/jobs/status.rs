use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::CacheJobInfo;
use super::statistics::CacheJobStatistics;
use crate::error::{Result, TilingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Scheduled,
    Running,
    Complete,
    Aborting,
    Aborted,
    Failed,
}

impl Status {
    pub fn is_finished(&self) -> bool {
        matches!(self, Status::Complete | Status::Aborted | Status::Failed)
    }

    /// Legal lifecycle edges. Nothing leaves a finished state.
    pub fn can_transition_to(&self, next: Status) -> bool {
        use Status::*;
        matches!(
            (self, next),
            (Scheduled, Running | Aborting | Failed)
                | (Running, Complete | Aborting | Failed)
                | (Aborting, Aborted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Scheduled => "SCHEDULED",
            Status::Running => "RUNNING",
            Status::Complete => "COMPLETE",
            Status::Aborting => "ABORTING",
            Status::Aborted => "ABORTED",
            Status::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job's progress. Never changed in place: every transition
/// or statistics merge returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheJobStatus {
    job_info: CacheJobInfo,
    status: Status,
    stats: CacheJobStatistics,
}

impl From<CacheJobInfo> for CacheJobStatus {
    fn from(job_info: CacheJobInfo) -> Self {
        Self::new(job_info)
    }
}

impl CacheJobStatus {
    /// A freshly scheduled job with zeroed statistics.
    pub fn new(job_info: CacheJobInfo) -> Self {
        Self {
            job_info,
            status: Status::Scheduled,
            stats: CacheJobStatistics::default(),
        }
    }

    pub fn job_info(&self) -> &CacheJobInfo {
        &self.job_info
    }

    pub fn job_id(&self) -> &str {
        self.job_info.id()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn stats(&self) -> &CacheJobStatistics {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Copy in another state. The transition table is not checked here; see
    /// [`CacheJobRegistry`](super::CacheJobRegistry) for that.
    #[must_use]
    pub fn with_status(&self, status: Status) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_stats(&self, stats: CacheJobStatistics) -> Self {
        Self {
            stats,
            ..self.clone()
        }
    }

    /// Adds `other`'s statistics, keeping this value's job info and state.
    pub fn merge(&self, other: &CacheJobStatus) -> Result<Self> {
        if self.job_id() != other.job_id() {
            return Err(TilingError::JobMismatch {
                expected: self.job_id().to_string(),
                actual: other.job_id().to_string(),
            });
        }
        Ok(self.with_stats(self.stats.merge(&other.stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Action, CacheIdentifier, CacheJobRequest};
    use crate::model::TilePyramid;
    use chrono::Utc;

    fn info(id: &str) -> CacheJobInfo {
        let cache_id = CacheIdentifier::builder()
            .layer_name("roads")
            .gridset_id("EPSG:4326")
            .format("image/png")
            .build()
            .unwrap();
        let request = CacheJobRequest::new(Action::Seed, cache_id, TilePyramid::empty(), Utc::now());
        CacheJobInfo::new(id, request).unwrap()
    }

    #[test]
    fn test_starts_scheduled() {
        let status = CacheJobStatus::from(info("a"));
        assert_eq!(status.status(), Status::Scheduled);
        assert_eq!(*status.stats(), CacheJobStatistics::default());
        assert!(!status.is_running());
        assert!(!status.is_finished());
    }

    #[test]
    fn test_derived_flags() {
        let status = CacheJobStatus::new(info("a"));
        assert!(status.with_status(Status::Running).is_running());
        for finished in [Status::Complete, Status::Aborted, Status::Failed] {
            let s = status.with_status(finished);
            assert!(s.is_finished());
            assert!(!s.is_running());
        }
        assert!(!status.with_status(Status::Aborting).is_finished());
    }

    #[test]
    fn test_transition_table() {
        use Status::*;
        let all = [Scheduled, Running, Complete, Aborting, Aborted, Failed];
        let allowed = [
            (Scheduled, Running),
            (Scheduled, Aborting),
            (Scheduled, Failed),
            (Running, Complete),
            (Running, Aborting),
            (Running, Failed),
            (Aborting, Aborted),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_merge_same_job() {
        let left = CacheJobStatus::new(info("a"))
            .with_status(Status::Running)
            .with_stats(CacheJobStatistics::new(1, 1, 0));
        let right = CacheJobStatus::new(info("a"))
            .with_status(Status::Complete)
            .with_stats(CacheJobStatistics::new(2, 0, 1));

        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.status(), Status::Running);
        assert_eq!(merged.job_info(), left.job_info());
        assert_eq!(*merged.stats(), CacheJobStatistics::new(3, 1, 1));
        // inputs untouched
        assert_eq!(*left.stats(), CacheJobStatistics::new(1, 1, 0));
    }

    #[test]
    fn test_merge_rejects_other_job() {
        let err = CacheJobStatus::new(info("a"))
            .merge(&CacheJobStatus::new(info("b")))
            .unwrap_err();
        assert_eq!(
            err,
            TilingError::JobMismatch {
                expected: "a".into(),
                actual: "b".into()
            }
        );
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_json_shape() {
        let status = CacheJobStatus::new(info("a")).with_status(Status::Aborting);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "ABORTING");
        assert_eq!(json["jobInfo"]["id"], "a");
        assert_eq!(json["stats"]["tilesCreated"], 0);
        assert_eq!(serde_json::from_value::<CacheJobStatus>(json).unwrap(), status);
    }
}
