use std::time::Duration;
use thiserror::Error;

use super::status::Status;
use crate::error::TilingError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Tiling(#[from] TilingError),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job already registered: {0}")]
    DuplicateJob(String),

    #[error("Illegal status transition for job {job_id}: {from} -> {to}")]
    IllegalTransition {
        job_id: String,
        from: Status,
        to: Status,
    },

    #[error("Job {job_id} still running after {waited:?}")]
    Timeout { job_id: String, waited: Duration },

    #[error("Cache jobs must be launched from within a Tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, JobError>;
