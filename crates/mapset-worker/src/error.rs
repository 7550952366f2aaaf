use mapset_merge::MergeError;
use mapset_types::{JobId, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The request was rejected before a job was created.
    #[error("request rejected: {0}")]
    Rejected(#[from] MergeError),

    #[error("unknown job: {0}")]
    UnknownJob(JobId),

    #[error("job {job_id} does not belong to user {user_id}")]
    NotOwner { job_id: JobId, user_id: UserId },

    #[error("job {0} has already finished")]
    AlreadyFinished(JobId),

    #[error("job {0} is still running")]
    StillRunning(JobId),

    #[error("job task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
