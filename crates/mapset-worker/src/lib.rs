//! Asynchronous execution of merge jobs.
//!
//! [`MergeWorker::submit`] hands a job to its own tokio task and returns at
//! once with the job id. The [`JobTracker`] records status and progress for
//! every submitted job and doubles as the termination signal the
//! orchestrator polls between steps.

pub mod error;
pub mod tracker;
pub mod worker;

pub use error::{WorkerError, WorkerResult};
pub use tracker::{JobRecord, JobStatus, JobTracker};
pub use worker::{JobHandle, MergeWorker, DEFAULT_RETENTION_SECS};
