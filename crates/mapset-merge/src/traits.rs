//! Ports to the collaborators the orchestrator drives but does not own.

use async_trait::async_trait;
use mapset_types::{JobId, LocationName, MapsetName, UserId};

use crate::error::BackendError;
use crate::job::MergeJob;
use crate::report::{JobReport, ProgressUpdate};

/// Existence oracle for mapsets.
#[async_trait]
pub trait MapsetCatalog: Send + Sync {
    async fn exists(&self, location: &LocationName, mapset: &MapsetName) -> Result<bool, BackendError>;
}

/// The copy primitive: merges the content of one mapset into another.
///
/// May be slow. The orchestrator only calls it right after every held lease
/// has been renewed.
#[async_trait]
pub trait MergeExecutor: Send + Sync {
    async fn merge_into(
        &self,
        location: &LocationName,
        source: &MapsetName,
        target: &MapsetName,
    ) -> Result<(), BackendError>;

    /// Release job-owned working data. Runs during cleanup, before any
    /// lease is released.
    async fn teardown(&self, _job: &MergeJob) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Cooperative cancellation, polled once per step boundary.
#[async_trait]
pub trait TerminationSignal: Send + Sync {
    async fn is_termination_requested(&self, user_id: &UserId, job_id: &JobId) -> bool;
}

/// Receives progress and the final report of each job.
#[async_trait]
pub trait StatusReporter: Send + Sync {
    async fn started(&self, _job: &MergeJob) {}

    async fn progress(&self, update: &ProgressUpdate);

    async fn finish(&self, report: &JobReport);
}

/// A [`TerminationSignal`] that never fires.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverTerminate;

#[async_trait]
impl TerminationSignal for NeverTerminate {
    async fn is_termination_requested(&self, _user_id: &UserId, _job_id: &JobId) -> bool {
        false
    }
}

/// A [`StatusReporter`] that discards everything. The orchestrator still logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

#[async_trait]
impl StatusReporter for NullReporter {
    async fn progress(&self, _update: &ProgressUpdate) {}

    async fn finish(&self, _report: &JobReport) {}
}
