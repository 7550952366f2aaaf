use std::sync::Arc;

use mapset_lease::LeaseService;
use mapset_merge::{JobReport, MapsetCatalog, MergeConfig, MergeExecutor, MergeJob, MergeOrchestrator};
use mapset_types::{JobId, MergeRequest, UserId};
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::WorkerResult;
use crate::tracker::{JobRecord, JobTracker};

/// A submitted job running on its own task.
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    handle: JoinHandle<JobReport>,
}

impl JobHandle {
    /// Wait for the job to finish and return its report.
    pub async fn wait(self) -> WorkerResult<JobReport> {
        Ok(self.handle.await?)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Accepts merge jobs and runs each one in the background.
///
/// The worker's [`JobTracker`] is wired into the orchestrator both as the
/// status reporter and as the termination signal, so [`Self::terminate`]
/// takes effect at the job's next step boundary.
#[derive(Debug, Clone)]
pub struct MergeWorker {
    orchestrator: Arc<MergeOrchestrator>,
    tracker: Arc<JobTracker>,
    config: MergeConfig,
    retention: chrono::Duration,
}

/// Seconds a final job record stays queryable by default.
pub const DEFAULT_RETENTION_SECS: i64 = 3600;

impl MergeWorker {
    pub fn new(
        leases: Arc<dyn LeaseService>,
        catalog: Arc<dyn MapsetCatalog>,
        executor: Arc<dyn MergeExecutor>,
        config: MergeConfig,
    ) -> Self {
        let tracker = Arc::new(JobTracker::new());
        let orchestrator = MergeOrchestrator::new(leases, catalog, executor)
            .with_termination(tracker.clone())
            .with_status(tracker.clone());
        Self {
            orchestrator: Arc::new(orchestrator),
            tracker,
            config,
            retention: chrono::Duration::seconds(DEFAULT_RETENTION_SECS),
        }
    }

    /// Keep final job records for `retention` before they are pruned.
    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Validate a request, build its job and submit it.
    ///
    /// An invalid request is rejected here and never reaches the tracker.
    pub fn submit_request(&self, request: &MergeRequest, user_id: UserId) -> WorkerResult<JobHandle> {
        let job = MergeJob::from_request(request, user_id, &self.config)?;
        Ok(self.submit(job))
    }

    /// Start a job in the background. Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, job: MergeJob) -> JobHandle {
        let job_id = job.job_id;
        self.tracker.prune_finished(self.retention);
        self.tracker.accept(&job);
        info!(job = %job_id, user = %job.user_id, target = %job.target, "merge job accepted");

        let orchestrator = self.orchestrator.clone();
        let handle = tokio::spawn(async move { orchestrator.execute(&job).await });
        JobHandle { job_id, handle }
    }

    pub fn status(&self, job_id: &JobId) -> Option<JobRecord> {
        self.tracker.get(job_id)
    }

    /// Ask a running job to stop before its next step.
    pub fn terminate(&self, user_id: &UserId, job_id: &JobId) -> WorkerResult<()> {
        self.tracker.request_termination(user_id, job_id)
    }

    /// Drop the record of a finished job once its report has been read.
    pub fn forget(&self, user_id: &UserId, job_id: &JobId) -> WorkerResult<JobRecord> {
        self.tracker.forget(user_id, job_id)
    }
}
