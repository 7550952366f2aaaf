use std::sync::Arc;
use std::time::Instant;

use mapset_lease::LeaseService;
use tracing::{info, warn};

use crate::cleanup::cleanup;
use crate::error::MergeResult;
use crate::guard::LeaseGuard;
use crate::job::MergeJob;
use crate::registry::LockRegistry;
use crate::report::{JobOutcome, JobReport};
use crate::sequencer::{MergeSequencer, StepCounter};
use crate::traits::{
    MapsetCatalog, MergeExecutor, NeverTerminate, NullReporter, StatusReporter, TerminationSignal,
};

/// Runs merge jobs end to end: lock, merge, clean up, report.
///
/// The orchestrator holds no per-job state; every call to
/// [`Self::execute`] owns its own [`LockRegistry`], so one orchestrator can
/// serve many concurrent jobs. Jobs exclude each other only through the
/// lease service.
pub struct MergeOrchestrator {
    leases: Arc<dyn LeaseService>,
    catalog: Arc<dyn MapsetCatalog>,
    executor: Arc<dyn MergeExecutor>,
    termination: Arc<dyn TerminationSignal>,
    status: Arc<dyn StatusReporter>,
}

impl MergeOrchestrator {
    /// Create an orchestrator that is never terminated and reports only to
    /// the log. Use the `with_*` methods to attach those collaborators.
    pub fn new(
        leases: Arc<dyn LeaseService>,
        catalog: Arc<dyn MapsetCatalog>,
        executor: Arc<dyn MergeExecutor>,
    ) -> Self {
        Self {
            leases,
            catalog,
            executor,
            termination: Arc::new(NeverTerminate),
            status: Arc::new(NullReporter),
        }
    }

    pub fn with_termination(mut self, termination: Arc<dyn TerminationSignal>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusReporter>) -> Self {
        self.status = status;
        self
    }

    /// Run one job to completion.
    ///
    /// Never fails: the first fatal condition becomes the report's outcome.
    /// Cleanup runs exactly once, after the merge phase and before the final
    /// status is reported.
    pub async fn execute(&self, job: &MergeJob) -> JobReport {
        let started = Instant::now();
        info!(
            job = %job.job_id,
            user = %job.user_id,
            location = %job.location,
            target = %job.target,
            sources = job.sources.len(),
            "merge job started"
        );
        self.status.started(job).await;

        let mut registry = LockRegistry::new();
        let mut counter = StepCounter::new(job.total_steps());
        let result = self.merge(job, &mut registry, &mut counter).await;
        let cleanup = cleanup(self.leases.as_ref(), self.executor.as_ref(), job, &mut registry).await;

        let outcome = JobOutcome::from(result);
        match &outcome {
            JobOutcome::Finished => {
                info!(job = %job.job_id, merged = counter.completed(), "merge job finished")
            }
            JobOutcome::Terminated { step, .. } => {
                info!(job = %job.job_id, step, "merge job terminated")
            }
            JobOutcome::Failed(e) => {
                warn!(job = %job.job_id, kind = e.kind(), error = %e, "merge job failed")
            }
        }

        let report = JobReport {
            job_id: job.job_id,
            user_id: job.user_id.clone(),
            outcome,
            steps_completed: counter.completed(),
            total_steps: counter.total_steps,
            cleanup,
            elapsed: started.elapsed(),
        };
        self.status.finish(&report).await;
        report
    }

    /// Lock target, lock sources, run the merges. Leases stay registered on
    /// every path out of here.
    async fn merge(
        &self,
        job: &MergeJob,
        registry: &mut LockRegistry,
        counter: &mut StepCounter,
    ) -> MergeResult<()> {
        job.validate()?;

        let guard = LeaseGuard::new(self.leases.as_ref(), self.catalog.as_ref(), job);
        guard.acquire(registry, &job.target).await?;
        guard.acquire_all(registry, &job.sources).await?;

        MergeSequencer::new(
            self.leases.as_ref(),
            self.executor.as_ref(),
            self.termination.as_ref(),
            self.status.as_ref(),
            job,
        )
        .run(registry, counter)
        .await
    }
}

impl std::fmt::Debug for MergeOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeOrchestrator").finish_non_exhaustive()
    }
}
