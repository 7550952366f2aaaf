use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapset_merge::{JobOutcome, JobReport, MergeJob, ProgressUpdate, StatusReporter, TerminationSignal};
use mapset_types::{JobId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{WorkerError, WorkerResult};

/// Lifecycle state of a submitted job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Finished,
    Error,
    Terminated,
}

impl JobStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Terminated)
    }
}

impl From<&JobOutcome> for JobStatus {
    fn from(outcome: &JobOutcome) -> Self {
        match outcome {
            JobOutcome::Finished => Self::Finished,
            JobOutcome::Terminated { .. } => Self::Terminated,
            JobOutcome::Failed(_) => Self::Error,
        }
    }
}

/// Everything known about one job.
#[derive(Clone, Debug)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_id: UserId,
    pub status: JobStatus,
    pub progress: Vec<ProgressUpdate>,
    pub report: Option<JobReport>,
    pub termination_requested: bool,
    pub accepted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// The most recent progress message, if any step has started.
    pub fn last_message(&self) -> Option<&str> {
        self.progress.last().map(|u| u.message.as_str())
    }
}

/// In-memory status store for submitted jobs.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job as accepted.
    pub fn accept(&self, job: &MergeJob) {
        let now = Utc::now();
        let record = JobRecord {
            job_id: job.job_id,
            user_id: job.user_id.clone(),
            status: JobStatus::Accepted,
            progress: Vec::new(),
            report: None,
            termination_requested: false,
            accepted_at: now,
            updated_at: now,
        };
        self.jobs
            .write()
            .expect("lock poisoned")
            .insert(job.job_id, record);
    }

    pub fn get(&self, job_id: &JobId) -> Option<JobRecord> {
        self.jobs.read().expect("lock poisoned").get(job_id).cloned()
    }

    /// All jobs of one user, oldest first.
    pub fn jobs_of(&self, user_id: &UserId) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self
            .jobs
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.job_id);
        records
    }

    /// Ask a job to stop at its next step boundary.
    pub fn request_termination(&self, user_id: &UserId, job_id: &JobId) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().expect("lock poisoned");
        let record = jobs.get_mut(job_id).ok_or(WorkerError::UnknownJob(*job_id))?;
        if &record.user_id != user_id {
            return Err(WorkerError::NotOwner {
                job_id: *job_id,
                user_id: user_id.clone(),
            });
        }
        if record.status.is_final() {
            return Err(WorkerError::AlreadyFinished(*job_id));
        }
        record.termination_requested = true;
        record.updated_at = Utc::now();
        info!(job = %job_id, user = %user_id, "termination requested");
        Ok(())
    }

    /// Drop the record of a job that has reached a final state.
    pub fn forget(&self, user_id: &UserId, job_id: &JobId) -> WorkerResult<JobRecord> {
        let mut jobs = self.jobs.write().expect("lock poisoned");
        let record = jobs.get(job_id).ok_or(WorkerError::UnknownJob(*job_id))?;
        if &record.user_id != user_id {
            return Err(WorkerError::NotOwner {
                job_id: *job_id,
                user_id: user_id.clone(),
            });
        }
        if !record.status.is_final() {
            return Err(WorkerError::StillRunning(*job_id));
        }
        jobs.remove(job_id).ok_or(WorkerError::UnknownJob(*job_id))
    }

    /// Drop every final record last updated at least `older_than` ago.
    /// Returns how many were removed.
    pub fn prune_finished(&self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.write().expect("lock poisoned");
        let before = jobs.len();
        jobs.retain(|_, r| !(r.status.is_final() && r.updated_at <= cutoff));
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, "pruned finished jobs");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update(&self, job_id: &JobId, f: impl FnOnce(&mut JobRecord)) {
        if let Some(record) = self.jobs.write().expect("lock poisoned").get_mut(job_id) {
            f(record);
            record.updated_at = Utc::now();
        }
    }
}

#[async_trait]
impl StatusReporter for JobTracker {
    async fn started(&self, job: &MergeJob) {
        self.update(&job.job_id, |r| r.status = JobStatus::Running);
    }

    async fn progress(&self, update: &ProgressUpdate) {
        self.update(&update.job_id, |r| r.progress.push(update.clone()));
    }

    async fn finish(&self, report: &JobReport) {
        self.update(&report.job_id, |r| {
            r.status = JobStatus::from(&report.outcome);
            r.report = Some(report.clone());
        });
    }
}

#[async_trait]
impl TerminationSignal for JobTracker {
    async fn is_termination_requested(&self, user_id: &UserId, job_id: &JobId) -> bool {
        self.jobs
            .read()
            .expect("lock poisoned")
            .get(job_id)
            .is_some_and(|r| &r.user_id == user_id && r.termination_requested)
    }
}
