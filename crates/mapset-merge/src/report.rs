use std::time::Duration;

use mapset_types::{JobId, LeaseKey, MapsetName, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};

/// Progress message emitted at every step boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub job_id: JobId,
    pub step: usize,
    pub total_steps: usize,
    pub source: MapsetName,
    pub target: MapsetName,
    pub message: String,
}

/// How a job ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    Finished,
    /// Stopped on user request at a step boundary.
    Terminated { step: usize, total_steps: usize },
    Failed(MergeError),
}

impl JobOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Short status word for status channels.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Finished => "finished",
            Self::Terminated { .. } => "terminated",
            Self::Failed(_) => "error",
        }
    }
}

impl From<MergeResult<()>> for JobOutcome {
    fn from(result: MergeResult<()>) -> Self {
        match result {
            Ok(()) => Self::Finished,
            Err(MergeError::JobTerminated { step, total_steps }) => {
                Self::Terminated { step, total_steps }
            }
            Err(e) => Self::Failed(e),
        }
    }
}

/// What cleanup released.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Leases released successfully.
    pub released: usize,
    /// Leases whose release failed. Logged, never raised.
    pub unlock_failures: Vec<LeaseKey>,
    /// Set when the executor teardown failed.
    pub teardown_error: Option<String>,
}

impl CleanupReport {
    /// Number of unlock attempts, successful or not.
    pub fn attempted(&self) -> usize {
        self.released + self.unlock_failures.len()
    }
}

/// Final status of one job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: JobId,
    pub user_id: UserId,
    pub outcome: JobOutcome,
    /// Merges that completed before the job ended.
    pub steps_completed: usize,
    pub total_steps: usize,
    pub cleanup: CleanupReport,
    pub elapsed: Duration,
}
