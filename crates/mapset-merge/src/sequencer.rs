use std::time::Duration;

use mapset_lease::LeaseService;
use mapset_types::LeaseKey;
use tracing::{debug, info, warn};

use crate::error::{LeaseFailure, MergeError, MergeResult};
use crate::job::MergeJob;
use crate::registry::LockRegistry;
use crate::report::ProgressUpdate;
use crate::traits::{MergeExecutor, StatusReporter, TerminationSignal};

/// The held lease that could not be renewed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionFailure {
    pub key: LeaseKey,
    pub cause: LeaseFailure,
}

/// Renew every lease in the registry to `ttl` from now.
///
/// Stops at the first lease that cannot be renewed: from then on exclusivity
/// is gone for the whole job.
pub async fn extend_all(
    leases: &dyn LeaseService,
    registry: &LockRegistry,
    ttl: Duration,
) -> Result<(), ExtensionFailure> {
    for held in registry.iter() {
        let cause = match leases.extend(&held.key, ttl).await {
            Ok(true) => {
                debug!(key = %held.key, ttl_secs = ttl.as_secs(), "lease extended");
                continue;
            }
            Ok(false) => LeaseFailure::Refused,
            Err(e) => e.into(),
        };
        return Err(ExtensionFailure {
            key: held.key.clone(),
            cause,
        });
    }
    Ok(())
}

/// Step position of a running job.
///
/// `step` is the number shown in the next progress message; it only
/// advances after a merge succeeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepCounter {
    pub step: usize,
    pub total_steps: usize,
}

impl StepCounter {
    pub fn new(total_steps: usize) -> Self {
        Self {
            step: 1,
            total_steps,
        }
    }

    /// Merges completed so far.
    pub fn completed(&self) -> usize {
        self.step - 1
    }
}

/// Runs the merges of one job over its locked mapsets.
pub struct MergeSequencer<'a> {
    leases: &'a dyn LeaseService,
    executor: &'a dyn MergeExecutor,
    termination: &'a dyn TerminationSignal,
    status: &'a dyn StatusReporter,
    job: &'a MergeJob,
}

impl<'a> MergeSequencer<'a> {
    pub fn new(
        leases: &'a dyn LeaseService,
        executor: &'a dyn MergeExecutor,
        termination: &'a dyn TerminationSignal,
        status: &'a dyn StatusReporter,
        job: &'a MergeJob,
    ) -> Self {
        Self {
            leases,
            executor,
            termination,
            status,
            job,
        }
    }

    /// Merge every registered mapset into the target, in registration order.
    ///
    /// Each step polls for termination, renews all held leases, reports
    /// progress and then merges. The target's own entry is reported but not
    /// merged. Leases are left in the registry whatever happens.
    pub async fn run(&self, registry: &LockRegistry, counter: &mut StepCounter) -> MergeResult<()> {
        let job = self.job;
        for mapset in registry.mapsets() {
            if self
                .termination
                .is_termination_requested(&job.user_id, &job.job_id)
                .await
            {
                info!(job = %job.job_id, step = counter.step, total = counter.total_steps, "termination requested");
                return Err(MergeError::JobTerminated {
                    step: counter.step,
                    total_steps: counter.total_steps,
                });
            }

            if let Err(failure) = extend_all(self.leases, registry, job.lease_extension).await {
                warn!(
                    job = %job.job_id,
                    mapset = %mapset,
                    key = %failure.key,
                    cause = %failure.cause,
                    "unable to extend lease"
                );
                return Err(MergeError::LeaseLost {
                    mapset,
                    key: failure.key,
                    cause: failure.cause,
                });
            }

            let message = format!(
                "Step {} of {}: Copy content from source mapset <{}> into target mapset <{}>",
                counter.step, counter.total_steps, mapset, job.target
            );
            info!(job = %job.job_id, "{message}");
            self.status
                .progress(&ProgressUpdate {
                    job_id: job.job_id,
                    step: counter.step,
                    total_steps: counter.total_steps,
                    source: mapset.clone(),
                    target: job.target.clone(),
                    message,
                })
                .await;

            if mapset == job.target {
                debug!(job = %job.job_id, mapset = %mapset, "skipping merge of target into itself");
                continue;
            }

            self.executor
                .merge_into(&job.location, &mapset, &job.target)
                .await
                .map_err(|e| MergeError::MergeExecutionFailed {
                    source_mapset: mapset.clone(),
                    target_mapset: job.target.clone(),
                    reason: e.to_string(),
                })?;
            counter.step += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergeConfig;
    use crate::memory::{InMemoryExecutor, InMemoryStatusLog, InMemoryTermination};
    use mapset_lease::InMemoryLeaseService;
    use mapset_types::{MapsetName, MergeRequest, UserId};

    fn job(target: &str, sources: &[&str]) -> MergeJob {
        let req = MergeRequest::new("loc", target, sources.iter().copied());
        MergeJob::from_request(&req, UserId::new("u"), &MergeConfig::default()).unwrap()
    }

    fn mapset(name: &str) -> MapsetName {
        MapsetName::new(name).unwrap()
    }

    async fn locked(job: &MergeJob, leases: &InMemoryLeaseService, names: &[&str]) -> LockRegistry {
        let mut registry = LockRegistry::new();
        for name in names {
            let key = job.key_for(&mapset(name));
            assert!(leases.lock(&key, job.lease_ttl).await.unwrap());
            registry.register(key, mapset(name));
        }
        registry
    }

    #[tokio::test]
    async fn merges_in_registration_order_skipping_target() {
        let job = job("T", &["A", "B"]);
        let leases = InMemoryLeaseService::new();
        let registry = locked(&job, &leases, &["T", "A", "B"]).await;
        let executor = InMemoryExecutor::new();
        let status = InMemoryStatusLog::new();
        let termination = InMemoryTermination::new();
        let mut counter = StepCounter::new(job.total_steps());

        MergeSequencer::new(&leases, &executor, &termination, &status, &job)
            .run(&registry, &mut counter)
            .await
            .unwrap();

        assert_eq!(
            executor.merges(),
            vec![(mapset("A"), mapset("T")), (mapset("B"), mapset("T"))]
        );
        assert_eq!(counter.completed(), 2);

        let steps: Vec<usize> = status.updates().iter().map(|u| u.step).collect();
        assert_eq!(steps, [1, 1, 2]);
        assert_eq!(
            status.updates()[1].message,
            "Step 1 of 2: Copy content from source mapset <A> into target mapset <T>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn every_lease_is_renewed_each_step() {
        let job = job("T", &["A"]);
        let leases = InMemoryLeaseService::new();
        let registry = locked(&job, &leases, &["T", "A"]).await;

        extend_all(&leases, &registry, Duration::from_secs(5)).await.unwrap();
        for held in registry.iter() {
            assert_eq!(leases.remaining(&held.key), Some(Duration::from_secs(5)));
        }
    }

    #[tokio::test]
    async fn extend_all_reports_first_lost_key() {
        let job = job("T", &["A", "B"]);
        let leases = InMemoryLeaseService::new();
        let registry = locked(&job, &leases, &["T", "A", "B"]).await;
        leases.unlock(&job.key_for(&mapset("A"))).await.unwrap();

        let failure = extend_all(&leases, &registry, job.lease_extension).await.unwrap_err();
        assert_eq!(failure.key, job.key_for(&mapset("A")));
        assert_eq!(failure.cause, LeaseFailure::Refused);
    }

    #[tokio::test]
    async fn termination_stops_before_any_merge() {
        let job = job("T", &["A"]);
        let leases = InMemoryLeaseService::new();
        let registry = locked(&job, &leases, &["T", "A"]).await;
        let executor = InMemoryExecutor::new();
        let status = InMemoryStatusLog::new();
        let termination = InMemoryTermination::new();
        termination.request(&job.user_id, &job.job_id);
        let mut counter = StepCounter::new(job.total_steps());

        let err = MergeSequencer::new(&leases, &executor, &termination, &status, &job)
            .run(&registry, &mut counter)
            .await
            .unwrap_err();

        assert_eq!(err, MergeError::JobTerminated { step: 1, total_steps: 1 });
        assert!(executor.merges().is_empty());
        assert!(status.updates().is_empty());
    }

    #[tokio::test]
    async fn executor_failure_stops_remaining_merges() {
        let job = job("T", &["A", "B"]);
        let leases = InMemoryLeaseService::new();
        let registry = locked(&job, &leases, &["T", "A", "B"]).await;
        let executor = InMemoryExecutor::new();
        executor.fail_on(mapset("A"));
        let status = InMemoryStatusLog::new();
        let termination = InMemoryTermination::new();
        let mut counter = StepCounter::new(job.total_steps());

        let err = MergeSequencer::new(&leases, &executor, &termination, &status, &job)
            .run(&registry, &mut counter)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MergeError::MergeExecutionFailed { ref source_mapset, .. } if *source_mapset == mapset("A")
        ));
        assert!(executor.merges().is_empty());
        assert_eq!(counter.completed(), 0);
    }
}
