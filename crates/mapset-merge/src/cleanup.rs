use mapset_lease::LeaseService;
use tracing::{info, warn};

use crate::job::MergeJob;
use crate::registry::LockRegistry;
use crate::report::CleanupReport;
use crate::traits::MergeExecutor;

/// Release every lease in the registry, best effort.
///
/// An unlock failure is logged and recorded; the remaining leases are still
/// released. The registry is empty afterwards.
pub async fn release_all(leases: &dyn LeaseService, registry: &mut LockRegistry) -> CleanupReport {
    let mut report = CleanupReport::default();
    for held in registry.drain() {
        match leases.unlock(&held.key).await {
            Ok(()) => {
                info!(mapset = %held.mapset, key = %held.key, "mapset unlocked");
                report.released += 1;
            }
            Err(e) => {
                warn!(mapset = %held.mapset, key = %held.key, error = %e, "failed to unlock mapset");
                report.unlock_failures.push(held.key);
            }
        }
    }
    report
}

/// Final cleanup of a job: executor teardown first, then lease release.
pub async fn cleanup(
    leases: &dyn LeaseService,
    executor: &dyn MergeExecutor,
    job: &MergeJob,
    registry: &mut LockRegistry,
) -> CleanupReport {
    let teardown_error = match executor.teardown(job).await {
        Ok(()) => None,
        Err(e) => {
            warn!(job = %job.job_id, error = %e, "executor teardown failed");
            Some(e.to_string())
        }
    };
    let mut report = release_all(leases, registry).await;
    report.teardown_error = teardown_error;
    report
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use mapset_lease::{InMemoryLeaseService, LeaseError, LeaseResult};
    use mapset_types::{LeaseKey, LocationName, MapsetName, MergeRequest, UserGroup, UserId};

    use super::*;
    use crate::config::MergeConfig;
    use crate::error::BackendError;

    /// Unlock fails for one key, succeeds for the rest.
    struct FlakyUnlock {
        inner: InMemoryLeaseService,
        broken: LeaseKey,
    }

    #[async_trait]
    impl LeaseService for FlakyUnlock {
        async fn lock(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
            self.inner.lock(key, ttl).await
        }

        async fn extend(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
            self.inner.extend(key, ttl).await
        }

        async fn unlock(&self, key: &LeaseKey) -> LeaseResult<()> {
            if key == &self.broken {
                return Err(LeaseError::Backend("connection reset".into()));
            }
            self.inner.unlock(key).await
        }
    }

    /// Records which leases were still held when teardown ran, then fails.
    struct FailingTeardown {
        leases: Arc<InMemoryLeaseService>,
        held_at_teardown: Mutex<Option<Vec<LeaseKey>>>,
    }

    #[async_trait]
    impl MergeExecutor for FailingTeardown {
        async fn merge_into(
            &self,
            _location: &LocationName,
            _source: &MapsetName,
            _target: &MapsetName,
        ) -> Result<(), BackendError> {
            Ok(())
        }

        async fn teardown(&self, _job: &MergeJob) -> Result<(), BackendError> {
            *self.held_at_teardown.lock().expect("lock poisoned") = Some(self.leases.held_keys());
            Err(BackendError::other("scratch directory vanished"))
        }
    }

    fn key(name: &str) -> (LeaseKey, MapsetName) {
        let mapset = MapsetName::new(name).unwrap();
        let key = LeaseKey::derive(
            &UserGroup::new("g").unwrap(),
            &LocationName::new("loc").unwrap(),
            &mapset,
        );
        (key, mapset)
    }

    #[tokio::test]
    async fn releases_everything_and_empties_registry() {
        let leases = InMemoryLeaseService::new();
        let mut registry = LockRegistry::new();
        for name in ["T", "A", "B"] {
            let (k, m) = key(name);
            leases.lock(&k, Duration::from_secs(60)).await.unwrap();
            registry.register(k, m);
        }

        let report = release_all(&leases, &mut registry).await;
        assert_eq!(report.released, 3);
        assert!(report.unlock_failures.is_empty());
        assert!(registry.is_empty());
        assert!(leases.held_keys().is_empty());
    }

    #[tokio::test]
    async fn continues_past_unlock_failure() {
        let (broken, _) = key("A");
        let leases = FlakyUnlock {
            inner: InMemoryLeaseService::new(),
            broken: broken.clone(),
        };
        let mut registry = LockRegistry::new();
        for name in ["T", "A", "B"] {
            let (k, m) = key(name);
            leases.lock(&k, Duration::from_secs(60)).await.unwrap();
            registry.register(k, m);
        }

        let report = release_all(&leases, &mut registry).await;
        assert_eq!(report.released, 2);
        assert_eq!(report.unlock_failures, vec![broken.clone()]);
        assert_eq!(report.attempted(), 3);
        assert_eq!(leases.inner.held_keys(), vec![broken]);
    }

    #[tokio::test]
    async fn teardown_runs_before_release_and_its_failure_does_not_block_it() {
        let leases = Arc::new(InMemoryLeaseService::new());
        let executor = FailingTeardown {
            leases: leases.clone(),
            held_at_teardown: Mutex::new(None),
        };
        let request = MergeRequest::new("loc", "T", ["A", "B"]);
        let job = MergeJob::from_request(&request, UserId::new("alice"), &MergeConfig::default()).unwrap();

        let mut registry = LockRegistry::new();
        let mut expected = Vec::new();
        for name in ["T", "A", "B"] {
            let (k, m) = key(name);
            leases.lock(&k, Duration::from_secs(60)).await.unwrap();
            registry.register(k.clone(), m);
            expected.push(k);
        }
        expected.sort();

        let report = cleanup(leases.as_ref(), &executor, &job, &mut registry).await;

        let seen = executor.held_at_teardown.lock().unwrap().clone();
        assert_eq!(seen, Some(expected));
        assert_eq!(report.released, 3);
        assert!(report.unlock_failures.is_empty());
        assert_eq!(report.teardown_error.as_deref(), Some("scratch directory vanished"));
        assert!(registry.is_empty());
        assert!(leases.held_keys().is_empty());
    }

    #[tokio::test]
    async fn empty_registry_is_noop() {
        let leases = InMemoryLeaseService::new();
        let mut registry = LockRegistry::new();
        let report = release_all(&leases, &mut registry).await;
        assert_eq!(report, CleanupReport::default());
    }
}
