use mapset_lease::LeaseService;
use mapset_types::{LeaseKey, MapsetName};
use tracing::{debug, info, warn};

use crate::error::{LeaseFailure, MergeError, MergeResult};
use crate::job::MergeJob;
use crate::registry::LockRegistry;
use crate::traits::MapsetCatalog;

/// Checks that mapsets exist and takes their leases for one job.
///
/// Acquired leases go into the caller's [`LockRegistry`] and stay there on
/// failure; releasing them is left to job cleanup.
pub struct LeaseGuard<'a> {
    leases: &'a dyn LeaseService,
    catalog: &'a dyn MapsetCatalog,
    job: &'a MergeJob,
}

impl<'a> LeaseGuard<'a> {
    pub fn new(
        leases: &'a dyn LeaseService,
        catalog: &'a dyn MapsetCatalog,
        job: &'a MergeJob,
    ) -> Self {
        Self {
            leases,
            catalog,
            job,
        }
    }

    /// Lock one mapset for the job's full lease TTL.
    ///
    /// A key this job already owns is returned as is without asking the
    /// lease service again; that covers a target listed among the sources.
    pub async fn acquire(
        &self,
        registry: &mut LockRegistry,
        mapset: &MapsetName,
    ) -> MergeResult<LeaseKey> {
        let key = self.job.key_for(mapset);
        if registry.contains(&key) {
            debug!(job = %self.job.job_id, mapset = %mapset, key = %key, "mapset already locked by this job");
            return Ok(key);
        }

        let exists = self
            .catalog
            .exists(&self.job.location, mapset)
            .await
            .map_err(|e| MergeError::Catalog {
                mapset: mapset.clone(),
                reason: e.to_string(),
            })?;
        if !exists {
            return Err(MergeError::ResourceNotFound {
                mapset: mapset.clone(),
            });
        }

        let cause = match self.leases.lock(&key, self.job.lease_ttl).await {
            Ok(true) => None,
            Ok(false) => Some(LeaseFailure::Refused),
            Err(e) => Some(e.into()),
        };
        if let Some(cause) = cause {
            warn!(job = %self.job.job_id, mapset = %mapset, key = %key, %cause, "unable to lock mapset");
            return Err(MergeError::LockConflict {
                mapset: mapset.clone(),
                key,
                cause,
            });
        }

        info!(
            job = %self.job.job_id,
            mapset = %mapset,
            key = %key,
            ttl_secs = self.job.lease_ttl.as_secs(),
            "mapset locked"
        );
        registry.register(key.clone(), mapset.clone());
        Ok(key)
    }

    /// Lock every source mapset in order, stopping at the first failure.
    pub async fn acquire_all(
        &self,
        registry: &mut LockRegistry,
        sources: &[MapsetName],
    ) -> MergeResult<()> {
        if sources.is_empty() {
            return Err(MergeError::InvalidRequest("empty source mapset list".into()));
        }
        for mapset in sources {
            self.acquire(registry, mapset).await?;
        }
        Ok(())
    }
}
