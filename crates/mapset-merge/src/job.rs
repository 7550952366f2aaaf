use std::time::Duration;

use mapset_types::{
    JobId, LeaseKey, LocationName, MapsetName, MergeRequest, UserGroup, UserId, ValidatedRequest,
};

use crate::config::MergeConfig;
use crate::error::{MergeError, MergeResult};

/// One accepted merge request, ready to run.
///
/// Immutable once execution starts; the lock registry lives outside the job
/// and is owned by the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeJob {
    pub job_id: JobId,
    pub user_id: UserId,
    pub group: UserGroup,
    pub location: LocationName,
    pub target: MapsetName,
    /// Merge order.
    pub sources: Vec<MapsetName>,
    /// TTL of a freshly acquired lease.
    pub lease_ttl: Duration,
    /// TTL every held lease is renewed to at each step boundary.
    pub lease_extension: Duration,
}

impl MergeJob {
    /// Build a job from an already validated request.
    pub fn new(
        user_id: UserId,
        group: UserGroup,
        request: ValidatedRequest,
        config: &MergeConfig,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            user_id,
            group,
            location: request.location,
            target: request.target,
            sources: request.sources,
            lease_ttl: config.acquire_ttl(),
            lease_extension: config.extension_ttl(),
        }
    }

    /// Validate a raw request and build a job for it.
    ///
    /// Every rejection is [`MergeError::InvalidRequest`]; nothing is locked.
    pub fn from_request(
        request: &MergeRequest,
        user_id: UserId,
        config: &MergeConfig,
    ) -> MergeResult<Self> {
        let validated = request.validate()?;
        let group = config.group()?;
        Ok(Self::new(user_id, group, validated, config))
    }

    /// Check the invariants a job must hold before any lease is requested.
    pub fn validate(&self) -> MergeResult<()> {
        if self.sources.is_empty() {
            return Err(MergeError::InvalidRequest("empty source mapset list".into()));
        }
        if self.lease_ttl.is_zero() || self.lease_extension.is_zero() {
            return Err(MergeError::InvalidRequest("lease durations must be positive".into()));
        }
        Ok(())
    }

    /// The lease key for a mapset of this job's location.
    pub fn key_for(&self, mapset: &MapsetName) -> LeaseKey {
        LeaseKey::derive(&self.group, &self.location, mapset)
    }

    /// Number of steps reported in progress messages.
    pub fn total_steps(&self) -> usize {
        self.sources.len()
    }
}
