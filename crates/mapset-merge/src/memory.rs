//! In-memory collaborators for tests and embedding.
//!
//! Each type implements one of the orchestrator's ports and keeps everything
//! in a `RwLock`-protected collection so the calls can be inspected afterwards.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use mapset_types::{JobId, LocationName, MapsetName, UserId};

use crate::error::BackendError;
use crate::job::MergeJob;
use crate::report::{JobReport, ProgressUpdate};
use crate::traits::{MapsetCatalog, MergeExecutor, StatusReporter, TerminationSignal};

/// Existence oracle over a fixed set of `(location, mapset)` pairs.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    mapsets: RwLock<HashSet<(String, String)>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog holding `names` in `location`.
    pub fn with_mapsets<'a>(location: &str, names: impl IntoIterator<Item = &'a str>) -> Self {
        let catalog = Self::new();
        for name in names {
            catalog.insert(location, name);
        }
        catalog
    }

    pub fn insert(&self, location: &str, mapset: &str) {
        self.mapsets
            .write()
            .expect("lock poisoned")
            .insert((location.to_string(), mapset.to_string()));
    }

    pub fn remove(&self, location: &str, mapset: &str) -> bool {
        self.mapsets
            .write()
            .expect("lock poisoned")
            .remove(&(location.to_string(), mapset.to_string()))
    }
}

#[async_trait]
impl MapsetCatalog for InMemoryCatalog {
    async fn exists(&self, location: &LocationName, mapset: &MapsetName) -> Result<bool, BackendError> {
        let key = (location.to_string(), mapset.to_string());
        Ok(self.mapsets.read().expect("lock poisoned").contains(&key))
    }
}

/// Executor that records merges instead of copying anything.
#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    merges: RwLock<Vec<(MapsetName, MapsetName)>>,
    failing: RwLock<HashSet<MapsetName>>,
    teardowns: RwLock<usize>,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every merge from `source` fail.
    pub fn fail_on(&self, source: MapsetName) {
        self.failing.write().expect("lock poisoned").insert(source);
    }

    /// Successful merges as `(source, target)`, in call order.
    pub fn merges(&self) -> Vec<(MapsetName, MapsetName)> {
        self.merges.read().expect("lock poisoned").clone()
    }

    pub fn teardowns(&self) -> usize {
        *self.teardowns.read().expect("lock poisoned")
    }
}

#[async_trait]
impl MergeExecutor for InMemoryExecutor {
    async fn merge_into(
        &self,
        _location: &LocationName,
        source: &MapsetName,
        target: &MapsetName,
    ) -> Result<(), BackendError> {
        if self.failing.read().expect("lock poisoned").contains(source) {
            return Err(BackendError::other(format!("copy of <{source}> failed")));
        }
        self.merges
            .write()
            .expect("lock poisoned")
            .push((source.clone(), target.clone()));
        Ok(())
    }

    async fn teardown(&self, _job: &MergeJob) -> Result<(), BackendError> {
        *self.teardowns.write().expect("lock poisoned") += 1;
        Ok(())
    }
}

/// Termination flags set by hand.
#[derive(Debug, Default)]
pub struct InMemoryTermination {
    requested: RwLock<HashSet<(UserId, JobId)>>,
}

impl InMemoryTermination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, user_id: &UserId, job_id: &JobId) {
        self.requested
            .write()
            .expect("lock poisoned")
            .insert((user_id.clone(), *job_id));
    }
}

#[async_trait]
impl TerminationSignal for InMemoryTermination {
    async fn is_termination_requested(&self, user_id: &UserId, job_id: &JobId) -> bool {
        self.requested
            .read()
            .expect("lock poisoned")
            .contains(&(user_id.clone(), *job_id))
    }
}

/// Status reporter that keeps every update and report.
#[derive(Debug, Default)]
pub struct InMemoryStatusLog {
    updates: RwLock<Vec<ProgressUpdate>>,
    reports: RwLock<Vec<JobReport>>,
}

impl InMemoryStatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.read().expect("lock poisoned").clone()
    }

    pub fn reports(&self) -> Vec<JobReport> {
        self.reports.read().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl StatusReporter for InMemoryStatusLog {
    async fn progress(&self, update: &ProgressUpdate) {
        self.updates
            .write()
            .expect("lock poisoned")
            .push(update.clone());
    }

    async fn finish(&self, report: &JobReport) {
        self.reports
            .write()
            .expect("lock poisoned")
            .push(report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> LocationName {
        LocationName::new("loc").unwrap()
    }

    fn mapset(name: &str) -> MapsetName {
        MapsetName::new(name).unwrap()
    }

    #[tokio::test]
    async fn catalog_is_location_scoped() {
        let catalog = InMemoryCatalog::with_mapsets("loc", ["A"]);
        assert!(catalog.exists(&loc(), &mapset("A")).await.unwrap());
        assert!(!catalog.exists(&LocationName::new("other").unwrap(), &mapset("A")).await.unwrap());
        assert!(catalog.remove("loc", "A"));
        assert!(!catalog.exists(&loc(), &mapset("A")).await.unwrap());
    }

    #[tokio::test]
    async fn executor_records_and_fails() {
        let executor = InMemoryExecutor::new();
        executor.merge_into(&loc(), &mapset("A"), &mapset("T")).await.unwrap();
        executor.fail_on(mapset("B"));
        assert!(executor.merge_into(&loc(), &mapset("B"), &mapset("T")).await.is_err());
        assert_eq!(executor.merges(), vec![(mapset("A"), mapset("T"))]);
    }

    #[tokio::test]
    async fn termination_is_per_user_and_job() {
        let termination = InMemoryTermination::new();
        let user = UserId::new("u");
        let job = JobId::new();
        termination.request(&user, &job);
        assert!(termination.is_termination_requested(&user, &job).await);
        assert!(!termination.is_termination_requested(&UserId::new("v"), &job).await);
        assert!(!termination.is_termination_requested(&user, &JobId::new()).await);
    }
}
