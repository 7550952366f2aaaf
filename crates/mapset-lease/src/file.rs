//! File-backed lease store shared between processes.
//!
//! Each lease lives in its own JSON file at
//! `<root>/<group>/<location>/<mapset>.lease`. Records are written to a
//! temporary file and renamed into place, so a reader never sees a
//! half-written record.
//!
//! Every read-check-write on a key runs under an exclusive advisory lock on
//! the sibling `<mapset>.lease.lock` file. Reclaiming an expired lease,
//! renewing and releasing are therefore atomic with respect to every other
//! [`FileLeaseService`] on the same directory, in this process or another.
//! The lock file is never removed.
//!
//! Every [`FileLeaseService`] instance has its own holder id. Only the holder
//! that took a lease may extend or release it.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::fs_std::FileExt;
use mapset_types::LeaseKey;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{LeaseError, LeaseResult};
use crate::traits::LeaseService;

const LEASE_EXTENSION: &str = "lease";
const LOCK_SUFFIX: &str = "lock";

/// The on-disk content of a lease file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub key: LeaseKey,
    pub holder: Uuid,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    /// Returns `true` once the lease has run out at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Lease store backed by a directory of lease files.
///
/// Cloning is cheap and keeps the holder id: a clone is the same holder.
#[derive(Clone, Debug)]
pub struct FileLeaseService {
    root: PathBuf,
    holder: Uuid,
}

impl FileLeaseService {
    /// Open (and create if needed) a lease directory with a fresh holder id.
    pub fn open(root: impl Into<PathBuf>) -> LeaseResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            holder: Uuid::now_v7(),
        })
    }

    /// The holder id this instance writes into lease records.
    pub fn holder(&self) -> Uuid {
        self.holder
    }

    /// The lease directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read the live lease record for `key`, if any.
    pub fn read(&self, key: &LeaseKey) -> LeaseResult<Option<LeaseRecord>> {
        let record = read_record(&self.path_for(key))?;
        Ok(record.filter(|r| !r.is_expired(Utc::now())))
    }

    /// All live leases under the lease directory, sorted by key.
    ///
    /// Unreadable or corrupt files are skipped with a warning.
    pub fn list(&self) -> LeaseResult<Vec<LeaseRecord>> {
        let now = Utc::now();
        let mut records = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(3).max_depth(3) {
            let entry = entry.map_err(|e| LeaseError::Backend(e.to_string()))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(LEASE_EXTENSION)
            {
                continue;
            }
            match read_record(path) {
                Ok(Some(record)) if !record.is_expired(now) => records.push(record),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable lease file"),
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    fn path_for(&self, key: &LeaseKey) -> PathBuf {
        let (group, location, mapset) = key.components();
        self.root
            .join(group)
            .join(location)
            .join(format!("{mapset}.{LEASE_EXTENSION}"))
    }

    /// Take the per-key advisory lock. Released when the returned file is
    /// dropped.
    fn key_lock(&self, path: &Path) -> LeaseResult<File> {
        let dir = path.parent().ok_or_else(|| {
            LeaseError::Backend(format!("lease path has no parent: {}", path.display()))
        })?;
        fs::create_dir_all(dir)?;
        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".");
        lock_path.push(LOCK_SUFFIX);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_path))?;
        file.lock_exclusive()?;
        Ok(file)
    }

    fn record(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<LeaseRecord> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| LeaseError::InvalidTtl(ttl))?;
        let now = Utc::now();
        Ok(LeaseRecord {
            key: key.clone(),
            holder: self.holder,
            acquired_at: now,
            expires_at: now + ttl,
        })
    }

    fn lock_sync(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        let path = self.path_for(key);
        let _guard = self.key_lock(&path)?;
        if let Some(existing) = read_record(&path)? {
            if !existing.is_expired(Utc::now()) {
                return Ok(false);
            }
            debug!(key = %key, holder = %existing.holder, "reclaiming expired lease");
        }

        let record = self.record(key, ttl)?;
        let staged = stage_record(&path, &record)?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(true)
    }

    fn extend_sync(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        let path = self.path_for(key);
        let _guard = self.key_lock(&path)?;
        let Some(existing) = read_record(&path)? else {
            return Ok(false);
        };
        if existing.holder != self.holder || existing.is_expired(Utc::now()) {
            return Ok(false);
        }

        let mut record = self.record(key, ttl)?;
        record.acquired_at = existing.acquired_at;
        let staged = stage_record(&path, &record)?;
        staged.persist(&path).map_err(|e| e.error)?;
        Ok(true)
    }

    fn unlock_sync(&self, key: &LeaseKey) -> LeaseResult<()> {
        let path = self.path_for(key);
        let _guard = self.key_lock(&path)?;
        match read_record(&path)? {
            Some(existing) if existing.holder != self.holder => {
                warn!(key = %key, holder = %existing.holder, "not releasing lease held by another holder");
                Ok(())
            }
            Some(_) => remove_if_present(&path),
            None => Ok(()),
        }
    }
}

/// Run a lease-file operation on the blocking pool.
async fn blocking<T, F>(service: &FileLeaseService, key: &LeaseKey, op: F) -> LeaseResult<T>
where
    T: Send + 'static,
    F: FnOnce(&FileLeaseService, &LeaseKey) -> LeaseResult<T> + Send + 'static,
{
    let service = service.clone();
    let key = key.clone();
    tokio::task::spawn_blocking(move || op(&service, &key))
        .await
        .map_err(|e| LeaseError::Backend(format!("lease task failed: {e}")))?
}

#[async_trait]
impl LeaseService for FileLeaseService {
    async fn lock(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        blocking(self, key, move |s, k| s.lock_sync(k, ttl)).await
    }

    async fn extend(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        blocking(self, key, move |s, k| s.extend_sync(k, ttl)).await
    }

    async fn unlock(&self, key: &LeaseKey) -> LeaseResult<()> {
        blocking(self, key, |s, k| s.unlock_sync(k)).await
    }
}

fn read_record(path: &Path) -> LeaseResult<Option<LeaseRecord>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_present(path: &Path) -> LeaseResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Write `record` to a temporary file next to `path`, ready to be persisted.
fn stage_record(path: &Path, record: &LeaseRecord) -> LeaseResult<NamedTempFile> {
    let dir = path
        .parent()
        .ok_or_else(|| LeaseError::Backend(format!("lease path has no parent: {}", path.display())))?;
    fs::create_dir_all(dir)?;
    let mut staged = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut staged, record)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    Ok(staged)
}
