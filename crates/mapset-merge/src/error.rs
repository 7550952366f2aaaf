use std::fmt;

use mapset_types::{LeaseKey, MapsetName, TypeError};
use thiserror::Error;

/// Why the lease service did not grant a lock or an extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaseFailure {
    /// The service answered, and the answer was no.
    Refused,
    /// The service could not answer.
    Backend(String),
}

impl fmt::Display for LeaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refused => f.write_str("refused by lease service"),
            Self::Backend(reason) => write!(f, "lease service unavailable: {reason}"),
        }
    }
}

impl From<mapset_lease::LeaseError> for LeaseFailure {
    fn from(e: mapset_lease::LeaseError) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Fatal conditions of a merge job. The first one raised becomes the job's
/// terminal status.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MergeError {
    /// Empty source list or malformed names. Raised before any lock is taken.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("mapset <{mapset}> does not exist and can not be locked")]
    ResourceNotFound { mapset: MapsetName },

    #[error("unable to lock mapset <{mapset}> ({key}): {cause}")]
    LockConflict {
        mapset: MapsetName,
        key: LeaseKey,
        cause: LeaseFailure,
    },

    /// An extension failed; `mapset` is the one being processed at that step,
    /// `key` the lease that could not be renewed.
    #[error("unable to extend lock for mapset <{mapset}>: lease {key} {cause}")]
    LeaseLost {
        mapset: MapsetName,
        key: LeaseKey,
        cause: LeaseFailure,
    },

    #[error("mapset merging was terminated by user request at step {step} of {total_steps}")]
    JobTerminated { step: usize, total_steps: usize },

    #[error("merging mapset <{source_mapset}> into <{target_mapset}> failed: {reason}")]
    MergeExecutionFailed {
        source_mapset: MapsetName,
        target_mapset: MapsetName,
        reason: String,
    },

    /// The existence oracle itself failed.
    #[error("existence check for mapset <{mapset}> failed: {reason}")]
    Catalog { mapset: MapsetName, reason: String },
}

impl MergeError {
    /// Stable machine-readable name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::LockConflict { .. } => "lock_conflict",
            Self::LeaseLost { .. } => "lease_lost",
            Self::JobTerminated { .. } => "job_terminated",
            Self::MergeExecutionFailed { .. } => "merge_execution_failed",
            Self::Catalog { .. } => "catalog",
        }
    }
}

impl From<TypeError> for MergeError {
    fn from(e: TypeError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;

/// Failure reported by an external collaborator (existence oracle, executor).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors loading or validating a [`MergeConfig`](crate::MergeConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("configuration encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
