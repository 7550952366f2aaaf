use std::path::PathBuf;

use mapset_merge::BackendError;
use thiserror::Error;

/// Errors from filesystem mapset operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("mapset directory not found: {}", .0.display())]
    MapsetNotFound(PathBuf),

    #[error("mapset already exists: {}", .0.display())]
    MapsetExists(PathBuf),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("copy task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for BackendError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Io(io) => BackendError::Io(io),
            other => BackendError::Other(other.to_string()),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
