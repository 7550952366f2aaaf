use thiserror::Error;

/// Errors from the lease store itself (not lease refusals).
#[derive(Debug, Error)]
pub enum LeaseError {
    /// The backing store could not be reached or answered with an error.
    #[error("lease backend error: {0}")]
    Backend(String),

    /// A lease record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The requested TTL cannot be represented by the store.
    #[error("invalid lease ttl: {0:?}")]
    InvalidTtl(std::time::Duration),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;
