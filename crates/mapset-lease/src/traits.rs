use std::time::Duration;

use async_trait::async_trait;
use mapset_types::LeaseKey;

use crate::error::LeaseResult;

/// Time-aware lease store shared by every job that may touch a mapset.
///
/// Implementations must satisfy these invariants:
/// - At most one live lease exists per key.
/// - A lease whose TTL has elapsed is free: `lock` may grant it again and
///   `extend` must refuse it.
/// - `extend` resets the remaining TTL to `ttl` from now; it never creates a lease.
/// - `unlock` of a key that is not held is a no-op.
#[async_trait]
pub trait LeaseService: Send + Sync {
    /// Try to take the lease on `key` for `ttl`.
    ///
    /// Returns `Ok(false)` if a live lease already exists.
    async fn lock(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool>;

    /// Renew a live lease so that it expires `ttl` from now.
    ///
    /// Returns `Ok(false)` if the lease is not held (expired or never taken).
    async fn extend(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool>;

    /// Release the lease on `key`.
    async fn unlock(&self, key: &LeaseKey) -> LeaseResult<()>;
}
