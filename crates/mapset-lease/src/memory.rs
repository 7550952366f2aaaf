use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use mapset_types::LeaseKey;
use tokio::time::Instant;

use crate::error::LeaseResult;
use crate::traits::LeaseService;

/// In-memory, HashMap-based lease store.
///
/// Intended for tests and for running several jobs inside one process. Each
/// entry maps a key to its expiry instant; expired entries are treated as
/// free and are pruned lazily. Expiry uses `tokio::time::Instant`, so tests
/// can drive it with a paused clock.
pub struct InMemoryLeaseService {
    leases: RwLock<HashMap<LeaseKey, Instant>>,
}

impl InMemoryLeaseService {
    /// Create a new empty lease store.
    pub fn new() -> Self {
        Self {
            leases: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` if `key` has a live lease.
    pub fn is_held(&self, key: &LeaseKey) -> bool {
        self.remaining(key).is_some()
    }

    /// Remaining TTL of a live lease.
    pub fn remaining(&self, key: &LeaseKey) -> Option<Duration> {
        let now = Instant::now();
        let map = self.leases.read().expect("lock poisoned");
        map.get(key)
            .filter(|expires| **expires > now)
            .map(|expires| *expires - now)
    }

    /// Sorted list of all keys with a live lease.
    pub fn held_keys(&self) -> Vec<LeaseKey> {
        let now = Instant::now();
        let map = self.leases.read().expect("lock poisoned");
        let mut keys: Vec<LeaseKey> = map
            .iter()
            .filter(|(_, expires)| **expires > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for InMemoryLeaseService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaseService for InMemoryLeaseService {
    async fn lock(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        let now = Instant::now();
        let mut map = self.leases.write().expect("lock poisoned");
        if let Some(expires) = map.get(key) {
            if *expires > now {
                return Ok(false);
            }
        }
        map.insert(key.clone(), now + ttl);
        Ok(true)
    }

    async fn extend(&self, key: &LeaseKey, ttl: Duration) -> LeaseResult<bool> {
        let now = Instant::now();
        let mut map = self.leases.write().expect("lock poisoned");
        if map.get(key).is_some_and(|expires| *expires > now) {
            map.insert(key.clone(), now + ttl);
            Ok(true)
        } else {
            // Expired entries are dropped so the key reads as free.
            map.remove(key);
            Ok(false)
        }
    }

    async fn unlock(&self, key: &LeaseKey) -> LeaseResult<()> {
        self.leases.write().expect("lock poisoned").remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryLeaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLeaseService")
            .field("live_leases", &self.held_keys().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapset_types::{LocationName, MapsetName, UserGroup};

    fn key(mapset: &str) -> LeaseKey {
        LeaseKey::derive(
            &UserGroup::new("group").unwrap(),
            &LocationName::new("loc").unwrap(),
            &MapsetName::new(mapset).unwrap(),
        )
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn lock_then_conflict() {
        let leases = InMemoryLeaseService::new();
        assert!(leases.lock(&key("a"), TTL).await.unwrap());
        assert!(!leases.lock(&key("a"), TTL).await.unwrap());
        assert!(leases.lock(&key("b"), TTL).await.unwrap());
        assert_eq!(leases.held_keys(), vec![key("a"), key("b")]);
    }

    #[tokio::test]
    async fn unlock_frees_key() {
        let leases = InMemoryLeaseService::new();
        leases.lock(&key("a"), TTL).await.unwrap();
        leases.unlock(&key("a")).await.unwrap();
        assert!(!leases.is_held(&key("a")));
        assert!(leases.lock(&key("a"), TTL).await.unwrap());
    }

    #[tokio::test]
    async fn unlock_unknown_key_is_noop() {
        let leases = InMemoryLeaseService::new();
        leases.unlock(&key("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn extend_requires_live_lease() {
        let leases = InMemoryLeaseService::new();
        assert!(!leases.extend(&key("a"), TTL).await.unwrap());
        leases.lock(&key("a"), TTL).await.unwrap();
        assert!(leases.extend(&key("a"), TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn lease_expires_after_ttl() {
        let leases = InMemoryLeaseService::new();
        leases.lock(&key("a"), TTL).await.unwrap();
        tokio::time::advance(TTL + Duration::from_secs(1)).await;

        assert!(!leases.is_held(&key("a")));
        assert!(!leases.extend(&key("a"), TTL).await.unwrap());
        assert!(leases.lock(&key("a"), TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn extend_resets_ttl_from_now() {
        let leases = InMemoryLeaseService::new();
        leases.lock(&key("a"), Duration::from_secs(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert!(leases.extend(&key("a"), Duration::from_secs(30)).await.unwrap());
        assert_eq!(leases.remaining(&key("a")), Some(Duration::from_secs(30)));

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(leases.is_held(&key("a")));
    }
}
