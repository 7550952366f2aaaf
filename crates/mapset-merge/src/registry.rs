use mapset_types::{LeaseKey, MapsetName};

/// A lease this job currently owns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeldLease {
    pub key: LeaseKey,
    pub mapset: MapsetName,
}

/// The set of leases owned by one running job, in acquisition order.
///
/// Filled as locks succeed and drained exactly once by cleanup, so releasing
/// is a function of what is owned rather than a replay of what was attempted.
/// Each key appears at most once.
#[derive(Debug, Default)]
pub struct LockRegistry {
    held: Vec<HeldLease>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &LeaseKey) -> bool {
        self.held.iter().any(|lease| &lease.key == key)
    }

    /// Record a lease that was just granted.
    ///
    /// Registering a key twice is a bug in the caller; the guard checks
    /// [`Self::contains`] before it asks the lease service.
    pub fn register(&mut self, key: LeaseKey, mapset: MapsetName) {
        debug_assert!(!self.contains(&key), "lease {key} registered twice");
        if !self.contains(&key) {
            self.held.push(HeldLease { key, mapset });
        }
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeldLease> {
        self.held.iter()
    }

    /// Owned mapsets in acquisition order.
    pub fn mapsets(&self) -> Vec<MapsetName> {
        self.held.iter().map(|lease| lease.mapset.clone()).collect()
    }

    /// Take every held lease out of the registry, leaving it empty.
    pub fn drain(&mut self) -> Vec<HeldLease> {
        std::mem::take(&mut self.held)
    }
}
