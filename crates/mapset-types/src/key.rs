use std::fmt;

use serde::{Deserialize, Serialize};

use crate::names::{LocationName, MapsetName, UserGroup};

/// Identifier a lease is taken on: `group/location/mapset`.
///
/// Derived deterministically, so two jobs naming the same mapset in the same
/// location of the same group always contend for the same key. None of the
/// components can contain `/`, which keeps the encoding unambiguous.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseKey(String);

impl LeaseKey {
    /// Derive the key for a mapset.
    pub fn derive(group: &UserGroup, location: &LocationName, mapset: &MapsetName) -> Self {
        Self(format!("{group}/{location}/{mapset}"))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the key back into its `(group, location, mapset)` components.
    pub fn components(&self) -> (&str, &str, &str) {
        let mut parts = self.0.splitn(3, '/');
        let group = parts.next().unwrap_or_default();
        let location = parts.next().unwrap_or_default();
        let mapset = parts.next().unwrap_or_default();
        (group, location, mapset)
    }
}

impl fmt::Debug for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LeaseKey({})", self.0)
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
