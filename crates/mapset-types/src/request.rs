use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::names::{LocationName, MapsetName};

/// An inbound merge request, exactly as the caller sent it.
///
/// Nothing is trusted until [`MergeRequest::validate`] succeeds; only a
/// [`ValidatedRequest`] can become a job.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub target_location: String,
    pub target_mapset: String,
    /// Mapsets to merge into the target, in merge order.
    pub source_mapsets: Vec<String>,
}

impl MergeRequest {
    pub fn new(
        target_location: impl Into<String>,
        target_mapset: impl Into<String>,
        source_mapsets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            target_location: target_location.into(),
            target_mapset: target_mapset.into(),
            source_mapsets: source_mapsets.into_iter().map(Into::into).collect(),
        }
    }

    /// Check every name and the source list.
    ///
    /// Fails on an empty source list before any name is examined.
    pub fn validate(&self) -> TypeResult<ValidatedRequest> {
        if self.source_mapsets.is_empty() {
            return Err(TypeError::EmptySourceList);
        }
        let location = LocationName::new(self.target_location.as_str())?;
        let target = MapsetName::new(self.target_mapset.as_str())?;
        let sources = self
            .source_mapsets
            .iter()
            .map(|name| MapsetName::new(name.as_str()))
            .collect::<TypeResult<Vec<_>>>()?;
        Ok(ValidatedRequest {
            location,
            target,
            sources,
        })
    }
}

/// A merge request whose names have all been validated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRequest {
    pub location: LocationName,
    pub target: MapsetName,
    pub sources: Vec<MapsetName>,
}
