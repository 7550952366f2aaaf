use std::path::Path;
use std::time::Duration;

use mapset_types::{TypeResult, UserGroup};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Limits and identity that shape every merge job.
///
/// A job may run at most `process_num_limit` processes of at most
/// `process_time_limit` seconds each, so leases are first taken for the
/// product of the two and renewed to twice the single-process limit at every
/// step boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Group whose database holds the locations. First lease key component.
    pub user_group: String,
    /// Maximum wall-clock seconds a single process may take.
    pub process_time_limit: u64,
    /// Maximum number of processes a job may run.
    pub process_num_limit: u32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            user_group: "default".into(),
            process_time_limit: 630,
            process_num_limit: 1000,
        }
    }
}

impl MergeConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.process_time_limit == 0 {
            return Err(ConfigError::Invalid("process_time_limit must be positive".into()));
        }
        if self.process_num_limit == 0 {
            return Err(ConfigError::Invalid("process_num_limit must be positive".into()));
        }
        self.group()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    /// The validated user group.
    pub fn group(&self) -> TypeResult<UserGroup> {
        UserGroup::new(self.user_group.as_str())
    }

    /// The single-process time limit.
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.process_time_limit)
    }

    /// TTL of a freshly acquired lease: the longest a job could legitimately run.
    pub fn acquire_ttl(&self) -> Duration {
        self.time_limit()
            .saturating_mul(self.process_num_limit)
    }

    /// TTL every held lease is renewed to at each step boundary.
    pub fn extension_ttl(&self) -> Duration {
        self.time_limit().saturating_mul(2)
    }
}
