//! Foundation types for lease-locked mapset merging.
//!
//! Every other crate in the workspace depends on `mapset-types`. The types
//! here carry no behaviour beyond validation and deterministic derivation.
//!
//! # Key Types
//!
//! - [`MapsetName`], [`LocationName`], [`UserGroup`]: validated name tokens
//! - [`LeaseKey`]: `group/location/mapset`, the identifier leases are taken on
//! - [`JobId`]: UUID v7 identifier for one merge job
//! - [`UserId`]: the user a job runs on behalf of
//! - [`MergeRequest`]: the inbound request, validated into a [`ValidatedRequest`]

pub mod error;
pub mod job;
pub mod key;
pub mod names;
pub mod request;

pub use error::{TypeError, TypeResult};
pub use job::{JobId, UserId};
pub use key::LeaseKey;
pub use names::{validate_name, LocationName, MapsetName, NameKind, UserGroup};
pub use request::{MergeRequest, ValidatedRequest};
