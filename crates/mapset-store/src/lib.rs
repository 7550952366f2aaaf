//! Filesystem-backed mapsets.
//!
//! A location is a directory of mapset directories:
//!
//! ```text
//! <root>/<location>/<mapset>/...
//! ```
//!
//! [`FsLocation`] answers existence checks and performs merges by copying
//! the source mapset's tree into the target mapset. It implements both
//! [`MapsetCatalog`](mapset_merge::MapsetCatalog) and
//! [`MergeExecutor`](mapset_merge::MergeExecutor).

pub mod copy;
pub mod error;
pub mod location;

pub use copy::{copy_tree, CopyStats, MAPSET_PRIVATE_ENTRIES};
pub use error::{StoreError, StoreResult};
pub use location::FsLocation;
