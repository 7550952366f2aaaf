//! Lease-locked merging of mapsets into a target mapset.
//!
//! A job locks its target, then each source, merges the sources into the
//! target one at a time and finally releases every lease it took, whatever
//! happened in between. Exclusivity across jobs and processes comes only
//! from the lease service.
//!
//! # Job Lifecycle
//!
//! 1. [`LeaseGuard::acquire`]: check the target exists, lease it for
//!    `process_time_limit * process_num_limit`
//! 2. [`LeaseGuard::acquire_all`]: same for every source, fail fast
//! 3. [`MergeSequencer::run`]: each step polls termination, renews every
//!    lease to `2 * process_time_limit`, reports progress and merges
//! 4. [`cleanup`]: executor teardown, then release every held lease
//!
//! [`MergeOrchestrator::execute`] runs all four and returns a [`JobReport`].
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use mapset_lease::InMemoryLeaseService;
//! use mapset_merge::{
//!     InMemoryCatalog, InMemoryExecutor, MergeConfig, MergeJob, MergeOrchestrator,
//! };
//! use mapset_types::{MergeRequest, UserId};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let catalog = Arc::new(InMemoryCatalog::with_mapsets("loc", ["A", "B", "C"]));
//! let executor = Arc::new(InMemoryExecutor::new());
//! let orchestrator = MergeOrchestrator::new(
//!     Arc::new(InMemoryLeaseService::new()),
//!     catalog,
//!     executor.clone(),
//! );
//!
//! let request = MergeRequest::new("loc", "A", ["A", "B", "C"]);
//! let job = MergeJob::from_request(&request, UserId::new("alice"), &MergeConfig::default()).unwrap();
//! let report = orchestrator.execute(&job).await;
//!
//! assert!(report.outcome.is_finished());
//! assert_eq!(executor.merges().len(), 2);
//! assert_eq!(report.cleanup.released, 3);
//! # });
//! ```

pub mod cleanup;
pub mod config;
pub mod error;
pub mod guard;
pub mod job;
pub mod memory;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod sequencer;
pub mod traits;

pub use cleanup::{cleanup, release_all};
pub use config::MergeConfig;
pub use error::{BackendError, ConfigError, LeaseFailure, MergeError, MergeResult};
pub use guard::LeaseGuard;
pub use job::MergeJob;
pub use memory::{InMemoryCatalog, InMemoryExecutor, InMemoryStatusLog, InMemoryTermination};
pub use orchestrator::MergeOrchestrator;
pub use registry::{HeldLease, LockRegistry};
pub use report::{CleanupReport, JobOutcome, JobReport, ProgressUpdate};
pub use sequencer::{extend_all, ExtensionFailure, MergeSequencer, StepCounter};
pub use traits::{
    MapsetCatalog, MergeExecutor, NeverTerminate, NullReporter, StatusReporter, TerminationSignal,
};
