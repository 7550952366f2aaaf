//! Lease lock service for mapset merging.
//!
//! A lease is a time-bounded exclusive claim on a [`LeaseKey`]. Jobs running
//! in different tasks or processes exclude each other only through the lease
//! store; there is no in-process locking between jobs.
//!
//! # Backends
//!
//! All backends implement the [`LeaseService`] trait:
//!
//! - [`InMemoryLeaseService`]: `HashMap`-based store for tests and single-process use
//! - [`FileLeaseService`]: one lease file per key, shared between processes
//!
//! # Return Conventions
//!
//! `Ok(false)` from [`LeaseService::lock`] or [`LeaseService::extend`] means
//! the lease was refused: held by someone else, expired, or never taken.
//! `Err` means the store itself failed. Callers must treat both as fatal but
//! report them differently.
//!
//! [`LeaseKey`]: mapset_types::LeaseKey

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{LeaseError, LeaseResult};
pub use file::{FileLeaseService, LeaseRecord};
pub use memory::InMemoryLeaseService;
pub use traits::LeaseService;
