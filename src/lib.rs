//! Submits audio to a remote mastering service and tracks each mastering job
//! until it settles.
//!
//! The pieces, leaves first:
//! - [`api::MasteringClient`]: authenticated HTTP transport.
//! - [`repository::JobRepository`]: the interface everything else depends on.
//! - [`usecases`]: validation gates in front of the repository.
//! - [`tracker::JobTracker`]: per-job polling and event fan-out.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod repository;
pub mod state_machine;
pub mod tracker;
pub mod ui;
pub mod usecases;

pub use error::{MasteringError, Result};
pub use state_machine::{Audio, JobStatus, MasteringJob};
pub use tracker::{JobEvent, JobTracker, Subscription, TrackerConfig};
