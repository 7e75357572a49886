mod job;
mod state;

pub use job::{Audio, JobStatus, MasteringJob, clamp_progression};
pub use state::{IgnoreReason, ProgressPolicy, StateMachine, Transition};
