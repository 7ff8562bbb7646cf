//! Job orchestration
//!
//! Wraps the sweep loop in an asynchronous job:
//! - Pending, Running, then Succeeded, Failed or Cancelled
//! - Progress after each configuration, through non-blocking observers
//! - Duplicate delivery of a completed job is a no-op
//! - Cooperative cancellation checked between candidates

mod manager;
mod progress;
mod runner;
mod state;

pub use manager::{JobManager, JobSubmission};
pub use progress::{
    CancellationToken, ChannelObserver, NoopObserver, Observers, ProgressEvent, ProgressObserver,
    StatusObserver,
};
pub use runner::{run_job, JobOutcome, JobRequest, METADATA_FILE, REPORT_FILE};
pub use state::{StatusStore, TaskState, TaskStatus};
