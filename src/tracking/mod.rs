//! Job tracking
//!
//! Persistent per-job metadata and its completion marker.

mod metadata;

pub use metadata::{completion_stamp, JobMetadata, COMPLETION_KEY, DATE_FORMAT};
