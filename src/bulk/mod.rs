//! Bulk flight upload: submit a CSV, then poll the resulting job.

pub mod job;
pub mod poller;
pub mod upload;

pub use job::{JobSnapshot, JobStatus, UploadAccepted};
pub use poller::{FirstFetch, JobPoller, JobStatusSource, PollHandle, PollOutcome};
