//! Bulk upload job snapshots as reported by the status endpoint.

use serde::{Deserialize, Serialize};

/// Server-side state of a bulk upload job.
///
/// Statuses the client does not recognize are kept verbatim in
/// [`JobStatus::Unknown`] and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    /// Accepted, processing not started.
    Pending,
    /// Rows are being processed.
    InProgress,
    /// Every row was attempted; see counts and errors.
    Completed,
    /// The file could not be processed at all.
    Failed,
    Unknown(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown(raw) => raw,
        }
    }

    /// Returns true if the job cannot transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "PENDING" => JobStatus::Pending,
            "IN_PROGRESS" => JobStatus::InProgress,
            "COMPLETED" => JobStatus::Completed,
            "FAILED" => JobStatus::Failed,
            _ => JobStatus::Unknown(raw),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One reading of a job's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Rows that created a new flight.
    #[serde(default)]
    pub created: u64,
    /// Rows that updated an existing flight.
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub failed: u64,
    /// Per-row error messages, in file order.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl JobSnapshot {
    /// Rows the server has attempted so far.
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.failed
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Response to a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAccepted {
    pub job_id: String,
    #[serde(default = "pending")]
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
}

fn pending() -> JobStatus {
    JobStatus::Pending
}
