//! Bulk flight upload: submission and status lookup.
//!
//! # Security
//!
//! - File contents are never logged
//! - Only the file name, size, job id prefix and status codes are logged

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::api::client::{redact_id, ApiClient};
use crate::bulk::job::{JobSnapshot, UploadAccepted};
use crate::error::AppError;
use crate::validation;

/// Multipart field the server reads the file from.
const FILE_FIELD: &str = "file";

/// Content type the server requires for the uploaded part.
const CSV_MIME: &str = "text/csv";

impl ApiClient {
    /// Uploads a flight CSV for background processing (admin).
    ///
    /// `file` is `None` when nothing was selected; that is rejected before
    /// any request is made, as is a file that fails the CSV pre-flight check.
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` / `AppError::CsvInvalid` - no file, unreadable
    ///   file, or malformed CSV; nothing was sent
    /// - `AppError::UploadFailed` - the request failed for any other reason
    pub async fn submit_bulk_upload(&self, file: Option<&Path>) -> Result<UploadAccepted, AppError> {
        let path =
            file.ok_or_else(|| AppError::Validation("Please select a file to upload.".into()))?;

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        if !metadata.is_file() {
            return Err(AppError::Validation(format!(
                "{} is not a file",
                path.display()
            )));
        }

        let report = validation::validate(path).await?.into_result()?;
        let file_size = report.file_size_bytes;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("flights.csv")
            .to_string();
        for warning in &report.warnings {
            warn!("[BULK] {}: {}", file_name, warning.describe());
        }
        let handle = tokio::fs::File::open(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot open {}: {}", path.display(), e))
        })?;

        let body = reqwest::Body::wrap_stream(ReaderStream::new(handle));
        let part = Part::stream_with_length(body, file_size)
            .file_name(file_name.clone())
            .mime_str(CSV_MIME)
            .map_err(|e| AppError::Internal(format!("Invalid part content type: {}", e)))?;
        let form = Form::new().part(FILE_FIELD, part);

        info!(
            "[BULK] POST /admin/flights/bulk-upload ({}, {} bytes)",
            file_name, file_size
        );

        let prepared = self
            .request(Method::POST, "/admin/flights/bulk-upload")
            .await
            .map_err(|e| AppError::UploadFailed(e.to_string()))?
            .with(|b| b.multipart(form));

        match self.send_json::<UploadAccepted>(prepared).await {
            Ok(accepted) => {
                info!(
                    "[BULK] Upload accepted as job {} ({})",
                    redact_id(&accepted.job_id),
                    accepted.status
                );
                Ok(accepted)
            }
            Err(e) => {
                warn!("[BULK] Upload failed: {}", e);
                Err(AppError::UploadFailed(e.to_string()))
            }
        }
    }

    /// Fetches the current snapshot of a bulk upload job (admin).
    pub async fn bulk_upload_status(&self, job_id: &str) -> Result<JobSnapshot, AppError> {
        check_job_id(job_id)?;
        let prepared = self
            .request(
                Method::GET,
                &format!("/admin/flights/bulk-upload/status/{}", job_id),
            )
            .await?;

        let snapshot: JobSnapshot = self.send_json(prepared).await?;
        info!(
            "[BULK] Job {} is {} ({} processed)",
            redact_id(job_id),
            snapshot.status,
            snapshot.processed()
        );
        Ok(snapshot)
    }
}

/// Rejects ids that are empty or would escape their path segment.
pub(crate) fn check_job_id(job_id: &str) -> Result<(), AppError> {
    if job_id.trim().is_empty() {
        return Err(AppError::Validation("Job id must not be empty.".into()));
    }
    if job_id.contains(['/', '?', '#']) {
        return Err(AppError::Validation(format!("Invalid job id: {}", job_id)));
    }
    Ok(())
}
