//! Pre-flight validation of flight CSV files before bulk upload.
//!
//! Only a fixed-size sample is read, so very large files are cheap to check.
//! Errors are limited to what would make the whole upload fail server-side:
//! - Empty files and non-UTF-8 content
//! - Missing header row or missing required columns
//!
//! Row-level problems, such as a row whose column count disagrees with the
//! header, are only warnings. The server counts those rows as failed and
//! reports them in the job's errors.

use std::io::Cursor;
use std::path::Path;

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::error::AppError;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Size of the sample buffer for validation (256 KB).
pub const VALIDATION_SAMPLE_SIZE: usize = 256 * 1024;

/// Maximum number of records to check in the sample.
const MAX_RECORDS_TO_VALIDATE: usize = 1000;

/// UTF-8 BOM bytes.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Columns every flight row needs.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "flight_number",
    "source",
    "destination",
    "departure_ts",
    "arrival_ts",
    "total_seats",
    "price",
];

// ─────────────────────────────────────────────────────────────────────────────
// Public Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CsvValidationResult {
    /// Problems that block the upload.
    pub errors: Vec<CsvValidationError>,
    /// Row-level problems the server will report per row.
    pub warnings: Vec<CsvValidationError>,
    pub file_size_bytes: u64,
    pub headers: Vec<String>,
    /// Data rows seen in the sample.
    pub sampled_rows: u64,
    /// True when the file is larger than the sample.
    pub sample_only: bool,
}

impl CsvValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts a failed validation into an `AppError::CsvInvalid` carrying
    /// the first blocking problem found. Warnings never fail.
    pub fn into_result(self) -> Result<Self, AppError> {
        match self.errors.first() {
            None => Ok(self),
            Some(first) => Err(AppError::CsvInvalid(first.describe())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsvValidationError {
    EmptyFile,
    NotUtf8,
    NoHeaders,
    MissingColumns { columns: Vec<String> },
    InconsistentColumns {
        expected: usize,
        found: usize,
        /// 1-based line number, counting the header.
        row: u64,
    },
    CsvParseError { message: String },
}

impl CsvValidationError {
    pub fn describe(&self) -> String {
        match self {
            CsvValidationError::EmptyFile => "file is empty".into(),
            CsvValidationError::NotUtf8 => "file is not valid UTF-8".into(),
            CsvValidationError::NoHeaders => "header row is missing".into(),
            CsvValidationError::MissingColumns { columns } => {
                format!("missing required columns: {}", columns.join(", "))
            }
            CsvValidationError::InconsistentColumns {
                expected,
                found,
                row,
            } => format!("row {} has {} columns, expected {}", row, found, expected),
            CsvValidationError::CsvParseError { message } => message.clone(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Validates a flight CSV file from a sample of its first bytes.
///
/// # Errors
///
/// Returns `AppError` only when the file cannot be read. Content problems
/// are reported in `CsvValidationResult.errors`.
pub async fn validate(path: &Path) -> Result<CsvValidationResult, AppError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| AppError::Validation(format!("Cannot read {}: {}", path.display(), e)))?;

    let file_size_bytes = metadata.len();
    let mut result = CsvValidationResult {
        errors: Vec::new(),
        warnings: Vec::new(),
        file_size_bytes,
        headers: Vec::new(),
        sampled_rows: 0,
        sample_only: false,
    };

    if file_size_bytes == 0 {
        result.errors.push(CsvValidationError::EmptyFile);
        return Ok(result);
    }

    let sample_size = (file_size_bytes as usize).min(VALIDATION_SAMPLE_SIZE);
    let mut buffer = vec![0u8; sample_size];
    let mut file = File::open(path)
        .await
        .map_err(|e| AppError::Validation(format!("Cannot open {}: {}", path.display(), e)))?;
    file.read_exact(&mut buffer)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read file: {}", e)))?;

    result.sample_only = file_size_bytes > sample_size as u64;
    Ok(validate_sample(&buffer, result))
}

/// Validates an in-memory sample.
fn validate_sample(buffer: &[u8], mut result: CsvValidationResult) -> CsvValidationResult {
    let data = buffer.strip_prefix(UTF8_BOM).unwrap_or(buffer);

    // A sample cut mid-character is still fine.
    let text = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(e) if result.sample_only && e.error_len().is_none() => {
            // valid_up_to is a char boundary.
            std::str::from_utf8(&data[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => {
            result.errors.push(CsvValidationError::NotUtf8);
            return result;
        }
    };

    // Drop the trailing partial line of a truncated sample.
    let text = if result.sample_only {
        text.rfind('\n').map(|idx| &text[..=idx]).unwrap_or(text)
    } else {
        text
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(Cursor::new(text.as_bytes()));

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(String::from).collect(),
        Err(e) => {
            result.errors.push(CsvValidationError::CsvParseError {
                message: e.to_string(),
            });
            return result;
        }
    };

    if headers.iter().all(|h| h.is_empty()) {
        result.errors.push(CsvValidationError::NoHeaders);
        return result;
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|h| h == *required))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        result.errors.push(CsvValidationError::MissingColumns { columns: missing });
    }

    let expected = headers.len();
    result.headers = headers;

    for record in reader.records().take(MAX_RECORDS_TO_VALIDATE) {
        match record {
            Ok(record) => {
                result.sampled_rows += 1;
                if record.len() != expected {
                    result.warnings.push(CsvValidationError::InconsistentColumns {
                        expected,
                        found: record.len(),
                        row: result.sampled_rows + 1,
                    });
                    break;
                }
            }
            Err(e) => {
                result.warnings.push(CsvValidationError::CsvParseError {
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
