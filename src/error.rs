use serde::Serialize;
use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "access_token",
    "password",
    "authorization:",
];

/// Message shown when registration fails because the username is taken.
pub const DUPLICATE_USERNAME_MESSAGE: &str = "Username already registered.";

/// Message shown for every other registration failure.
pub const UNKNOWN_REGISTRATION_MESSAGE: &str = "An unknown error occurred.";

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the command line.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Validation ────────────────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid CSV: {0}")]
    CsvInvalid(String),

    // ── Auth ──────────────────────────────────────────────────────────────────
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired")]
    SessionExpired,

    #[error("{}", DUPLICATE_USERNAME_MESSAGE)]
    DuplicateUsername,

    #[error("{}", UNKNOWN_REGISTRATION_MESSAGE)]
    RegistrationFailed,

    // ── Server ────────────────────────────────────────────────────────────────
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    // ── Bulk Upload ───────────────────────────────────────────────────────────
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Polling job {job_id} failed: {source}")]
    PollFailed {
        job_id: String,
        #[source]
        source: Box<AppError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Network ───────────────────────────────────────────────────────────────
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Local ─────────────────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for failures raised before any request was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::CsvInvalid(_))
    }

    /// Converts the error into a presentation suitable for display.
    /// Never leaks tokens, passwords, or authorization headers.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Validation ────────────────────────────────────────────────────
            AppError::Validation(msg) => ErrorPresentation {
                title: "Invalid Input".into(),
                message: sanitize_message(msg, "Some of the provided input is invalid."),
                action: Some("Correct the input and try again".into()),
            },

            AppError::CsvInvalid(msg) => ErrorPresentation {
                title: "Invalid CSV".into(),
                message: format!("The CSV file has a formatting problem: {}", msg),
                action: Some("Fix the CSV file and try again".into()),
            },

            // ── Auth ──────────────────────────────────────────────────────────
            AppError::NotAuthenticated => ErrorPresentation {
                title: "Not Logged In".into(),
                message: "You need to log in to continue.".into(),
                action: Some("Log in with `skyfare login`".into()),
            },

            AppError::SessionExpired => ErrorPresentation {
                title: "Session Expired".into(),
                message: "Your session is no longer valid.".into(),
                action: Some("Log in again".into()),
            },

            AppError::DuplicateUsername => ErrorPresentation {
                title: "Registration Failed".into(),
                message: DUPLICATE_USERNAME_MESSAGE.into(),
                action: Some("Choose a different username".into()),
            },

            AppError::RegistrationFailed => ErrorPresentation {
                title: "Registration Failed".into(),
                message: UNKNOWN_REGISTRATION_MESSAGE.into(),
                action: Some("Try again".into()),
            },

            // ── Server ────────────────────────────────────────────────────────
            AppError::Server { status, message } => ErrorPresentation {
                title: "Request Failed".into(),
                message: format!(
                    "The server rejected the request ({}): {}",
                    status,
                    sanitize_message(message, "no details available")
                ),
                action: None,
            },

            AppError::NotFound(_) => ErrorPresentation {
                title: "Not Found".into(),
                message: "The requested item does not exist.".into(),
                action: None,
            },

            // ── Bulk Upload ───────────────────────────────────────────────────
            AppError::UploadFailed(_) => ErrorPresentation {
                title: "Upload Failed".into(),
                message: "Error uploading file. Please try again.".into(),
                action: Some("Try again".into()),
            },

            AppError::PollFailed { .. } => ErrorPresentation {
                title: "Status Unavailable".into(),
                message: "Could not fetch the upload status. Polling has stopped.".into(),
                action: Some("Check the status again later".into()),
            },

            AppError::Cancelled => ErrorPresentation {
                title: "Cancelled".into(),
                message: "The operation was cancelled.".into(),
                action: None,
            },

            // ── Network ───────────────────────────────────────────────────────
            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not reach the flight API. Please check your connection.".into(),
                action: Some("Check network and retry".into()),
            },

            // ── Local ─────────────────────────────────────────────────────────
            AppError::Config(msg) => ErrorPresentation {
                title: "Configuration Error".into(),
                message: sanitize_message(msg, "The configuration is invalid."),
                action: Some("Check SKYFARE_* environment variables".into()),
            },

            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}
