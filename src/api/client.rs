//! HTTP client for the flight API with bearer injection and safe logging.

use std::time::Instant;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::session::Session;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// User agent string for all API requests.
const CLIENT_USER_AGENT: &str = concat!("skyfare/", env!("CARGO_PKG_VERSION"));

/// Query parameter keys (case-insensitive) that should have their values redacted.
const SENSITIVE_QUERY_PARAMS: &[&str] = &[
    "access_token",
    "token",
    "password",
    "username",
    "authorization",
];

// ─────────────────────────────────────────────────────────────────────────────
// LoggingMode
// ─────────────────────────────────────────────────────────────────────────────

/// Controls how URLs are sanitized for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoggingMode {
    /// Log only the path component.
    /// Example: `/api/v1/search`
    #[default]
    PathOnly,

    /// Log path and query parameters, redacting sensitive values.
    /// Example: `/api/v1/search?source=JFK&destination=LAX&date=2025-01-01`
    PathAndQueryRedacted,
}

// ─────────────────────────────────────────────────────────────────────────────
// URL Sanitization
// ─────────────────────────────────────────────────────────────────────────────

fn is_sensitive_param(key: &str) -> bool {
    let key_lower = key.to_ascii_lowercase();
    SENSITIVE_QUERY_PARAMS
        .iter()
        .any(|&sensitive| key_lower == sensitive)
}

/// Sanitizes a URL for logging. The result never contains the scheme,
/// host or fragment.
pub fn sanitize_url_for_logs(url: &Url, mode: LoggingMode) -> String {
    let path = url.path();

    match mode {
        LoggingMode::PathOnly => path.to_string(),
        LoggingMode::PathAndQueryRedacted => {
            let pairs: Vec<String> = url
                .query_pairs()
                .map(|(key, value)| {
                    if is_sensitive_param(&key) {
                        format!("{}=***", key)
                    } else {
                        format!("{}={}", key, value)
                    }
                })
                .collect();

            if pairs.is_empty() {
                path.to_string()
            } else {
                format!("{}?{}", path, pairs.join("&"))
            }
        }
    }
}

/// Shortens an identifier for logging (first 8 chars).
pub(crate) fn redact_id(id: &str) -> String {
    match id.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ApiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the flight API.
///
/// Every request goes through [`ApiClient::request`], which consults the
/// [`Session`] and attaches `Authorization: Bearer <token>` when a token is
/// present. Clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    /// Always ends with `/` so relative joins keep any path prefix.
    base_url: Url,
    session: Session,
    logging_mode: LoggingMode,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("session", &self.session)
            .field("logging_mode", &self.logging_mode)
            .finish()
    }
}

impl ApiClient {
    /// Creates a client for `config.base_url` that authenticates with `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self, AppError> {
        let http = build_http_client(config)?;
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            session,
            logging_mode: config.logging_mode,
        })
    }

    /// Returns the session this client authenticates with.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an API path (e.g. `/api/v1/airports`) against the base URL.
    pub fn build_url(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|_| AppError::Internal(format!("Invalid path: {}", path)))
    }

    /// Starts a request, attaching the bearer token when the session has one.
    pub(crate) async fn request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<PreparedRequest, AppError> {
        let url = self.build_url(path)?;
        let mut builder = self.http.request(method.clone(), url.clone());

        let token = self.session.token().await;
        if let Some(token) = &token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        Ok(PreparedRequest {
            method,
            url,
            builder,
            authenticated: token.is_some(),
        })
    }

    /// Sends a prepared request with timing and logging.
    ///
    /// Transport failures become `AppError::ConnectionFailed`; the raw
    /// reqwest error is not surfaced because it may contain the full URL.
    /// Non-2xx responses are returned as-is.
    pub(crate) async fn send(&self, prepared: PreparedRequest) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let sanitized_url = sanitize_url_for_logs(&prepared.url, self.logging_mode);

        let result = prepared.builder.send().await;
        let duration_ms = start.elapsed().as_millis();

        match result {
            Ok(response) => {
                let x_request_id = response
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                info!(
                    "[API] {} {} {} {}ms {}",
                    prepared.method,
                    sanitized_url,
                    response.status().as_u16(),
                    duration_ms,
                    x_request_id
                );

                Ok(response)
            }
            Err(e) => {
                let reason = if e.is_timeout() { "timed out" } else { "failed" };
                info!(
                    "[API] {} {} FAILED {}ms",
                    prepared.method, sanitized_url, duration_ms
                );
                Err(AppError::ConnectionFailed(format!(
                    "Request to {} {}",
                    sanitized_url, reason
                )))
            }
        }
    }

    /// Sends a request and decodes a successful JSON body, mapping any
    /// non-2xx status to an error.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        prepared: PreparedRequest,
    ) -> Result<T, AppError> {
        let authenticated = prepared.authenticated;
        let response = self.send(prepared).await?;
        let status = response.status();

        if !status.is_success() {
            return Err(error_from_response(response, authenticated).await);
        }

        response.json::<T>().await.map_err(|e| {
            warn!("[API] Failed to decode response body");
            AppError::Internal(format!("Unexpected response from server: {}", e))
        })
    }
}

/// A request that has a URL and credentials but has not been sent yet.
pub(crate) struct PreparedRequest {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) builder: RequestBuilder,
    /// Whether a bearer token was attached.
    pub(crate) authenticated: bool,
}

impl PreparedRequest {
    /// Applies further builder settings (body, query, headers).
    pub(crate) fn with(mut self, f: impl FnOnce(RequestBuilder) -> RequestBuilder) -> Self {
        self.builder = f(self.builder);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Handling
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a non-2xx response to an `AppError`.
///
/// The server reports failures as `{"detail": "..."}`; validation failures
/// carry a list in `detail`, which is kept as compact JSON.
pub(crate) async fn error_from_response(
    response: reqwest::Response,
    authenticated: bool,
) -> AppError {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return if authenticated {
            AppError::SessionExpired
        } else {
            AppError::NotAuthenticated
        };
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_detail(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    });

    if status == StatusCode::NOT_FOUND {
        return AppError::NotFound(message);
    }

    AppError::Server {
        status: status.as_u16(),
        message,
    }
}

fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Builds the configured HTTP client.
fn build_http_client(config: &ClientConfig) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(config.timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
