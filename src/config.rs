//! Client configuration loaded from `SKYFARE_*` environment variables.
//!
//! | Variable                     | Default                 | Description                              |
//! |------------------------------|-------------------------|------------------------------------------|
//! | `SKYFARE_API_URL`            | `http://localhost:8000` | Base URL of the flight API               |
//! | `SKYFARE_TIMEOUT_SECS`       | `30`                    | Per-request timeout                      |
//! | `SKYFARE_POLL_INTERVAL_SECS` | `2`                     | Seconds between bulk status fetches      |
//! | `SKYFARE_POLL_FIRST_FETCH`   | `immediate`             | `immediate` or `delayed`                 |
//! | `SKYFARE_LOG_QUERY`          | `false`                 | Log redacted query strings               |
//! | `SKYFARE_TOKEN_STORE`        | `keychain`              | `keychain` or `memory`                   |

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::api::LoggingMode;
use crate::bulk::FirstFetch;
use crate::error::AppError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Where the session token is persisted between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// OS keychain entry.
    #[default]
    Keychain,
    /// Process memory only; the token is lost on exit.
    Memory,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub first_fetch: FirstFetch,
    pub logging_mode: LoggingMode,
    pub token_store: TokenStoreKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Constant is a valid absolute URL.
            base_url: Url::parse(DEFAULT_API_URL).expect("default API URL parses"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            first_fetch: FirstFetch::default(),
            logging_mode: LoggingMode::default(),
            token_store: TokenStoreKind::default(),
        }
    }
}

impl ClientConfig {
    /// Builds a config pointing at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(std::env::vars())
    }

    /// Builds a config from an explicit set of variables. Unset variables
    /// fall back to defaults; set but malformed ones are errors.
    pub fn from_vars<I>(vars: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with("SKYFARE_"))
            .collect();
        let mut config = Self::default();

        if let Some(url) = vars.get("SKYFARE_API_URL") {
            config.base_url = parse_base_url(url)?;
        }
        if let Some(v) = vars.get("SKYFARE_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_secs("SKYFARE_TIMEOUT_SECS", v)?);
        }
        if let Some(v) = vars.get("SKYFARE_POLL_INTERVAL_SECS") {
            config.poll_interval =
                Duration::from_secs(parse_secs("SKYFARE_POLL_INTERVAL_SECS", v)?);
        }
        if let Some(v) = vars.get("SKYFARE_POLL_FIRST_FETCH") {
            config.first_fetch = match v.trim().to_ascii_lowercase().as_str() {
                "immediate" => FirstFetch::Immediate,
                "delayed" => FirstFetch::AfterInterval,
                other => {
                    return Err(AppError::Config(format!(
                        "SKYFARE_POLL_FIRST_FETCH must be 'immediate' or 'delayed', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(v) = vars.get("SKYFARE_LOG_QUERY") {
            config.logging_mode = if parse_bool("SKYFARE_LOG_QUERY", v)? {
                LoggingMode::PathAndQueryRedacted
            } else {
                LoggingMode::PathOnly
            };
        }
        if let Some(v) = vars.get("SKYFARE_TOKEN_STORE") {
            config.token_store = match v.trim().to_ascii_lowercase().as_str() {
                "keychain" => TokenStoreKind::Keychain,
                "memory" => TokenStoreKind::Memory,
                other => {
                    return Err(AppError::Config(format!(
                        "SKYFARE_TOKEN_STORE must be 'keychain' or 'memory', got '{}'",
                        other
                    )))
                }
            };
        }

        Ok(config)
    }
}

/// Parses and normalizes the API base URL.
pub fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("Invalid API URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "API URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn parse_secs(name: &str, raw: &str) -> Result<u64, AppError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(AppError::Config(format!("{} must be greater than 0", name))),
        Ok(secs) => Ok(secs),
        Err(_) => Err(AppError::Config(format!(
            "{} must be a whole number of seconds, got '{}'",
            name, raw
        ))),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Config(format!("{} must be a boolean, got '{}'", name, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = ClientConfig::from_vars(vars(&[("PATH", "/usr/bin")])).unwrap();

        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.first_fetch, FirstFetch::Immediate);
        assert_eq!(config.logging_mode, LoggingMode::PathOnly);
        assert_eq!(config.token_store, TokenStoreKind::Keychain);
    }

    #[test]
    fn overrides_are_read() {
        let config = ClientConfig::from_vars(vars(&[
            ("SKYFARE_API_URL", "https://flights.example.com"),
            ("SKYFARE_TIMEOUT_SECS", "5"),
            ("SKYFARE_POLL_INTERVAL_SECS", "10"),
            ("SKYFARE_POLL_FIRST_FETCH", "delayed"),
            ("SKYFARE_LOG_QUERY", "true"),
            ("SKYFARE_TOKEN_STORE", "memory"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.host_str(), Some("flights.example.com"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.first_fetch, FirstFetch::AfterInterval);
        assert_eq!(config.logging_mode, LoggingMode::PathAndQueryRedacted);
        assert_eq!(config.token_store, TokenStoreKind::Memory);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = ClientConfig::from_vars(vars(&[("SKYFARE_POLL_INTERVAL_SECS", "0")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn malformed_values_are_rejected() {
        for (key, value) in [
            ("SKYFARE_API_URL", "not a url"),
            ("SKYFARE_API_URL", "ftp://flights.example.com"),
            ("SKYFARE_TIMEOUT_SECS", "soon"),
            ("SKYFARE_POLL_FIRST_FETCH", "eventually"),
            ("SKYFARE_LOG_QUERY", "maybe"),
            ("SKYFARE_TOKEN_STORE", "disk"),
        ] {
            let result = ClientConfig::from_vars(vars(&[(key, value)]));
            assert!(
                matches!(result, Err(AppError::Config(_))),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
