//! Persistent storage for the session token.
//!
//! The keychain store keeps the bearer token in the OS keychain using the
//! `keyring` crate. Tokens are never logged; keychain calls run on the
//! blocking pool because the platform backends are synchronous.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use secrecy::{ExposeSecret, SecretString};

use crate::error::AppError;

/// The service name used for all keychain entries.
const SERVICE_NAME: &str = "skyfare";

/// The key the session token is stored under.
pub const TOKEN_KEY: &str = "session_token";

type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

/// Backend that persists the session token between runs.
pub trait TokenStore: Send + Sync {
    /// Loads the stored token, `None` when nothing is stored.
    fn load(&self) -> StoreFuture<'_, Option<SecretString>>;

    /// Replaces the stored token.
    fn save<'a>(&'a self, token: &'a SecretString) -> StoreFuture<'a, ()>;

    /// Removes the stored token. Removing a missing token succeeds.
    fn delete(&self) -> StoreFuture<'_, ()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Keychain
// ─────────────────────────────────────────────────────────────────────────────

/// Token store backed by the OS keychain.
#[derive(Debug, Clone)]
pub struct KeychainTokenStore {
    service: String,
    key: String,
}

impl KeychainTokenStore {
    pub fn new() -> Self {
        Self {
            service: SERVICE_NAME.to_string(),
            key: TOKEN_KEY.to_string(),
        }
    }

    /// Uses a custom service name, e.g. to keep test entries apart.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key: TOKEN_KEY.to_string(),
        }
    }

    fn entry(service: &str, key: &str) -> Result<keyring::Entry, AppError> {
        keyring::Entry::new(service, key)
            .map_err(|_| AppError::Internal("Failed to access keychain.".into()))
    }
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeychainTokenStore {
    fn load(&self) -> StoreFuture<'_, Option<SecretString>> {
        let (service, key) = (self.service.clone(), self.key.clone());
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let entry = Self::entry(&service, &key)?;
                match entry.get_password() {
                    Ok(token) => Ok(Some(SecretString::from(token))),
                    Err(keyring::Error::NoEntry) => Ok(None),
                    Err(_) => Err(AppError::Internal("Failed to retrieve credentials.".into())),
                }
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }

    fn save<'a>(&'a self, token: &'a SecretString) -> StoreFuture<'a, ()> {
        let (service, key) = (self.service.clone(), self.key.clone());
        let token = token.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                Self::entry(&service, &key)?
                    .set_password(token.expose_secret())
                    .map_err(|_| AppError::Internal("Failed to store credentials.".into()))
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }

    fn delete(&self) -> StoreFuture<'_, ()> {
        let (service, key) = (self.service.clone(), self.key.clone());
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                match Self::entry(&service, &key)?.delete_credential() {
                    Ok(()) => Ok(()),
                    Err(keyring::Error::NoEntry) => Ok(()),
                    Err(_) => Err(AppError::Internal("Failed to delete credentials.".into())),
                }
            })
            .await
            .map_err(|_| AppError::Internal("Keychain task failed.".into()))?
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Token store that lives only as long as the process.
#[derive(Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<SecretString>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with a token already stored, as if saved by an earlier run.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(SecretString::from(token.into())))),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<SecretString>>, AppError> {
        self.token
            .lock()
            .map_err(|_| AppError::Internal("Token store lock poisoned.".into()))
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTokenStore").finish_non_exhaustive()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> StoreFuture<'_, Option<SecretString>> {
        Box::pin(async move { Ok(self.slot()?.clone()) })
    }

    fn save<'a>(&'a self, token: &'a SecretString) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            *self.slot()? = Some(token.clone());
            Ok(())
        })
    }

    fn delete(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            *self.slot()? = None;
            Ok(())
        })
    }
}
