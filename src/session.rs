//! Authentication session holder.
//!
//! Holds the optional bearer token shared by every request the client makes.
//! The token is replaced wholesale under a write lock; requests only ever
//! take a read lock for the moment it takes to copy it.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::AppError;
use crate::storage::{MemoryTokenStore, TokenStore};

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide session state. Cloning yields another handle to the same
/// token, so a client and its sub-APIs always agree on who is logged in.
#[derive(Clone)]
pub struct Session {
    /// Current bearer token, if logged in.
    token: Arc<RwLock<Option<SecretString>>>,
    /// Where the token is persisted between runs.
    store: Arc<dyn TokenStore>,
}

impl Session {
    /// An unauthenticated session that persists nothing.
    pub fn in_memory() -> Self {
        Self::with_store(Arc::new(MemoryTokenStore::new()))
    }

    /// An unauthenticated session writing through to `store`.
    pub fn with_store(store: Arc<dyn TokenStore>) -> Self {
        Self {
            token: Arc::new(RwLock::new(None)),
            store,
        }
    }

    /// Builds a session from whatever token `store` already holds.
    pub async fn restore(store: Arc<dyn TokenStore>) -> Result<Self, AppError> {
        let token = store.load().await?;
        if token.is_some() {
            info!("[SESSION] Restored persisted session token");
        }
        Ok(Self {
            token: Arc::new(RwLock::new(token)),
            store,
        })
    }

    /// Returns the current token, if any.
    pub async fn token(&self) -> Option<SecretString> {
        self.token.read().await.clone()
    }

    /// Returns true when a token is present.
    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    /// Stores a new token, replacing any previous one.
    pub async fn set_token(&self, token: SecretString) -> Result<(), AppError> {
        self.store.save(&token).await?;
        *self.token.write().await = Some(token);
        info!("[SESSION] Session token stored");
        Ok(())
    }

    /// Forgets the token. Clearing an empty session succeeds.
    pub async fn clear_token(&self) -> Result<(), AppError> {
        *self.token.write().await = None;
        self.store.delete().await?;
        info!("[SESSION] Session token cleared");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self
            .token
            .try_read()
            .map(|guard| guard.is_some())
            .unwrap_or(false);
        f.debug_struct("Session")
            .field("token", &present.then_some("[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn starts_unauthenticated() {
        let session = Session::in_memory();
        assert!(session.token().await.is_none());
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn set_then_get_returns_token() {
        let session = Session::in_memory();
        session.set_token(secret("t-123")).await.unwrap();

        let token = session.token().await.expect("token should be present");
        assert_eq!(token.expose_secret(), "t-123");
        assert!(session.is_authenticated().await);
    }

    #[tokio::test]
    async fn clear_removes_token() {
        let session = Session::in_memory();
        session.set_token(secret("t-123")).await.unwrap();
        session.clear_token().await.unwrap();

        assert!(session.token().await.is_none());
        // Clearing again is fine.
        session.clear_token().await.unwrap();
    }

    #[tokio::test]
    async fn set_replaces_previous_token() {
        let session = Session::in_memory();
        session.set_token(secret("old")).await.unwrap();
        session.set_token(secret("new")).await.unwrap();

        assert_eq!(session.token().await.unwrap().expose_secret(), "new");
    }

    #[tokio::test]
    async fn clones_share_one_token() {
        let session = Session::in_memory();
        let reader = session.clone();

        session.set_token(secret("shared")).await.unwrap();
        assert_eq!(reader.token().await.unwrap().expose_secret(), "shared");

        session.clear_token().await.unwrap();
        assert!(reader.token().await.is_none());
    }

    #[tokio::test]
    async fn writes_through_to_store() {
        let store = Arc::new(MemoryTokenStore::new());
        let session = Session::with_store(store.clone());

        session.set_token(secret("persisted")).await.unwrap();
        assert_eq!(
            store.load().await.unwrap().unwrap().expose_secret(),
            "persisted"
        );

        session.clear_token().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_picks_up_persisted_token() {
        let store = Arc::new(MemoryTokenStore::with_token("from-last-run"));
        let session = Session::restore(store).await.unwrap();

        assert_eq!(
            session.token().await.unwrap().expose_secret(),
            "from-last-run"
        );
    }

    #[tokio::test]
    async fn debug_redacts_token() {
        let session = Session::in_memory();
        session.set_token(secret("super_secret_token_12345")).await.unwrap();

        let debug_output = format!("{:?}", session);
        assert!(!debug_output.contains("super_secret_token_12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
