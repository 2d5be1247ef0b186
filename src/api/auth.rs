//! Registration, login and logout.
//!
//! Login is the only place a token enters the session and logout the only
//! place it leaves.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::client::ApiClient;
use crate::error::AppError;

/// Token endpoint response.
#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// User record returned by registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
}

impl ApiClient {
    /// Creates an account.
    ///
    /// # Errors
    ///
    /// - `AppError::DuplicateUsername` - the server answered 400
    /// - `AppError::RegistrationFailed` - any other failure
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<RegisteredUser, AppError> {
        let body = RegisterRequest {
            username,
            password: password.expose_secret(),
        };
        let prepared = self
            .request(Method::POST, "/api/v1/auth/register")
            .await?
            .with(|b| b.json(&body));

        match self.send_json::<RegisteredUser>(prepared).await {
            Ok(user) => {
                info!("[AUTH] Registered new account");
                Ok(user)
            }
            Err(AppError::Server { status: 400, .. }) => Err(AppError::DuplicateUsername),
            Err(e) => {
                warn!("[AUTH] Registration failed: {}", e);
                Err(AppError::RegistrationFailed)
            }
        }
    }

    /// Exchanges credentials for a token and stores it in the session.
    ///
    /// Failures are returned unchanged; the session is left untouched.
    pub async fn login(&self, username: &str, password: &SecretString) -> Result<(), AppError> {
        let params = [
            ("username", username),
            ("password", password.expose_secret()),
        ];
        let prepared = self
            .request(Method::POST, "/api/v1/auth/token")
            .await?
            .with(|b| b.form(&params));

        let response: AccessTokenResponse = self.send_json(prepared).await?;
        self.session()
            .set_token(SecretString::from(response.access_token))
            .await?;

        info!("[AUTH] Login successful");
        Ok(())
    }

    /// Drops the session token locally. The server keeps no session state.
    pub async fn logout(&self) -> Result<(), AppError> {
        self.session().clear_token().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::Session;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(base: &str) -> ApiClient {
        let config = ClientConfig::with_base_url(base).unwrap();
        ApiClient::new(&config, Session::in_memory()).unwrap()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[tokio::test]
    async fn login_stores_token_in_session() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/api/v1/auth/token"))
            .and(header("Content-Type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("username=alice"))
            .and(body_string_contains("password=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt-abc",
                "token_type": "bearer"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        client.login("alice", &secret("s3cret")).await.unwrap();

        let token = client.session().token().await.expect("token should be stored");
        assert_eq!(token.expose_secret(), "jwt-abc");
    }

    #[tokio::test]
    async fn login_failure_propagates_and_leaves_session_empty() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/api/v1/auth/token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "Incorrect username or password"})),
            )
            .mount(&mock_server)
            .await;

        let result = client.login("alice", &secret("wrong")).await;

        assert!(matches!(result, Err(AppError::Server { status: 400, .. })));
        assert!(client.session().token().await.is_none());
    }

    #[tokio::test]
    async fn register_success_returns_user() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());
        let id = Uuid::new_v4();

        Mock::given(method("POST"))
            .and(path("/api/v1/auth/register"))
            .and(body_json(serde_json::json!({"username": "bob", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": id,
                "username": "bob",
                "is_admin": false
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let user = client.register("bob", &secret("pw")).await.unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.username, "bob");
    }

    #[tokio::test]
    async fn register_duplicate_username_has_exact_message() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/api/v1/auth/register"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "Username already registered"})),
            )
            .mount(&mock_server)
            .await;

        let err = client.register("bob", &secret("pw")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateUsername));
        assert_eq!(err.to_string(), "Username already registered.");
    }

    #[tokio::test]
    async fn register_other_failure_is_unknown_error() {
        let mock_server = MockServer::start().await;
        let client = client_for(&mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/api/v1/auth/register"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let err = client.register("bob", &secret("pw")).await.unwrap_err();
        assert!(matches!(err, AppError::RegistrationFailed));
        assert_eq!(err.to_string(), "An unknown error occurred.");
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let client = client_for("http://localhost:8000");
        client.session().set_token(secret("jwt")).await.unwrap();

        client.logout().await.unwrap();

        assert!(client.session().token().await.is_none());
    }
}
