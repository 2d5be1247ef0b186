//! Registration, login and bearer propagation across endpoints.

use std::sync::Arc;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use skyfare::storage::{MemoryTokenStore, TokenStore};
use skyfare::{ApiClient, AppError, ClientConfig, Session};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

fn client_with(mock_server: &MockServer, session: Session) -> ApiClient {
    let config = ClientConfig::with_base_url(&mock_server.uri()).unwrap();
    ApiClient::new(&config, session).unwrap()
}

#[tokio::test]
async fn duplicate_registration_shows_fixed_message() {
    let mock_server = MockServer::start().await;
    let client = client_with(&mock_server, Session::in_memory());

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"detail": "Username already registered"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = client.register("alice", &secret("pw")).await.unwrap_err();

    assert!(matches!(err, AppError::DuplicateUsername));
    assert_eq!(err.to_presentation().message, "Username already registered.");
}

#[tokio::test]
async fn registration_server_error_is_generic() {
    let mock_server = MockServer::start().await;
    let client = client_with(&mock_server, Session::in_memory());

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/register"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let err = client.register("alice", &secret("pw")).await.unwrap_err();
    assert_eq!(err.to_string(), "An unknown error occurred.");
}

#[tokio::test]
async fn login_token_is_sent_on_every_request_until_logout() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with(&mock_server, Session::with_store(store.clone()));

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "jwt-123",
            "token_type": "bearer"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/airports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["JFK"])))
        .mount(&mock_server)
        .await;

    client.login("alice", &secret("pw")).await.unwrap();
    let persisted = store.load().await.unwrap().expect("token persisted");
    assert_eq!(persisted.expose_secret(), "jwt-123");

    let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    client.search_flights("JFK", "LAX", date).await.unwrap();
    client.my_bookings().await.unwrap();

    client.logout().await.unwrap();
    assert!(store.load().await.unwrap().is_none());
    client.list_airports().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let auth_of = |p: &str| {
        requests
            .iter()
            .find(|r| r.url.path() == p)
            .and_then(|r| r.headers.get("authorization"))
            .map(|v| v.to_str().unwrap().to_string())
    };

    assert_eq!(auth_of("/api/v1/auth/token"), None);
    assert_eq!(auth_of("/api/v1/search").as_deref(), Some("Bearer jwt-123"));
    assert_eq!(auth_of("/api/v1/bookings").as_deref(), Some("Bearer jwt-123"));
    assert_eq!(auth_of("/api/v1/airports"), None);
}

#[tokio::test]
async fn restored_session_authenticates_first_request() {
    let mock_server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_token("persisted-jwt"));
    let session = Session::restore(store).await.unwrap();
    let client = client_with(&mock_server, session);

    Mock::given(method("GET"))
        .and(path("/api/v1/bookings"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let err = client.my_bookings().await.unwrap_err();

    assert!(matches!(err, AppError::SessionExpired));
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(
        requests[0].headers.get("authorization").unwrap(),
        "Bearer persisted-jwt"
    );
}
