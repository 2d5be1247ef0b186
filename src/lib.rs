//! Typed async client for the flight search and booking API.
//!
//! [`ApiClient`](api::ApiClient) wraps every endpoint and attaches the
//! bearer token held by its [`Session`](session::Session). Bulk flight
//! uploads are submitted with
//! [`ApiClient::submit_bulk_upload`](api::ApiClient::submit_bulk_upload) and
//! followed with a [`JobPoller`](bulk::JobPoller).

pub mod api;
pub mod bulk;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod validation;

pub use api::ApiClient;
pub use config::ClientConfig;
pub use error::AppError;
pub use session::Session;
