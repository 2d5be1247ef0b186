//! Booking creation, listing and cancellation.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::client::{redact_id, ApiClient};
use crate::error::AppError;

/// Booking lifecycle as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    /// Seats reserved, payment not settled.
    Pending,
    Confirmed,
    Cancelled,
    /// Payment failed; seats were released.
    Failed,
    #[serde(other)]
    Unknown,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
            BookingStatus::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub seats: u32,
    pub status: BookingStatus,
    #[serde(default)]
    pub payment_ref: Option<String>,
}

impl Booking {
    /// Only confirmed bookings can be cancelled; the server rejects the rest.
    pub fn is_cancellable(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// Body of a booking request. `user_id` is omitted when absent; the server
/// then books for the logged-in user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingRequest {
    pub flight_id: Uuid,
    pub seats: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl ApiClient {
    /// Books seats on a flight.
    pub async fn create_booking(&self, request: &BookingRequest) -> Result<Booking, AppError> {
        if request.seats == 0 {
            return Err(AppError::Validation("seats must be at least 1".into()));
        }
        let prepared = self
            .request(Method::POST, "/api/v1/booking")
            .await?
            .with(|b| b.json(request));

        let booking: Booking = self.send_json(prepared).await?;
        info!(
            "[BOOKING] Booking {} is {}",
            redact_id(&booking.id.to_string()),
            booking.status.as_str()
        );
        Ok(booking)
    }

    /// Lists the current user's bookings.
    pub async fn my_bookings(&self) -> Result<Vec<Booking>, AppError> {
        let prepared = self.request(Method::GET, "/api/v1/bookings").await?;
        self.send_json(prepared).await
    }

    /// Cancels a booking, returning it in its updated state.
    pub async fn cancel_booking(&self, id: Uuid) -> Result<Booking, AppError> {
        let prepared = self
            .request(Method::DELETE, &format!("/api/v1/bookings/{}", id))
            .await?;

        let booking: Booking = self.send_json(prepared).await?;
        info!("[BOOKING] Cancelled booking {}", redact_id(&id.to_string()));
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::session::Session;
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn logged_in_client(base: &str) -> ApiClient {
        let config = ClientConfig::with_base_url(base).unwrap();
        let client = ApiClient::new(&config, Session::in_memory()).unwrap();
        client
            .session()
            .set_token(SecretString::from("jwt-user".to_string()))
            .await
            .unwrap();
        client
    }

    fn booking_json(id: Uuid, flight_id: Uuid, status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "user_id": Uuid::nil(),
            "flight_id": flight_id,
            "seats": 2,
            "status": status,
            "payment_ref": "ref_123"
        })
    }

    #[tokio::test]
    async fn create_booking_omits_absent_user_id() {
        let mock_server = MockServer::start().await;
        let client = logged_in_client(&mock_server.uri()).await;
        let (id, flight_id) = (Uuid::new_v4(), Uuid::new_v4());

        Mock::given(method("POST"))
            .and(path("/api/v1/booking"))
            .and(header("Authorization", "Bearer jwt-user"))
            .and(body_json(serde_json::json!({"flight_id": flight_id, "seats": 2})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(booking_json(id, flight_id, "CONFIRMED")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let booking = client
            .create_booking(&BookingRequest {
                flight_id,
                seats: 2,
                user_id: None,
            })
            .await
            .unwrap();

        assert_eq!(booking.id, id);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_ref.as_deref(), Some("ref_123"));
        assert!(booking.is_cancellable());
    }

    #[tokio::test]
    async fn zero_seats_is_rejected_before_sending() {
        let mock_server = MockServer::start().await;
        let client = logged_in_client(&mock_server.uri()).await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let result = client
            .create_booking(&BookingRequest {
                flight_id: Uuid::new_v4(),
                seats: 0,
                user_id: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn seat_conflict_surfaces_as_server_error() {
        let mock_server = MockServer::start().await;
        let client = logged_in_client(&mock_server.uri()).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/booking"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "detail": "Seat availability changed, please try again"
            })))
            .mount(&mock_server)
            .await;

        let result = client
            .create_booking(&BookingRequest {
                flight_id: Uuid::new_v4(),
                seats: 1,
                user_id: Some(Uuid::new_v4()),
            })
            .await;
        assert!(matches!(result, Err(AppError::Server { status: 409, .. })));
    }

    #[tokio::test]
    async fn my_bookings_lists_and_tolerates_unknown_status() {
        let mock_server = MockServer::start().await;
        let client = logged_in_client(&mock_server.uri()).await;
        let flight_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/api/v1/bookings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                booking_json(Uuid::new_v4(), flight_id, "PENDING"),
                booking_json(Uuid::new_v4(), flight_id, "REFUNDED"),
            ])))
            .mount(&mock_server)
            .await;

        let bookings = client.my_bookings().await.unwrap();
        assert_eq!(bookings.len(), 2);
        assert_eq!(bookings[0].status, BookingStatus::Pending);
        assert_eq!(bookings[1].status, BookingStatus::Unknown);
        assert!(!bookings[0].is_cancellable());
    }

    #[tokio::test]
    async fn cancel_booking_returns_updated_booking() {
        let mock_server = MockServer::start().await;
        let client = logged_in_client(&mock_server.uri()).await;
        let (id, flight_id) = (Uuid::new_v4(), Uuid::new_v4());

        Mock::given(method("DELETE"))
            .and(path(format!("/api/v1/bookings/{}", id)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(booking_json(id, flight_id, "CANCELLED")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let booking = client.cancel_booking(id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(!booking.is_cancellable());
    }
}
