//! Flight search, airports, and admin flight management.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::api::client::{redact_id, ApiClient};
use crate::error::AppError;

/// A flight as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub source: String,
    pub destination: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub departure_ts: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub arrival_ts: DateTime<Utc>,
    pub total_seats: u32,
    pub available_seats: u32,
    pub price: f64,
}

/// Reads an RFC 3339 timestamp, or an offset-free one as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
}

/// Flight fields an admin supplies; the server assigns `id` and starts
/// `available_seats` at `total_seats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub source: String,
    pub destination: String,
    pub departure_ts: NaiveDateTime,
    pub arrival_ts: NaiveDateTime,
    pub total_seats: u32,
    pub price: f64,
}

impl NewFlight {
    /// Checks the fields the server would otherwise reject.
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [
            ("flight_number", &self.flight_number),
            ("source", &self.source),
            ("destination", &self.destination),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} must not be empty", name)));
            }
        }
        if self.arrival_ts <= self.departure_ts {
            return Err(AppError::Validation(
                "arrival_ts must be after departure_ts".into(),
            ));
        }
        if self.total_seats == 0 {
            return Err(AppError::Validation("total_seats must be at least 1".into()));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(AppError::Validation("price must be a non-negative number".into()));
        }
        Ok(())
    }
}

impl ApiClient {
    /// Searches flights from `source` to `destination` on `date`.
    pub async fn search_flights(
        &self,
        source: &str,
        destination: &str,
        date: NaiveDate,
    ) -> Result<Vec<Flight>, AppError> {
        let date = date.format("%Y-%m-%d").to_string();
        let query = [
            ("source", source),
            ("destination", destination),
            ("date", date.as_str()),
        ];
        let prepared = self
            .request(Method::GET, "/api/v1/search")
            .await?
            .with(|b| b.query(&query));

        self.send_json(prepared).await
    }

    /// Lists known airport codes.
    pub async fn list_airports(&self) -> Result<Vec<String>, AppError> {
        let prepared = self.request(Method::GET, "/api/v1/airports").await?;
        self.send_json(prepared).await
    }

    /// Creates a single flight (admin).
    pub async fn create_flight(&self, flight: &NewFlight) -> Result<Flight, AppError> {
        flight.validate()?;
        let prepared = self
            .request(Method::POST, "/admin/flights")
            .await?
            .with(|b| b.json(flight));

        let created: Flight = self.send_json(prepared).await?;
        info!("[ADMIN] Created flight {}", redact_id(&created.id.to_string()));
        Ok(created)
    }

    /// Fetches one flight by id (admin).
    pub async fn get_flight(&self, id: Uuid) -> Result<Flight, AppError> {
        let prepared = self
            .request(Method::GET, &format!("/admin/flights/{}", id))
            .await?;
        self.send_json(prepared).await
    }

    /// Replaces a flight's fields (admin). The server resets
    /// `available_seats` to the new `total_seats`.
    pub async fn update_flight(&self, id: Uuid, flight: &NewFlight) -> Result<Flight, AppError> {
        flight.validate()?;
        let prepared = self
            .request(Method::PUT, &format!("/admin/flights/{}", id))
            .await?
            .with(|b| b.json(flight));

        let updated: Flight = self.send_json(prepared).await?;
        info!("[ADMIN] Updated flight {}", redact_id(&id.to_string()));
        Ok(updated)
    }

    /// Deletes a flight (admin), returning the removed record.
    pub async fn delete_flight(&self, id: Uuid) -> Result<Flight, AppError> {
        let prepared = self
            .request(Method::DELETE, &format!("/admin/flights/{}", id))
            .await?;

        let deleted: Flight = self.send_json(prepared).await?;
        info!("[ADMIN] Deleted flight {}", redact_id(&id.to_string()));
        Ok(deleted)
    }
}
