//! HTTP access to the flight API.
//!
//! - **Bearer injection**: every request consults the shared [`Session`](crate::session::Session)
//! - **Safe logging**: URLs are sanitized, bodies and tokens are never logged
//! - **Typed endpoints**: flights, airports, bookings and auth live in their
//!   own modules as `impl ApiClient` blocks

pub mod auth;
pub mod bookings;
pub mod client;
pub mod flights;

pub use auth::RegisteredUser;
pub use bookings::{Booking, BookingRequest, BookingStatus};
pub use client::{sanitize_url_for_logs, ApiClient, LoggingMode};
pub use flights::{Flight, NewFlight};
