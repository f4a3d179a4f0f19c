//! Appointment booking payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A slot was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreated {
    pub booking_id: String,
    pub customer_id: String,
    pub service_id: String,
    pub staff_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// The provider accepted the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmed {
    pub booking_id: String,
    pub customer_id: String,
    pub starts_at: DateTime<Utc>,
}

/// Who cancelled a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Customer,
    Staff,
    System,
}

/// The booking will not take place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelled {
    pub booking_id: String,
    pub customer_id: String,
    pub cancelled_by: CancelledBy,
    pub reason: Option<String>,
}

/// The booking moved to a new slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRescheduled {
    pub booking_id: String,
    pub customer_id: String,
    pub previous_starts_at: DateTime<Utc>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// A reminder should go out for an upcoming appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentReminderDue {
    pub booking_id: String,
    pub customer_id: String,
    pub starts_at: DateTime<Utc>,
    pub minutes_before: u32,
}
