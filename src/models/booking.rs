use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::user::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "APPROVED" => Some(BookingStatus::Approved),
            "REJECTED" => Some(BookingStatus::Rejected),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub client_id: Option<String>,
    pub doctor_id: Option<String>,
    /// Calendar date, zero-padded ISO "YYYY-MM-DD".
    pub date: String,
    /// Slot start, "HH:MM". Duration is fixed system-wide.
    pub time: String,
    pub status: BookingStatus,
    pub comment: Option<String>,
    pub notification_sent: bool,
    pub created_at: NaiveDateTime,
    pub client: Option<UserSummary>,
    pub doctor: Option<UserSummary>,
}
