use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Doctor,
    Client,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::SuperAdmin => "SUPER_ADMIN",
            UserRole::Admin => "ADMIN",
            UserRole::Doctor => "DOCTOR",
            UserRole::Client => "CLIENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "SUPER_ADMIN" => Some(UserRole::SuperAdmin),
            "ADMIN" => Some(UserRole::Admin),
            "DOCTOR" => Some(UserRole::Doctor),
            "CLIENT" => Some(UserRole::Client),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub tg_id: Option<String>,
    pub role: UserRole,
    pub working: bool,
    pub work_start_time: Option<String>,
    pub work_end_time: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Denormalized user fields attached to booking read projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub tg_id: Option<String>,
}
