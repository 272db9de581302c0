use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::slots::MalformedTime;

/// Why a requested slot was refused. Carried inside `SlotUnavailable` so the
/// caller can tell "you picked a bad time" apart from a generic conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotDenied {
    PastDate,
    PastTime,
    Taken,
}

impl std::fmt::Display for SlotDenied {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotDenied::PastDate => write!(f, "past dates cannot be booked"),
            SlotDenied::PastTime => write!(f, "that time has already passed today"),
            SlotDenied::Taken => write!(f, "that slot is already taken, pick another time"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    MalformedTime(#[from] MalformedTime),

    /// A stored working-hours value failed HH:MM parsing. Unlike
    /// `MalformedTime` this is a data-integrity fault, not a client error.
    #[error("stored schedule is corrupt: {0}")]
    CorruptSchedule(String),

    #[error("slot unavailable: {0}")]
    SlotUnavailable(SlotDenied),

    #[error("no doctor is configured, create a doctor first")]
    NoProviderConfigured,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedTime(_) => StatusCode::BAD_REQUEST,
            AppError::CorruptSchedule(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::SlotUnavailable(_) => StatusCode::CONFLICT,
            AppError::NoProviderConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
