use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Where a chat conversation currently is in the booking dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    AwaitingName,
    AwaitingPhone,
    ChoosingDate,
    ChoosingTime,
    Confirming,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingName => "awaiting_name",
            SessionState::AwaitingPhone => "awaiting_phone",
            SessionState::ChoosingDate => "choosing_date",
            SessionState::ChoosingTime => "choosing_time",
            SessionState::Confirming => "confirming",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_name" => SessionState::AwaitingName,
            "awaiting_phone" => SessionState::AwaitingPhone,
            "choosing_date" => SessionState::ChoosingDate,
            "choosing_time" => SessionState::ChoosingTime,
            "confirming" => SessionState::Confirming,
            _ => SessionState::Idle,
        }
    }
}

/// Booking details collected so far in the dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

/// One conversation, keyed by the external chat id and persisted with a
/// short TTL so it survives restarts.
#[derive(Debug, Clone)]
pub struct BotSession {
    pub chat_id: String,
    pub state: SessionState,
    pub data: SessionData,
    pub last_activity: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}
