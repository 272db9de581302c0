use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;

use crate::services::bot;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

// POST /webhook/telegram
//
// Always answers 200 once the secret checks out; Telegram re-delivers
// updates on any other status, which would replay messages into the bot.
pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<TelegramUpdate>,
) -> StatusCode {
    let secret = &state.config.telegram_webhook_secret;
    if !secret.is_empty() {
        let supplied = headers
            .get("x-telegram-bot-api-secret-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if supplied != secret {
            tracing::warn!("telegram webhook called with bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let Some(message) = update.message else {
        return StatusCode::OK;
    };
    let Some(text) = message.text else {
        return StatusCode::OK;
    };
    let chat_id = message.chat.id.to_string();

    let reply = match bot::process_message(&state, &chat_id, &text).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::error!(chat_id = %chat_id, error = %e, "bot failed to process message");
            "Sorry, something went wrong on our side. Please try again.".to_string()
        }
    };

    if let Err(e) = state.notifier.send_message(&chat_id, &reply).await {
        tracing::warn!(chat_id = %chat_id, error = %e, "failed to send bot reply");
    }

    StatusCode::OK
}
