use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BotSession, SessionData, SessionState, User, UserRole};
use crate::services::availability;
use crate::services::booking::{self, CreateBookingRequest};
use crate::state::AppState;

const SESSION_TTL_MINUTES: i64 = 30;

const HELP_TEXT: &str =
    "Send /book to book an appointment, or /cancel to abandon the current one.";

/// Drive the booking dialogue one message forward and return the reply.
/// Session state lives in the database, so the dialogue survives restarts.
pub async fn process_message(
    state: &Arc<AppState>,
    chat_id: &str,
    text: &str,
) -> Result<String, AppError> {
    let text = text.trim();

    let mut session = {
        let conn = state.db.lock().unwrap();
        queries::expire_old_sessions(&conn)?;
        queries::get_session(&conn, chat_id)?
    }
    .unwrap_or_else(|| new_session(chat_id));

    let reply = match text {
        "/cancel" => {
            session.state = SessionState::Idle;
            session.data = SessionData::default();
            "Okay, I dropped that booking. Send /book to start again.".to_string()
        }
        "/start" => {
            session.state = SessionState::Idle;
            session.data = SessionData::default();
            format!("Welcome! {HELP_TEXT}")
        }
        "/book" => start_booking(state, &mut session)?,
        _ => advance(state, &mut session, text).await?,
    };

    let now = Utc::now().naive_utc();
    session.last_activity = now;
    session.expires_at = now + Duration::minutes(SESSION_TTL_MINUTES);

    {
        let conn = state.db.lock().unwrap();
        queries::save_session(&conn, &session)?;
    }

    Ok(reply)
}

fn new_session(chat_id: &str) -> BotSession {
    let now = Utc::now().naive_utc();
    BotSession {
        chat_id: chat_id.to_string(),
        state: SessionState::Idle,
        data: SessionData::default(),
        last_activity: now,
        expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
    }
}

/// Entry point of the dialogue. Known clients skip straight to choosing a
/// date; everyone else gets asked for their name first.
fn start_booking(state: &Arc<AppState>, session: &mut BotSession) -> Result<String, AppError> {
    let known = {
        let conn = state.db.lock().unwrap();
        queries::find_user_by_tg_id(&conn, &session.chat_id)?
    };

    if let Some(user) = known {
        if user.name.is_some() && user.phone_number.is_some() {
            session.data.name = user.name;
            session.data.phone_number = user.phone_number;
            session.state = SessionState::ChoosingDate;
            return Ok(format!(
                "Welcome back, {}! Which date would you like? (YYYY-MM-DD)",
                session.data.name.as_deref().unwrap_or("friend")
            ));
        }
    }

    session.data = SessionData::default();
    session.state = SessionState::AwaitingName;
    Ok("Let's book an appointment. What's your name?".to_string())
}

async fn advance(
    state: &Arc<AppState>,
    session: &mut BotSession,
    text: &str,
) -> Result<String, AppError> {
    match session.state {
        SessionState::Idle => Ok(HELP_TEXT.to_string()),

        SessionState::AwaitingName => {
            if text.is_empty() {
                return Ok("I didn't catch that. What's your name?".to_string());
            }
            session.data.name = Some(text.to_string());
            session.state = SessionState::AwaitingPhone;
            Ok(format!("Thanks, {text}! What's your phone number?"))
        }

        SessionState::AwaitingPhone => {
            if !looks_like_phone(text) {
                return Ok("That doesn't look like a phone number. Try again, e.g. +998901234567.".to_string());
            }
            session.data.phone_number = Some(text.to_string());
            session.state = SessionState::ChoosingDate;
            Ok("Which date would you like? (YYYY-MM-DD)".to_string())
        }

        SessionState::ChoosingDate => {
            let now = booking::local_now();
            let day = {
                let conn = state.db.lock().unwrap();
                let doctor =
                    queries::find_default_doctor(&conn)?.ok_or(AppError::NoProviderConfigured)?;
                availability::available_slots(&conn, &doctor, text, &now)
            };

            let day = match day {
                Ok(day) => day,
                Err(AppError::InvalidInput(_)) => {
                    return Ok("Please send the date as YYYY-MM-DD, e.g. 2030-05-01.".to_string())
                }
                Err(e) => return Err(e),
            };

            if day.available_slots.is_empty() {
                return Ok(format!(
                    "No free slots on {}. Try another date.",
                    day.date
                ));
            }

            session.data.date = Some(day.date.clone());
            session.state = SessionState::ChoosingTime;
            Ok(format!(
                "Free slots on {}: {}. Which time works for you?",
                day.date,
                day.available_slots.join(", ")
            ))
        }

        SessionState::ChoosingTime => {
            if crate::models::slots::to_minutes(text).is_err() {
                return Ok("Please send the time as HH:MM, e.g. 09:30.".to_string());
            }
            session.data.time = Some(text.to_string());
            session.state = SessionState::Confirming;
            Ok(format!(
                "Book {} at {} for {}? (yes/no)",
                session.data.date.as_deref().unwrap_or("?"),
                text,
                session.data.name.as_deref().unwrap_or("you"),
            ))
        }

        SessionState::Confirming => match text.to_lowercase().as_str() {
            "yes" | "y" => confirm_booking(state, session).await,
            "no" | "n" => {
                session.data.date = None;
                session.data.time = None;
                session.state = SessionState::ChoosingDate;
                Ok("No problem. Which date would you like instead? (YYYY-MM-DD)".to_string())
            }
            _ => Ok("Please answer yes or no.".to_string()),
        },
    }
}

async fn confirm_booking(
    state: &Arc<AppState>,
    session: &mut BotSession,
) -> Result<String, AppError> {
    let (Some(date), Some(time)) = (session.data.date.clone(), session.data.time.clone()) else {
        session.state = SessionState::Idle;
        return Ok("Something went wrong, let's start over. Send /book.".to_string());
    };

    let client_id = {
        let conn = state.db.lock().unwrap();
        resolve_chat_client(&conn, session)?
    };

    let request = CreateBookingRequest {
        phone_number: session.data.phone_number.clone().unwrap_or_default(),
        client_name: session.data.name.clone(),
        doctor_id: None,
        client_id: Some(client_id),
        date,
        time,
        comment: None,
    };

    match booking::create_booking(state, request).await {
        Ok(created) => {
            session.state = SessionState::Idle;
            session.data = SessionData::default();
            Ok(format!(
                "Done! Your appointment on {} at {} is awaiting approval.",
                created.date, created.time
            ))
        }
        Err(AppError::SlotUnavailable(reason)) => {
            session.data.time = None;
            session.state = SessionState::ChoosingTime;
            Ok(format!("Sorry, {reason}. Pick another time."))
        }
        Err(e) => Err(e),
    }
}

/// Find or create the client record behind this chat. The chat id is the
/// stable key; a phone collision means the person already exists, so the
/// chat id is attached to that record instead.
fn resolve_chat_client(
    conn: &rusqlite::Connection,
    session: &BotSession,
) -> Result<String, AppError> {
    if let Some(user) = queries::find_user_by_tg_id(conn, &session.chat_id)? {
        return Ok(user.id);
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: session.data.name.clone(),
        phone_number: session.data.phone_number.clone(),
        tg_id: Some(session.chat_id.clone()),
        role: UserRole::Client,
        working: false,
        work_start_time: None,
        work_end_time: None,
        created_at: Utc::now().naive_utc(),
    };

    match queries::create_user(conn, &user) {
        Ok(()) => Ok(user.id),
        Err(e) if queries::is_unique_violation(&e) => {
            let phone = session.data.phone_number.as_deref().unwrap_or_default();
            let existing = queries::find_user_by_phone(conn, phone)?.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("client vanished after unique conflict"))
            })?;
            queries::attach_tg_id(conn, &existing.id, &session.chat_id)?;
            Ok(existing.id)
        }
        Err(e) => Err(e.into()),
    }
}

fn looks_like_phone(s: &str) -> bool {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    digits >= 7 && s.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c))
}
