use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slots::SLOT_MINUTES;
use crate::models::{Booking, BookingStatus, User, UserRole};
use crate::services::availability;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub phone_number: String,
    pub client_name: Option<String>,
    pub doctor_id: Option<String>,
    /// Set when the caller (e.g. the chat bot) already resolved the client.
    pub client_id: Option<String>,
    pub date: String,
    pub time: String,
    pub comment: Option<String>,
}

pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Resolve the doctor the booking targets. An explicit id must exist and
/// actually carry the DOCTOR role; anything else falls back to the default
/// doctor (earliest-created DOCTOR).
fn resolve_doctor(
    conn: &rusqlite::Connection,
    requested_id: Option<&str>,
) -> Result<User, AppError> {
    if let Some(id) = requested_id {
        match queries::get_user(conn, id)? {
            Some(user) if user.role == UserRole::Doctor => return Ok(user),
            Some(user) => {
                tracing::warn!(doctor_id = id, role = user.role.as_str(), "requested doctor has wrong role, using default");
            }
            None => {
                tracing::warn!(doctor_id = id, "requested doctor not found, using default");
            }
        }
    }

    queries::find_default_doctor(conn)?.ok_or(AppError::NoProviderConfigured)
}

/// Find or create the client record. Explicit ids must exist; phone lookups
/// create a CLIENT on miss, retrying the lookup if a concurrent request wins
/// the unique-phone race. Drifted name/phone values are updated in place.
fn resolve_client(
    conn: &rusqlite::Connection,
    req: &CreateBookingRequest,
) -> Result<User, AppError> {
    if let Some(client_id) = req.client_id.as_deref() {
        let mut client = queries::get_user(conn, client_id)?
            .ok_or_else(|| AppError::NotFound(format!("client {client_id}")))?;

        let new_name = req
            .client_name
            .as_deref()
            .filter(|name| Some(*name) != client.name.as_deref());
        let new_phone = Some(req.phone_number.as_str())
            .filter(|p| !p.trim().is_empty() && Some(*p) != client.phone_number.as_deref());

        if new_name.is_some() || new_phone.is_some() {
            queries::update_user_contact(conn, &client.id, new_name, new_phone)?;
            if let Some(name) = new_name {
                client.name = Some(name.to_string());
            }
            if let Some(phone) = new_phone {
                client.phone_number = Some(phone.to_string());
            }
        }
        return Ok(client);
    }

    let phone = req.phone_number.trim();
    if phone.is_empty() {
        return Err(AppError::InvalidInput("phone_number is required".into()));
    }

    if let Some(mut client) = queries::find_user_by_phone(conn, phone)? {
        let new_name = req
            .client_name
            .as_deref()
            .filter(|name| Some(*name) != client.name.as_deref());
        if let Some(name) = new_name {
            queries::update_user_contact(conn, &client.id, Some(name), None)?;
            client.name = Some(name.to_string());
        }
        return Ok(client);
    }

    let client = User {
        id: Uuid::new_v4().to_string(),
        name: req.client_name.clone(),
        phone_number: Some(phone.to_string()),
        tg_id: None,
        role: UserRole::Client,
        working: false,
        work_start_time: None,
        work_end_time: None,
        created_at: Utc::now().naive_utc(),
    };

    match queries::create_user(conn, &client) {
        Ok(()) => Ok(client),
        // Another request created the same phone first; use its record.
        Err(e) if queries::is_unique_violation(&e) => queries::find_user_by_phone(conn, phone)?
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("client vanished after unique-phone conflict"))
            }),
        Err(e) => Err(e.into()),
    }
}

/// Create a PENDING booking: resolve doctor and client, verify the slot,
/// insert, then notify the client best-effort. The availability check and
/// the insert run under one connection guard, and the active-slot unique
/// index backstops exact-duplicate races, so of two concurrent requests for
/// the same slot at most one succeeds.
pub async fn create_booking(
    state: &Arc<AppState>,
    req: CreateBookingRequest,
) -> Result<Booking, AppError> {
    let now = local_now();

    let booking = {
        let conn = state.db.lock().unwrap();

        let doctor = resolve_doctor(&conn, req.doctor_id.as_deref())?;

        if !availability::is_slot_free(&conn, &doctor, &req.date, &req.time, SLOT_MINUTES, &now)? {
            let reason = availability::denial_reason(&req.date, &req.time, &now);
            return Err(AppError::SlotUnavailable(reason));
        }

        let client = resolve_client(&conn, &req)?;

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            client_id: Some(client.id.clone()),
            doctor_id: Some(doctor.id.clone()),
            date: req.date.clone(),
            time: req.time.clone(),
            status: BookingStatus::Pending,
            comment: req.comment.clone(),
            notification_sent: false,
            created_at: Utc::now().naive_utc(),
            client: None,
            doctor: None,
        };

        if let Err(e) = queries::insert_booking(&conn, &booking) {
            if queries::is_unique_violation(&e) {
                // Lost a race on the exact same slot.
                return Err(AppError::SlotUnavailable(crate::errors::SlotDenied::Taken));
            }
            return Err(e.into());
        }

        tracing::info!(
            booking_id = %booking.id,
            doctor_id = %doctor.id,
            date = %booking.date,
            time = %booking.time,
            "booking created"
        );

        queries::find_booking(&conn, &booking.id)?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("booking vanished after insert")))?
    };

    notify_booking_created(state, &booking).await;

    Ok(booking)
}

/// Update a booking's status and notify the client when it actually changed.
/// Re-applying the current status succeeds without sending anything.
pub async fn update_booking_status(
    state: &Arc<AppState>,
    id: &str,
    status: BookingStatus,
) -> Result<Booking, AppError> {
    let (old_status, booking) = {
        let conn = state.db.lock().unwrap();

        let existing = queries::find_booking(&conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

        queries::update_booking_status(&conn, id, status)?;

        let updated = queries::find_booking(&conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        (existing.status, updated)
    };

    if old_status != status {
        notify_status_changed(state, &booking, old_status).await;
    }

    Ok(booking)
}

pub fn delete_booking(state: &Arc<AppState>, id: &str) -> Result<(), AppError> {
    let conn = state.db.lock().unwrap();
    if !queries::delete_booking(&conn, id)? {
        return Err(AppError::NotFound(format!("booking {id}")));
    }
    Ok(())
}

fn doctor_display_name(booking: &Booking) -> &str {
    booking
        .doctor
        .as_ref()
        .and_then(|d| d.name.as_deref())
        .unwrap_or("the doctor")
}

/// Best-effort "booking created" message. Failures are logged and swallowed;
/// they never affect the booking outcome.
async fn notify_booking_created(state: &Arc<AppState>, booking: &Booking) {
    let Some(chat_id) = booking.client.as_ref().and_then(|c| c.tg_id.clone()) else {
        return;
    };

    let text = format!(
        "Your booking for {} at {} with {} was created and is awaiting approval.",
        booking.date,
        booking.time,
        doctor_display_name(booking),
    );

    match state.notifier.send_message(&chat_id, &text).await {
        Ok(()) => {
            let conn = state.db.lock().unwrap();
            if let Err(e) = queries::mark_notification_sent(&conn, &booking.id) {
                tracing::warn!(booking_id = %booking.id, error = %e, "failed to record notification flag");
            }
        }
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, error = %e, "failed to send booking notification");
        }
    }
}

async fn notify_status_changed(state: &Arc<AppState>, booking: &Booking, old_status: BookingStatus) {
    let Some(chat_id) = booking.client.as_ref().and_then(|c| c.tg_id.clone()) else {
        return;
    };

    let text = format!(
        "Your booking for {} at {} with {} changed from {} to {}.",
        booking.date,
        booking.time,
        doctor_display_name(booking),
        old_status.as_str(),
        booking.status.as_str(),
    );

    if let Err(e) = state.notifier.send_message(&chat_id, &text).await {
        tracing::warn!(booking_id = %booking.id, error = %e, "failed to send status notification");
    }
}
