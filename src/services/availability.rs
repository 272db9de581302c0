use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::{AppError, SlotDenied};
use crate::models::slots::{self, SLOT_MINUTES};
use crate::models::User;

pub const DEFAULT_WORK_START: &str = "09:00";
pub const DEFAULT_WORK_END: &str = "18:00";

fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("malformed date {date:?}, expected YYYY-MM-DD")))
}

fn minutes_of(now: &NaiveDateTime) -> i32 {
    (now.hour() * 60 + now.minute()) as i32
}

/// The doctor's working window in minutes since midnight, defaulting to
/// 09:00-18:00 when no explicit hours are stored. Stored-but-unparseable
/// hours are a data fault, not a client error.
fn working_window(doctor: &User) -> Result<(i32, i32), AppError> {
    let start = doctor.work_start_time.as_deref().unwrap_or(DEFAULT_WORK_START);
    let end = doctor.work_end_time.as_deref().unwrap_or(DEFAULT_WORK_END);

    let start_min = slots::to_minutes(start)
        .map_err(|e| AppError::CorruptSchedule(format!("doctor {}: {e}", doctor.id)))?;
    let end_min = slots::to_minutes(end)
        .map_err(|e| AppError::CorruptSchedule(format!("doctor {}: {e}", doctor.id)))?;
    Ok((start_min, end_min))
}

/// Decide whether `[time, time+duration)` on `date` can still be booked for
/// this doctor. Checks run in order and the first failure wins: past date,
/// past time today, working hours, overlap with an active booking.
///
/// Structural problems with the input raise an error instead of returning
/// `false`; a slot starting at the current minute counts as already past
/// (no grace window).
pub fn is_slot_free(
    conn: &Connection,
    doctor: &User,
    date: &str,
    time: &str,
    duration_minutes: i32,
    now: &NaiveDateTime,
) -> Result<bool, AppError> {
    if doctor.id.trim().is_empty() {
        return Err(AppError::InvalidInput("doctor id must not be blank".into()));
    }
    if date.trim().is_empty() || time.trim().is_empty() {
        return Err(AppError::InvalidInput("date and time are required".into()));
    }

    let day = parse_date(date)?;
    let start = slots::to_minutes(time)?;
    let end = start + duration_minutes;

    let today = now.date();
    if day < today {
        return Ok(false);
    }
    if day == today && start <= minutes_of(now) {
        return Ok(false);
    }

    let (work_start, work_end) = working_window(doctor)?;
    if start < work_start || end > work_end {
        return Ok(false);
    }

    let active = queries::active_bookings_for_day(conn, &doctor.id, date)?;
    for booking in &active {
        // A malformed stored time should not abort the whole check.
        let booked_start = match slots::to_minutes(&booking.time) {
            Ok(minutes) => minutes,
            Err(_) => {
                tracing::warn!(booking_id = %booking.id, time = %booking.time, "skipping booking with malformed stored time");
                continue;
            }
        };
        if slots::overlaps(start, duration_minutes, booked_start, SLOT_MINUTES) {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Re-derive the specific refusal cause for the error message. Mirrors the
/// past-date/past-time checks of `is_slot_free`; anything else is reported
/// as a plain conflict.
pub fn denial_reason(date: &str, time: &str, now: &NaiveDateTime) -> SlotDenied {
    let day = match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => day,
        Err(_) => return SlotDenied::Taken,
    };

    if day < now.date() {
        return SlotDenied::PastDate;
    }
    if day == now.date() {
        if let Ok(start) = slots::to_minutes(time) {
            if start <= minutes_of(now) {
                return SlotDenied::PastTime;
            }
        }
    }
    SlotDenied::Taken
}

#[derive(Debug, Serialize)]
pub struct DaySlots {
    pub date: String,
    pub doctor_id: String,
    pub doctor_name: Option<String>,
    pub work_start_time: String,
    pub work_end_time: String,
    pub available_slots: Vec<String>,
    pub booked_slots: Vec<String>,
}

/// All free slot start times for one doctor and day. Batched form of the
/// single-slot check: the day's active bookings are loaded once and the
/// whole grid is filtered against them.
pub fn available_slots(
    conn: &Connection,
    doctor: &User,
    date: &str,
    now: &NaiveDateTime,
) -> Result<DaySlots, AppError> {
    let day = parse_date(date)?;

    let work_start = doctor
        .work_start_time
        .clone()
        .unwrap_or_else(|| DEFAULT_WORK_START.to_string());
    let work_end = doctor
        .work_end_time
        .clone()
        .unwrap_or_else(|| DEFAULT_WORK_END.to_string());

    let grid = slots::slot_grid(&work_start, &work_end, SLOT_MINUTES)
        .map_err(|e| AppError::CorruptSchedule(format!("doctor {}: {e}", doctor.id)))?;

    let active = queries::active_bookings_for_day(conn, &doctor.id, date)?;
    let booked: Vec<i32> = active
        .iter()
        .filter_map(|b| slots::to_minutes(&b.time).ok())
        .collect();

    let cutoff = if day == now.date() {
        Some(minutes_of(now))
    } else if day < now.date() {
        // Whole day is gone.
        Some(i32::MAX)
    } else {
        None
    };

    let mut available = Vec::new();
    for slot in grid {
        // Grid entries are rendered by from_minutes, so this cannot fail.
        let Ok(start) = slots::to_minutes(&slot) else {
            continue;
        };
        let past = cutoff.is_some_and(|cutoff| start <= cutoff);
        let taken = booked
            .iter()
            .any(|&b| slots::overlaps(start, SLOT_MINUTES, b, SLOT_MINUTES));
        if !past && !taken {
            available.push(slot);
        }
    }

    Ok(DaySlots {
        date: date.to_string(),
        doctor_id: doctor.id.clone(),
        doctor_name: doctor.name.clone(),
        work_start_time: work_start,
        work_end_time: work_end,
        available_slots: available,
        booked_slots: active.into_iter().map(|b| b.time).collect(),
    })
}
