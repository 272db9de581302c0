use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use super::check_auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus};
use crate::services::availability::{self, DaySlots};
use crate::services::booking::{self, CreateBookingRequest};
use crate::services::statistics::{self, StatisticsReport};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = booking::create_booking(&state, body).await?;
    Ok(Json(booking))
}

// GET /api/bookings
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::all_bookings(&db)?))
}

// GET /api/bookings/pending
pub async fn list_pending(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::pending_bookings(&db)?))
}

// GET /api/bookings/doctor/:id
pub async fn list_by_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::bookings_by_doctor(&db, &id)?))
}

// GET /api/bookings/client/:id
pub async fn list_by_client(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::bookings_by_client(&db, &id)?))
}

// GET /api/bookings/available-slots?date=YYYY-MM-DD&doctor_id=...
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: String,
    pub doctor_id: Option<String>,
}

pub async fn available_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<DaySlots>, AppError> {
    let now = booking::local_now();

    let db = state.db.lock().unwrap();

    let doctor = match query.doctor_id.as_deref() {
        Some(id) => match queries::get_user(&db, id)? {
            Some(user) if user.role == crate::models::UserRole::Doctor => Some(user),
            _ => None,
        },
        None => None,
    };
    let doctor = match doctor {
        Some(doctor) => doctor,
        None => queries::find_default_doctor(&db)?.ok_or(AppError::NoProviderConfigured)?,
    };

    let day = availability::available_slots(&db, &doctor, &query.date, &now)?;
    Ok(Json(day))
}

// PATCH /api/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown status {:?}", body.status)))?;

    let booking = booking::update_booking_status(&state, &id, status).await?;
    Ok(Json(booking))
}

// DELETE /api/bookings/:id
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    booking::delete_booking(&state, &id)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /api/bookings/statistics?start_date=...&end_date=...
#[derive(Deserialize)]
pub struct StatisticsQuery {
    pub start_date: String,
    pub end_date: String,
}

pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<StatisticsReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    for date in [&query.start_date, &query.end_date] {
        if chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(AppError::InvalidInput(format!(
                "malformed date {date:?}, expected YYYY-MM-DD"
            )));
        }
    }

    let db = state.db.lock().unwrap();
    let report = statistics::statistics(
        &db,
        &query.start_date,
        &query.end_date,
        state.config.fixed_service_price,
    )?;
    Ok(Json(report))
}
