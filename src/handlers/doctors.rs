use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::check_auth;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::slots;
use crate::models::{User, UserRole};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateDoctorRequest {
    pub name: String,
    pub phone_number: Option<String>,
    pub work_start_time: Option<String>,
    pub work_end_time: Option<String>,
    #[serde(default = "default_working")]
    pub working: bool,
}

fn default_working() -> bool {
    true
}

// POST /api/doctors
pub async fn create_doctor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateDoctorRequest>,
) -> Result<Json<User>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name must not be blank".into()));
    }

    // Working hours must parse up front, never at booking time.
    for hours in [&body.work_start_time, &body.work_end_time] {
        if let Some(hhmm) = hours {
            slots::to_minutes(hhmm)?;
        }
    }

    let doctor = User {
        id: Uuid::new_v4().to_string(),
        name: Some(body.name.trim().to_string()),
        phone_number: body.phone_number,
        tg_id: None,
        role: UserRole::Doctor,
        working: body.working,
        work_start_time: body.work_start_time,
        work_end_time: body.work_end_time,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::create_user(&db, &doctor).map_err(|e| {
            if queries::is_unique_violation(&e) {
                AppError::InvalidInput("a user with that phone number already exists".into())
            } else {
                e.into()
            }
        })?;
    }

    tracing::info!(doctor_id = %doctor.id, "doctor created");
    Ok(Json(doctor))
}

// GET /api/doctors
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, AppError> {
    let db = state.db.lock().unwrap();
    Ok(Json(queries::list_doctors(&db)?))
}
