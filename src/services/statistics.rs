use std::collections::HashMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::slots::SLOT_MINUTES;
use crate::models::BookingStatus;

#[derive(Debug, Serialize)]
pub struct StatisticsReport {
    pub period: Period,
    pub summary: Summary,
    pub doctor_statistics: Vec<DoctorStatistics>,
}

#[derive(Debug, Serialize)]
pub struct Period {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total_revenue: f64,
    pub total_bookings: usize,
    pub bookings_by_status: StatusCounts,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub completed: usize,
}

#[derive(Debug, Serialize)]
pub struct DoctorStatistics {
    pub doctor: DoctorSummary,
    pub bookings: Vec<BookingWithService>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub id: String,
    pub name: String,
}

/// Synthetic flat-rate service descriptor attached to each booking for
/// display compatibility; no per-booking price is stored.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDescriptor {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub duration: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingWithService {
    pub id: String,
    pub date: String,
    pub time: String,
    pub status: BookingStatus,
    pub service: ServiceDescriptor,
}

fn flat_service(unit_price: f64) -> ServiceDescriptor {
    ServiceDescriptor {
        id: 0,
        name: format!("{SLOT_MINUTES}-minute service"),
        price: unit_price,
        duration: SLOT_MINUTES,
    }
}

/// Read-only rollup over bookings with `date` in `[start_date, end_date]`:
/// counts per status, revenue from completed bookings at the flat unit
/// price, and a per-doctor breakdown.
pub fn statistics(
    conn: &Connection,
    start_date: &str,
    end_date: &str,
    unit_price: f64,
) -> Result<StatisticsReport, AppError> {
    let bookings = queries::bookings_in_date_range(conn, start_date, end_date)?;

    let mut counts = StatusCounts::default();
    for booking in &bookings {
        match booking.status {
            BookingStatus::Pending => counts.pending += 1,
            BookingStatus::Approved => counts.approved += 1,
            BookingStatus::Rejected => counts.rejected += 1,
            BookingStatus::Cancelled => counts.cancelled += 1,
            BookingStatus::Completed => counts.completed += 1,
        }
    }

    let total_revenue = counts.completed as f64 * unit_price;
    let total_bookings = bookings.len();

    // Group by doctor, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut by_doctor: HashMap<String, DoctorStatistics> = HashMap::new();
    for booking in &bookings {
        let Some(doctor_id) = booking.doctor_id.clone() else {
            continue;
        };

        let entry = by_doctor.entry(doctor_id.clone()).or_insert_with(|| {
            order.push(doctor_id.clone());
            DoctorStatistics {
                doctor: DoctorSummary {
                    id: doctor_id,
                    name: booking
                        .doctor
                        .as_ref()
                        .and_then(|d| d.name.clone())
                        .unwrap_or_else(|| "N/A".to_string()),
                },
                bookings: Vec::new(),
            }
        });

        entry.bookings.push(BookingWithService {
            id: booking.id.clone(),
            date: booking.date.clone(),
            time: booking.time.clone(),
            status: booking.status,
            service: flat_service(unit_price),
        });
    }

    let doctor_statistics = order
        .into_iter()
        .filter_map(|id| by_doctor.remove(&id))
        .collect();

    Ok(StatisticsReport {
        period: Period {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
        },
        summary: Summary {
            total_revenue,
            total_bookings,
            bookings_by_status: counts,
        },
        doctor_statistics,
    })
}
