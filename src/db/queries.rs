use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, BotSession, SessionData, SessionState, User, UserRole, UserSummary};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// True when an INSERT hit a UNIQUE index (phone, tg_id or active slot).
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn now_string() -> String {
    Utc::now().naive_utc().format(DATETIME_FMT).to_string()
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO users (id, name, phone_number, tg_id, role, working, work_start_time, work_end_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            user.id,
            user.name,
            user.phone_number,
            user.tg_id,
            user.role.as_str(),
            user.working as i32,
            user.work_start_time,
            user.work_end_time,
            user.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> Result<User, AppError> {
    let role_str: String = row.get(4)?;
    let role = UserRole::parse(&role_str)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown stored role: {role_str}")))?;
    let created_at_str: String = row.get(8)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        tg_id: row.get(3)?,
        role,
        working: row.get::<_, i32>(5)? != 0,
        work_start_time: row.get(6)?,
        work_end_time: row.get(7)?,
        created_at,
    })
}

const USER_COLUMNS: &str =
    "id, name, phone_number, tg_id, role, working, work_start_time, work_end_time, created_at";

fn user_by(conn: &Connection, sql: &str, param: &str) -> Result<Option<User>, AppError> {
    let result = conn.query_row(sql, params![param], |row| Ok(parse_user_row(row)));
    match result {
        Ok(user) => Ok(Some(user?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<User>, AppError> {
    user_by(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        id,
    )
}

pub fn find_user_by_phone(conn: &Connection, phone: &str) -> Result<Option<User>, AppError> {
    user_by(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?1"),
        phone,
    )
}

pub fn find_user_by_tg_id(conn: &Connection, tg_id: &str) -> Result<Option<User>, AppError> {
    user_by(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users WHERE tg_id = ?1"),
        tg_id,
    )
}

/// The earliest-created user with the DOCTOR role, used when a booking
/// request names no doctor.
pub fn find_default_doctor(conn: &Connection) -> Result<Option<User>, AppError> {
    user_by(
        conn,
        &format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at ASC, id ASC LIMIT 1"
        ),
        UserRole::Doctor.as_str(),
    )
}

pub fn list_doctors(conn: &Connection) -> Result<Vec<User>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE role = ?1 ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![UserRole::Doctor.as_str()], |row| {
        Ok(parse_user_row(row))
    })?;

    let mut doctors = vec![];
    for row in rows {
        doctors.push(row??);
    }
    Ok(doctors)
}

/// Update only the supplied contact fields, leaving the rest untouched.
pub fn update_user_contact(
    conn: &Connection,
    id: &str,
    name: Option<&str>,
    phone: Option<&str>,
) -> Result<(), AppError> {
    if let Some(name) = name {
        conn.execute("UPDATE users SET name = ?1 WHERE id = ?2", params![name, id])?;
    }
    if let Some(phone) = phone {
        conn.execute(
            "UPDATE users SET phone_number = ?1 WHERE id = ?2",
            params![phone, id],
        )?;
    }
    Ok(())
}

pub fn attach_tg_id(conn: &Connection, id: &str, tg_id: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE users SET tg_id = ?1 WHERE id = ?2",
        params![tg_id, id],
    )?;
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "b.id, b.client_id, b.doctor_id, b.date, b.time, b.status, b.comment, b.notification_sent, b.created_at, \
     c.id, c.name, c.phone_number, c.tg_id, \
     d.id, d.name, d.phone_number, d.tg_id";

const BOOKING_JOINS: &str = "FROM bookings b \
     LEFT JOIN users c ON c.id = b.client_id \
     LEFT JOIN users d ON d.id = b.doctor_id";

fn parse_user_summary(row: &rusqlite::Row, offset: usize) -> Result<Option<UserSummary>, rusqlite::Error> {
    let id: Option<String> = row.get(offset)?;
    Ok(id.map(|id| {
        Ok::<_, rusqlite::Error>(UserSummary {
            id,
            name: row.get(offset + 1)?,
            phone_number: row.get(offset + 2)?,
            tg_id: row.get(offset + 3)?,
        })
    })
    .transpose()?)
}

fn parse_booking_row(row: &rusqlite::Row) -> Result<Booking, AppError> {
    let status_str: String = row.get(5)?;
    let status = BookingStatus::parse(&status_str).ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("unknown stored booking status: {status_str}"))
    })?;
    let created_at_str: String = row.get(8)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DATETIME_FMT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Booking {
        id: row.get(0)?,
        client_id: row.get(1)?,
        doctor_id: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        status,
        comment: row.get(6)?,
        notification_sent: row.get::<_, i32>(7)? != 0,
        created_at,
        client: parse_user_summary(row, 9)?,
        doctor: parse_user_summary(row, 13)?,
    })
}

fn collect_bookings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<Booking>, AppError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO bookings (id, client_id, doctor_id, date, time, status, comment, notification_sent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.client_id,
            booking.doctor_id,
            booking.date,
            booking.time,
            booking.status.as_str(),
            booking.comment,
            booking.notification_sent as i32,
            booking.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn find_booking(conn: &Connection, id: &str) -> Result<Option<Booking>, AppError> {
    let sql = format!("SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} WHERE b.id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));
    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// PENDING/APPROVED bookings for one doctor on one day; these are the only
/// records that occupy slots.
pub fn active_bookings_for_day(
    conn: &Connection,
    doctor_id: &str,
    date: &str,
) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} \
         WHERE b.doctor_id = ?1 AND b.date = ?2 AND b.status IN ('PENDING', 'APPROVED') \
         ORDER BY b.time ASC"
    );
    collect_bookings(conn, &sql, &[&doctor_id, &date])
}

pub fn all_bookings(conn: &Connection) -> Result<Vec<Booking>, AppError> {
    let sql = format!("SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} ORDER BY b.created_at DESC");
    collect_bookings(conn, &sql, &[])
}

pub fn bookings_by_doctor(conn: &Connection, doctor_id: &str) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} WHERE b.doctor_id = ?1 \
         ORDER BY b.date ASC, b.time ASC"
    );
    collect_bookings(conn, &sql, &[&doctor_id])
}

pub fn bookings_by_client(conn: &Connection, client_id: &str) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} WHERE b.client_id = ?1 \
         ORDER BY b.date DESC, b.time DESC"
    );
    collect_bookings(conn, &sql, &[&client_id])
}

pub fn pending_bookings(conn: &Connection) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} WHERE b.status = 'PENDING' \
         ORDER BY b.created_at ASC"
    );
    collect_bookings(conn, &sql, &[])
}

/// Inclusive date range. Lexical comparison is correct because dates are
/// zero-padded ISO strings.
pub fn bookings_in_date_range(
    conn: &Connection,
    start_date: &str,
    end_date: &str,
) -> Result<Vec<Booking>, AppError> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} {BOOKING_JOINS} WHERE b.date >= ?1 AND b.date <= ?2 \
         ORDER BY b.date ASC, b.time ASC"
    );
    collect_bookings(conn, &sql, &[&start_date, &end_date])
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> Result<bool, AppError> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_booking(conn: &Connection, id: &str) -> Result<bool, AppError> {
    let count = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn mark_notification_sent(conn: &Connection, id: &str) -> Result<(), AppError> {
    conn.execute(
        "UPDATE bookings SET notification_sent = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

// ── Bot sessions ──

pub fn get_session(conn: &Connection, chat_id: &str) -> Result<Option<BotSession>, AppError> {
    let result = conn.query_row(
        "SELECT chat_id, state, data, last_activity, expires_at
         FROM bot_sessions WHERE chat_id = ?1 AND expires_at > ?2",
        params![chat_id, now_string()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        },
    );

    match result {
        Ok((chat_id, state_str, data_json, last_activity_str, expires_at_str)) => {
            let data: SessionData = serde_json::from_str(&data_json).unwrap_or_default();
            let last_activity = NaiveDateTime::parse_from_str(&last_activity_str, DATETIME_FMT)
                .unwrap_or_else(|_| Utc::now().naive_utc());
            let expires_at = NaiveDateTime::parse_from_str(&expires_at_str, DATETIME_FMT)
                .unwrap_or_else(|_| Utc::now().naive_utc());

            Ok(Some(BotSession {
                chat_id,
                state: SessionState::parse(&state_str),
                data,
                last_activity,
                expires_at,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_session(conn: &Connection, session: &BotSession) -> Result<(), AppError> {
    let data_json =
        serde_json::to_string(&session.data).map_err(|e| AppError::Internal(e.into()))?;

    conn.execute(
        "INSERT INTO bot_sessions (chat_id, state, data, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(chat_id) DO UPDATE SET
           state = excluded.state,
           data = excluded.data,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            session.chat_id,
            session.state.as_str(),
            data_json,
            session.last_activity.format(DATETIME_FMT).to_string(),
            session.expires_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn expire_old_sessions(conn: &Connection) -> Result<usize, AppError> {
    let count = conn.execute(
        "DELETE FROM bot_sessions WHERE expires_at <= ?1",
        params![now_string()],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn make_user(id: &str, role: UserRole, phone: Option<&str>) -> User {
        User {
            id: id.to_string(),
            name: Some(format!("user-{id}")),
            phone_number: phone.map(String::from),
            tg_id: None,
            role,
            working: true,
            work_start_time: None,
            work_end_time: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn make_booking(id: &str, doctor_id: &str, date: &str, time: &str) -> Booking {
        Booking {
            id: id.to_string(),
            client_id: None,
            doctor_id: Some(doctor_id.to_string()),
            date: date.to_string(),
            time: time.to_string(),
            status: BookingStatus::Pending,
            comment: None,
            notification_sent: false,
            created_at: Utc::now().naive_utc(),
            client: None,
            doctor: None,
        }
    }

    #[test]
    fn test_default_doctor_is_earliest_created() {
        let conn = db::init_db(":memory:").unwrap();

        let mut first = make_user("doc-1", UserRole::Doctor, None);
        first.created_at = NaiveDateTime::parse_from_str("2024-01-01 09:00:00", DATETIME_FMT).unwrap();
        let mut second = make_user("doc-2", UserRole::Doctor, None);
        second.created_at = NaiveDateTime::parse_from_str("2024-02-01 09:00:00", DATETIME_FMT).unwrap();

        create_user(&conn, &second).unwrap();
        create_user(&conn, &first).unwrap();

        let default = find_default_doctor(&conn).unwrap().unwrap();
        assert_eq!(default.id, "doc-1");
    }

    #[test]
    fn test_default_doctor_ignores_clients() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("client-1", UserRole::Client, None)).unwrap();

        assert!(find_default_doctor(&conn).unwrap().is_none());
    }

    #[test]
    fn test_phone_number_is_unique() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("u1", UserRole::Client, Some("+998901112233"))).unwrap();

        let err = create_user(&conn, &make_user("u2", UserRole::Client, Some("+998901112233")))
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_active_slot_index_rejects_duplicate() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("doc", UserRole::Doctor, None)).unwrap();

        insert_booking(&conn, &make_booking("b1", "doc", "2030-05-01", "09:00")).unwrap();
        let err = insert_booking(&conn, &make_booking("b2", "doc", "2030-05-01", "09:00"))
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_cancelled_booking_frees_the_slot() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("doc", UserRole::Doctor, None)).unwrap();

        insert_booking(&conn, &make_booking("b1", "doc", "2030-05-01", "09:00")).unwrap();
        update_booking_status(&conn, "b1", BookingStatus::Cancelled).unwrap();

        // Same slot can be claimed again once the first booking is inactive.
        insert_booking(&conn, &make_booking("b2", "doc", "2030-05-01", "09:00")).unwrap();

        let active = active_bookings_for_day(&conn, "doc", "2030-05-01").unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "b2");
    }

    #[test]
    fn test_booking_projection_includes_summaries() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("doc", UserRole::Doctor, None)).unwrap();
        create_user(&conn, &make_user("cli", UserRole::Client, Some("+998900000001"))).unwrap();

        let mut booking = make_booking("b1", "doc", "2030-05-01", "10:00");
        booking.client_id = Some("cli".to_string());
        insert_booking(&conn, &booking).unwrap();

        let loaded = find_booking(&conn, "b1").unwrap().unwrap();
        assert_eq!(loaded.doctor.unwrap().name.unwrap(), "user-doc");
        assert_eq!(loaded.client.unwrap().phone_number.unwrap(), "+998900000001");
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let conn = db::init_db(":memory:").unwrap();
        create_user(&conn, &make_user("doc", UserRole::Doctor, None)).unwrap();
        insert_booking(&conn, &make_booking("b1", "doc", "2030-01-01", "09:00")).unwrap();
        insert_booking(&conn, &make_booking("b2", "doc", "2030-01-31", "09:00")).unwrap();
        insert_booking(&conn, &make_booking("b3", "doc", "2030-02-01", "09:00")).unwrap();

        let in_range = bookings_in_date_range(&conn, "2030-01-01", "2030-01-31").unwrap();
        let ids: Vec<_> = in_range.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
    }

    #[test]
    fn test_update_status_missing_booking_reports_false() {
        let conn = db::init_db(":memory:").unwrap();
        assert!(!update_booking_status(&conn, "nope", BookingStatus::Approved).unwrap());
        assert!(!delete_booking(&conn, "nope").unwrap());
    }

    #[test]
    fn test_session_round_trip_and_expiry() {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();

        let session = BotSession {
            chat_id: "chat-1".to_string(),
            state: SessionState::ChoosingTime,
            data: SessionData {
                name: Some("Ali".to_string()),
                phone_number: Some("+998901234567".to_string()),
                date: Some("2030-05-01".to_string()),
                time: None,
            },
            last_activity: now,
            expires_at: now + chrono::Duration::minutes(30),
        };
        save_session(&conn, &session).unwrap();

        let loaded = get_session(&conn, "chat-1").unwrap().unwrap();
        assert_eq!(loaded.state, SessionState::ChoosingTime);
        assert_eq!(loaded.data.name.as_deref(), Some("Ali"));

        let mut stale = session.clone();
        stale.expires_at = now - chrono::Duration::minutes(1);
        save_session(&conn, &stale).unwrap();
        assert!(get_session(&conn, "chat-1").unwrap().is_none());

        assert_eq!(expire_old_sessions(&conn).unwrap(), 1);
    }
}
