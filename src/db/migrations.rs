use anyhow::Context;
use rusqlite::Connection;

/// Schema migrations, embedded so an in-memory database gets the full schema.
/// Applied in order; each name is recorded in `_migrations` exactly once.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_users",
        "CREATE TABLE users (
            id TEXT PRIMARY KEY,
            name TEXT,
            phone_number TEXT,
            tg_id TEXT,
            role TEXT NOT NULL DEFAULT 'CLIENT',
            working INTEGER NOT NULL DEFAULT 0,
            work_start_time TEXT,
            work_end_time TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX idx_users_phone_number
            ON users(phone_number) WHERE phone_number IS NOT NULL;
        CREATE UNIQUE INDEX idx_users_tg_id
            ON users(tg_id) WHERE tg_id IS NOT NULL;",
    ),
    (
        "0002_bookings",
        "CREATE TABLE bookings (
            id TEXT PRIMARY KEY,
            client_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            doctor_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'PENDING',
            comment TEXT,
            notification_sent INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX idx_bookings_doctor_date ON bookings(doctor_id, date);
        -- Backstop against two concurrent requests claiming the same slot.
        CREATE UNIQUE INDEX idx_bookings_active_slot
            ON bookings(doctor_id, date, time)
            WHERE status IN ('PENDING', 'APPROVED');",
    ),
    (
        "0003_bot_sessions",
        "CREATE TABLE bot_sessions (
            chat_id TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            data TEXT NOT NULL,
            last_activity TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );",
    ),
];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::db;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = db::init_db(":memory:").unwrap();
        super::run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, super::MIGRATIONS.len() as i64);
    }
}
