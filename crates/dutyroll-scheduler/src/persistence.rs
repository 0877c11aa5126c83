//! SQLite-backed persistence for the roster, weekly assignments and settings.
//! One connection behind a mutex; clear+insert for a period runs in a single
//! transaction so readers never see a half-replaced week.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dutyroll_core::{
    AssignmentRecord, AssignmentStore, DutyrollError, Member, NewAssignment, Period, Result,
    RosterStore, SettingsStore, Task,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

pub const SETTING_NOTIFICATION_DAY: &str = "notification_day";
pub const SETTING_NOTIFICATION_HOUR: &str = "notification_hour";

fn storage(e: rusqlite::Error) -> DutyrollError {
    DutyrollError::Storage(e.to_string())
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite store for everything Dutyroll persists.
pub struct RotaDb {
    conn: Mutex<Connection>,
}

impl RotaDb {
    /// Open or create the database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(storage)?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(storage)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS members (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                username TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                required_people INTEGER NOT NULL DEFAULT 1 CHECK (required_people >= 1),
                active INTEGER NOT NULL DEFAULT 1
            );

            -- One row per (member, task) slot in an ISO week
            CREATE TABLE IF NOT EXISTS assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                member_id INTEGER NOT NULL REFERENCES members(id),
                task_id INTEGER NOT NULL REFERENCES tasks(id),
                week_number INTEGER NOT NULL,
                year INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_assignments_period
                ON assignments (year, week_number);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| DutyrollError::Storage(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DutyrollError::Storage(format!("connection lock poisoned: {e}")))
    }

    // ─── Roster ───────────────────────────────────────────────

    /// Register a member. A previously deactivated member with the same
    /// external id is reactivated under the new name.
    pub fn add_member(&self, external_id: i64, name: &str, username: Option<&str>) -> Result<Member> {
        let conn = self.lock()?;
        let existing: Option<(i64, bool)> = conn
            .query_row(
                "SELECT id, active FROM members WHERE external_id = ?1",
                params![external_id],
                |row| Ok((row.get(0)?, row.get::<_, i32>(1)? != 0)),
            )
            .optional()
            .map_err(storage)?;

        match existing {
            Some((_, true)) => {
                return Err(DutyrollError::Roster(format!(
                    "member with id {external_id} already exists"
                )));
            }
            Some((id, false)) => {
                conn.execute(
                    "UPDATE members SET active = 1, name = ?2, username = ?3 WHERE id = ?1",
                    params![id, name, username],
                )
                .map_err(storage)?;
            }
            None => {
                conn.execute(
                    "INSERT INTO members (external_id, name, username, active, created_at)
                     VALUES (?1, ?2, ?3, 1, ?4)",
                    params![external_id, name, username, Utc::now().to_rfc3339()],
                )
                .map_err(storage)?;
            }
        }
        tracing::info!("Member registered: {} ({})", name, external_id);
        query_member(&conn, external_id)?
            .ok_or_else(|| DutyrollError::Storage(format!("member {external_id} vanished")))
    }

    /// Soft-delete: the member keeps past assignments but leaves rotations.
    /// Returns false when no active member has that id.
    pub fn deactivate_member(&self, external_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE members SET active = 0 WHERE external_id = ?1 AND active = 1",
                params![external_id],
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    pub fn get_member(&self, external_id: i64) -> Result<Option<Member>> {
        let conn = self.lock()?;
        query_member(&conn, external_id)
    }

    /// All members, active or not, ordered by name.
    pub fn list_members(&self) -> Result<Vec<Member>> {
        let conn = self.lock()?;
        query_members(&conn, false)
    }

    pub fn add_task(&self, name: &str, required_people: u32) -> Result<Task> {
        if required_people < 1 {
            return Err(DutyrollError::Roster(
                "required people must be a positive number".into(),
            ));
        }
        let conn = self.lock()?;
        let existing: Option<(i64, bool)> = conn
            .query_row(
                "SELECT id, active FROM tasks WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get::<_, i32>(1)? != 0)),
            )
            .optional()
            .map_err(storage)?;

        match existing {
            Some((_, true)) => {
                return Err(DutyrollError::Roster(format!("task '{name}' already exists")));
            }
            Some((id, false)) => {
                conn.execute(
                    "UPDATE tasks SET active = 1, required_people = ?2 WHERE id = ?1",
                    params![id, required_people],
                )
                .map_err(storage)?;
            }
            None => {
                conn.execute(
                    "INSERT INTO tasks (name, required_people, active) VALUES (?1, ?2, 1)",
                    params![name, required_people],
                )
                .map_err(storage)?;
            }
        }
        tracing::info!("Task registered: '{}' ({} people)", name, required_people);
        conn.query_row(
            "SELECT id, name, required_people, active FROM tasks WHERE name = ?1",
            params![name],
            task_from_row,
        )
        .map_err(storage)
    }

    pub fn deactivate_task(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE tasks SET active = 0 WHERE name = ?1 AND active = 1",
                params![name],
            )
            .map_err(storage)?;
        Ok(changed > 0)
    }

    /// All tasks, active or not, ordered by name.
    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(&conn, false)
    }

    /// Number of stored assignments, optionally restricted to one period.
    pub fn count_assignments(&self, period: Option<Period>) -> Result<usize> {
        let conn = self.lock()?;
        let n: i64 = match period {
            Some(p) => conn.query_row(
                "SELECT COUNT(*) FROM assignments WHERE week_number = ?1 AND year = ?2",
                params![p.week, p.year],
                |r| r.get::<_, i64>(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM assignments", [], |r| r.get::<_, i64>(0)),
        }
        .map_err(storage)?;
        Ok(n as usize)
    }
}

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        username: row.get(3)?,
        active: row.get::<_, i32>(4)? != 0,
        created_at: parse_ts(row, 5)?,
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        required_people: row.get(2)?,
        active: row.get::<_, i32>(3)? != 0,
    })
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRecord> {
    Ok(AssignmentRecord {
        id: row.get(0)?,
        member_external_id: row.get(1)?,
        member_name: row.get(2)?,
        task_name: row.get(3)?,
        period: Period::new(row.get(4)?, row.get(5)?),
        created_at: parse_ts(row, 6)?,
    })
}

fn query_member(conn: &Connection, external_id: i64) -> Result<Option<Member>> {
    conn.query_row(
        "SELECT id, external_id, name, username, active, created_at
         FROM members WHERE external_id = ?1",
        params![external_id],
        member_from_row,
    )
    .optional()
    .map_err(storage)
}

fn query_members(conn: &Connection, active_only: bool) -> Result<Vec<Member>> {
    let sql = if active_only {
        "SELECT id, external_id, name, username, active, created_at
         FROM members WHERE active = 1 ORDER BY name, id"
    } else {
        "SELECT id, external_id, name, username, active, created_at
         FROM members ORDER BY name, id"
    };
    let mut stmt = conn.prepare(sql).map_err(storage)?;
    let rows = stmt.query_map([], member_from_row).map_err(storage)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
}

fn query_tasks(conn: &Connection, active_only: bool) -> Result<Vec<Task>> {
    let sql = if active_only {
        "SELECT id, name, required_people, active FROM tasks WHERE active = 1 ORDER BY name"
    } else {
        "SELECT id, name, required_people, active FROM tasks ORDER BY name"
    };
    let mut stmt = conn.prepare(sql).map_err(storage)?;
    let rows = stmt.query_map([], task_from_row).map_err(storage)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
}

fn delete_period(conn: &Connection, period: Period) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM assignments WHERE week_number = ?1 AND year = ?2",
        params![period.week, period.year],
    )
}

fn insert_rows(conn: &Connection, rows: &[NewAssignment]) -> rusqlite::Result<usize> {
    let created_at = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO assignments (member_id, task_id, week_number, year, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for row in rows {
        stmt.execute(params![
            row.member_id,
            row.task_id,
            row.period.week,
            row.period.year,
            created_at,
        ])?;
    }
    Ok(rows.len())
}

const ASSIGNMENT_SELECT: &str = "
    SELECT a.id, m.external_id, m.name, t.name, a.week_number, a.year, a.created_at
    FROM assignments a
    JOIN members m ON m.id = a.member_id
    JOIN tasks t ON t.id = a.task_id";

impl RosterStore for RotaDb {
    fn active_members(&self) -> Result<Vec<Member>> {
        let conn = self.lock()?;
        query_members(&conn, true)
    }

    fn active_tasks(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        query_tasks(&conn, true)
    }
}

impl AssignmentStore for RotaDb {
    fn clear(&self, period: Period) -> Result<usize> {
        let conn = self.lock()?;
        delete_period(&conn, period).map_err(storage)
    }

    fn bulk_insert(&self, rows: &[NewAssignment]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage)?;
        let n = insert_rows(&tx, rows).map_err(storage)?;
        tx.commit().map_err(storage)?;
        Ok(n)
    }

    fn replace_period(&self, period: Period, rows: &[NewAssignment]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage)?;
        let removed = delete_period(&tx, period).map_err(storage)?;
        let inserted = insert_rows(&tx, rows).map_err(storage)?;
        tx.commit().map_err(storage)?;
        tracing::debug!(
            "Period {}: replaced {} assignments with {}",
            period,
            removed,
            inserted
        );
        Ok(inserted)
    }

    fn assignments_for_period(&self, period: Period) -> Result<Vec<AssignmentRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "{ASSIGNMENT_SELECT} WHERE a.week_number = ?1 AND a.year = ?2 ORDER BY t.name, a.id"
        );
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params![period.week, period.year], record_from_row)
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }

    fn member_assignments(&self, external_id: i64, period: Period) -> Result<Vec<AssignmentRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "{ASSIGNMENT_SELECT}
             WHERE m.external_id = ?1 AND a.week_number = ?2 AND a.year = ?3
             ORDER BY t.name, a.id"
        );
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params![external_id, period.week, period.year], record_from_row)
            .map_err(storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage)
    }
}

impl SettingsStore for RotaDb {
    fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(storage)?;
        Ok(())
    }
}
