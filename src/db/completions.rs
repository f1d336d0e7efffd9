//! Completion log: append-only rows recording when tasks were finished.
//! Rows are cascade-deleted with their task by the schema's FK.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rusqlite::{Connection, Row};

use super::models::Completion;
use super::{parse_datetime, Database, DbError};

pub(crate) fn map_completion_row(row: &Row) -> rusqlite::Result<Completion> {
    Ok(Completion {
        id: row.get(0)?,
        task_id: row.get(1)?,
        completed_at: parse_datetime(row.get(2)?),
        actual_minutes: row.get(3)?,
        scheduled_minutes: row.get(4)?,
        day_of_week: row.get::<_, i64>(5)? as u8,
        hour_of_day: row.get::<_, i64>(6)? as u8,
    })
}

/// Insert a completion for `task_id` at `completed_at`, deriving the
/// day-of-week (0 = Sunday) and hour-of-day columns from the instant.
pub(crate) fn insert_completion_tx(
    conn: &Connection,
    task_id: i64,
    completed_at: DateTime<Utc>,
    actual_minutes: Option<i64>,
    scheduled_minutes: Option<i64>,
) -> Result<i64, DbError> {
    conn.execute(
        r#"INSERT INTO completions
           (task_id, completed_at, actual_minutes, scheduled_minutes,
            day_of_week, hour_of_day)
           VALUES (?, ?, ?, ?, ?, ?)"#,
        rusqlite::params![
            task_id,
            completed_at.to_rfc3339(),
            actual_minutes,
            scheduled_minutes,
            completed_at.weekday().num_days_from_sunday(),
            completed_at.hour(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert preserving all fields (import in replace mode).
pub(crate) fn insert_completion_row_tx(
    conn: &Connection,
    c: &Completion,
    preserve_id: bool,
) -> Result<i64, DbError> {
    if preserve_id {
        conn.execute(
            r#"INSERT INTO completions
               (id, task_id, completed_at, actual_minutes, scheduled_minutes,
                day_of_week, hour_of_day)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            rusqlite::params![
                c.id,
                c.task_id,
                c.completed_at.to_rfc3339(),
                c.actual_minutes,
                c.scheduled_minutes,
                c.day_of_week,
                c.hour_of_day,
            ],
        )?;
    } else {
        conn.execute(
            r#"INSERT INTO completions
               (task_id, completed_at, actual_minutes, scheduled_minutes,
                day_of_week, hour_of_day)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            rusqlite::params![
                c.task_id,
                c.completed_at.to_rfc3339(),
                c.actual_minutes,
                c.scheduled_minutes,
                c.day_of_week,
                c.hour_of_day,
            ],
        )?;
    }
    Ok(conn.last_insert_rowid())
}

pub(crate) fn list_completions_tx(conn: &Connection) -> Result<Vec<Completion>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, completed_at, actual_minutes, scheduled_minutes,
                day_of_week, hour_of_day
         FROM completions ORDER BY id",
    )?;
    let rows = stmt.query_map([], map_completion_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

impl Database {
    pub fn completions_for_task(&self, task_id: i64) -> Result<Vec<Completion>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, completed_at, actual_minutes, scheduled_minutes,
                        day_of_week, hour_of_day
                 FROM completions WHERE task_id = ? ORDER BY completed_at",
            )?;
            let rows = stmt.query_map([task_id], map_completion_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    pub fn all_completions(&self) -> Result<Vec<Completion>, DbError> {
        self.with_conn(list_completions_tx)
    }
}
