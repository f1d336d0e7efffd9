//! Task persistence: CRUD, filtered listing, and relevance-ranked search.
//!
//! Row-level helpers take a `&Connection` so they compose inside
//! transactions; the `Database` methods wrap them for single-shot callers.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};

use super::models::{format_hhmm, parse_hhmm, Task, TaskStatus};
use super::{parse_datetime, Database, DbError};

/// Queryable filters for task listing. `bucket_id` distinguishes "any
/// bucket" (outer `None`) from "no bucket" (`Some(None)`). `tags` requires
/// the task to contain every listed tag.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
    pub bucket_id: Option<Option<i64>>,
    pub tags: Vec<String>,
    pub has_deadline: Option<bool>,
    pub has_recurrence: Option<bool>,
    pub overdue: Option<bool>,
}

const TASK_COLUMNS: &str = "id, title, project, bucket_id, tags_json, deadline, \
     estimate_minutes, recurrence_json, window_start, window_end, \
     dependencies_json, curve_json, status, last_completed_at, next_due_at, \
     created_at, updated_at";

pub(crate) fn map_task_row(row: &Row) -> rusqlite::Result<Task> {
    let bad = |idx: usize, e: serde_json::Error| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(e),
        )
    };

    let tags_json: String = row.get(4)?;
    let tags = serde_json::from_str(&tags_json).map_err(|e| bad(4, e))?;

    let recurrence_json: Option<String> = row.get(7)?;
    let recurrence = match recurrence_json {
        Some(s) => Some(serde_json::from_str(&s).map_err(|e| bad(7, e))?),
        None => None,
    };

    let dependencies_json: String = row.get(10)?;
    let dependencies = serde_json::from_str(&dependencies_json).map_err(|e| bad(10, e))?;

    let curve_json: String = row.get(11)?;
    let curve = serde_json::from_str(&curve_json).map_err(|e| bad(11, e))?;

    let status_str: String = row.get(12)?;
    let status = TaskStatus::parse(&status_str).unwrap_or_default();

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        project: row.get(2)?,
        bucket_id: row.get(3)?,
        tags,
        deadline: row.get::<_, Option<String>>(5)?.map(parse_datetime),
        estimate_minutes: row.get(6)?,
        recurrence,
        window_start: row
            .get::<_, Option<String>>(8)?
            .as_deref()
            .and_then(parse_hhmm),
        window_end: row
            .get::<_, Option<String>>(9)?
            .as_deref()
            .and_then(parse_hhmm),
        dependencies,
        curve,
        status,
        last_completed_at: row.get::<_, Option<String>>(13)?.map(parse_datetime),
        next_due_at: row.get::<_, Option<String>>(14)?.map(parse_datetime),
        created_at: parse_datetime(row.get(15)?),
        updated_at: parse_datetime(row.get(16)?),
    })
}

/// JSON- and text-encoded column values shared by the insert/update paths.
struct TaskColumns {
    tags_json: String,
    deps_json: String,
    curve_json: String,
    recurrence_json: Option<String>,
    deadline: Option<String>,
    window_start: Option<String>,
    window_end: Option<String>,
    last_completed_at: Option<String>,
    next_due_at: Option<String>,
}

fn encode_columns(t: &Task) -> Result<TaskColumns, DbError> {
    let err = |what: &str, e: serde_json::Error| {
        DbError::Validation(format!("{} serialize: {}", what, e))
    };
    Ok(TaskColumns {
        tags_json: serde_json::to_string(&t.tags).map_err(|e| err("tags", e))?,
        deps_json: serde_json::to_string(&t.dependencies)
            .map_err(|e| err("dependencies", e))?,
        curve_json: serde_json::to_string(&t.curve).map_err(|e| err("curve", e))?,
        recurrence_json: t
            .recurrence
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| err("recurrence", e))?,
        deadline: t.deadline.map(|d| d.to_rfc3339()),
        window_start: t.window_start.map(format_hhmm),
        window_end: t.window_end.map(format_hhmm),
        last_completed_at: t.last_completed_at.map(|d| d.to_rfc3339()),
        next_due_at: t.next_due_at.map(|d| d.to_rfc3339()),
    })
}

/// Insert a task, letting the store assign the id. Returns the new id.
pub(crate) fn insert_task_tx(conn: &Connection, t: &Task) -> Result<i64, DbError> {
    let c = encode_columns(t)?;
    conn.execute(
        r#"INSERT INTO tasks
           (title, project, bucket_id, tags_json, deadline, estimate_minutes,
            recurrence_json, window_start, window_end, dependencies_json,
            curve_json, status, last_completed_at, next_due_at,
            created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        rusqlite::params![
            t.title,
            t.project,
            t.bucket_id,
            c.tags_json,
            c.deadline,
            t.estimate_minutes,
            c.recurrence_json,
            c.window_start,
            c.window_end,
            c.deps_json,
            c.curve_json,
            t.status.as_str(),
            c.last_completed_at,
            c.next_due_at,
            t.created_at.to_rfc3339(),
            t.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Insert preserving the task's id (import in replace mode).
pub(crate) fn insert_task_with_id_tx(conn: &Connection, t: &Task) -> Result<(), DbError> {
    let c = encode_columns(t)?;
    conn.execute(
        r#"INSERT INTO tasks
           (id, title, project, bucket_id, tags_json, deadline, estimate_minutes,
            recurrence_json, window_start, window_end, dependencies_json,
            curve_json, status, last_completed_at, next_due_at,
            created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        rusqlite::params![
            t.id,
            t.title,
            t.project,
            t.bucket_id,
            c.tags_json,
            c.deadline,
            t.estimate_minutes,
            c.recurrence_json,
            c.window_start,
            c.window_end,
            c.deps_json,
            c.curve_json,
            t.status.as_str(),
            c.last_completed_at,
            c.next_due_at,
            t.created_at.to_rfc3339(),
            t.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Rewrite every non-identity column of a task row.
pub(crate) fn update_task_row_tx(conn: &Connection, t: &Task) -> Result<(), DbError> {
    let c = encode_columns(t)?;
    let affected = conn.execute(
        r#"UPDATE tasks
           SET title = ?, project = ?, bucket_id = ?, tags_json = ?, deadline = ?,
               estimate_minutes = ?, recurrence_json = ?, window_start = ?,
               window_end = ?, dependencies_json = ?, curve_json = ?, status = ?,
               last_completed_at = ?, next_due_at = ?, updated_at = ?
           WHERE id = ?"#,
        rusqlite::params![
            t.title,
            t.project,
            t.bucket_id,
            c.tags_json,
            c.deadline,
            t.estimate_minutes,
            c.recurrence_json,
            c.window_start,
            c.window_end,
            c.deps_json,
            c.curve_json,
            t.status.as_str(),
            c.last_completed_at,
            c.next_due_at,
            t.updated_at.to_rfc3339(),
            t.id,
        ],
    )?;
    if affected == 0 {
        return Err(DbError::NotFound(format!("Task {}", t.id)));
    }
    Ok(())
}

pub(crate) fn get_task_tx(conn: &Connection, task_id: i64) -> Result<Task, DbError> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS))?;
    stmt.query_row([task_id], map_task_row).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("Task {}", task_id)),
        other => DbError::Sqlite(other),
    })
}

pub(crate) fn list_tasks_tx(conn: &Connection) -> Result<Vec<Task>, DbError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {} FROM tasks ORDER BY id", TASK_COLUMNS))?;
    let rows = stmt.query_map([], map_task_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

pub(crate) fn set_status_tx(
    conn: &Connection,
    task_id: i64,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let affected = conn.execute(
        "UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?",
        rusqlite::params![status.as_str(), now.to_rfc3339(), task_id],
    )?;
    if affected == 0 {
        return Err(DbError::NotFound(format!("Task {}", task_id)));
    }
    Ok(())
}

pub(crate) fn delete_task_tx(conn: &Connection, task_id: i64) -> Result<(), DbError> {
    let affected = conn.execute("DELETE FROM tasks WHERE id = ?", [task_id])?;
    if affected == 0 {
        return Err(DbError::NotFound(format!("Task {}", task_id)));
    }
    Ok(())
}

impl Database {
    pub fn get_task(&self, task_id: i64) -> Result<Task, DbError> {
        self.with_conn(|conn| get_task_tx(conn, task_id))
    }

    /// All tasks, ascending id.
    pub fn all_tasks(&self) -> Result<Vec<Task>, DbError> {
        self.with_conn(list_tasks_tx)
    }

    /// Filtered listing. `at` is the evaluation instant for the overdue
    /// filter; tag intersection and overdue are applied after the SQL pass
    /// because tags live in a JSON column and overdue needs `at`.
    pub fn list_tasks(&self, filter: &TaskFilter, at: DateTime<Utc>) -> Result<Vec<Task>, DbError> {
        let mut sql = format!("SELECT {} FROM tasks WHERE 1=1", TASK_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(project) = &filter.project {
            sql.push_str(" AND project = ?");
            params.push(Box::new(project.clone()));
        }
        match filter.bucket_id {
            Some(Some(id)) => {
                sql.push_str(" AND bucket_id = ?");
                params.push(Box::new(id));
            }
            Some(None) => sql.push_str(" AND bucket_id IS NULL"),
            None => {}
        }
        if let Some(has) = filter.has_deadline {
            sql.push_str(if has {
                " AND deadline IS NOT NULL"
            } else {
                " AND deadline IS NULL"
            });
        }
        if let Some(has) = filter.has_recurrence {
            sql.push_str(if has {
                " AND recurrence_json IS NOT NULL"
            } else {
                " AND recurrence_json IS NULL"
            });
        }
        sql.push_str(" ORDER BY id");

        let tasks = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                map_task_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })?;

        Ok(tasks
            .into_iter()
            .filter(|t| filter.tags.iter().all(|tag| t.tags.iter().any(|x| x == tag)))
            .filter(|t| match filter.overdue {
                Some(want) => is_overdue(t, at) == want,
                None => true,
            })
            .collect())
    }

    /// Full-text search over title, project, and tags. Returns ids ranked
    /// by relevance: title hits above project hits above tag hits, ties by
    /// ascending id.
    pub fn search_tasks(&self, query: &str) -> Result<Vec<i64>, DbError> {
        let pattern = format!("%{}%", query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT id,
                          (CASE WHEN title LIKE ?1 THEN 4 ELSE 0 END)
                        + (CASE WHEN COALESCE(project, '') LIKE ?1 THEN 2 ELSE 0 END)
                        + (CASE WHEN tags_json LIKE ?1 THEN 1 ELSE 0 END) AS score
                   FROM tasks
                   WHERE title LIKE ?1
                      OR COALESCE(project, '') LIKE ?1
                      OR tags_json LIKE ?1
                   ORDER BY score DESC, id ASC"#,
            )?;
            let rows = stmt.query_map([&pattern], |row| row.get::<_, i64>(0))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }
}

fn is_overdue(t: &Task, at: DateTime<Utc>) -> bool {
    if t.status == TaskStatus::Completed {
        return false;
    }
    t.deadline.map(|d| d < at).unwrap_or(false)
        || t.next_due_at.map(|d| d < at).unwrap_or(false)
}
