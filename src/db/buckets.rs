//! Bucket persistence. Deleting a bucket clears membership on its tasks in
//! the same statement via the FK's `ON DELETE SET NULL`; it never deletes
//! the tasks themselves.

use rusqlite::{Connection, OptionalExtension, Row};

use super::models::{Bucket, BucketKind, CreateBucket};
use super::{Database, DbError};

pub(crate) fn map_bucket_row(row: &Row) -> rusqlite::Result<Bucket> {
    let kind_str: String = row.get(2)?;
    let config_json: String = row.get(3)?;
    Ok(Bucket {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: BucketKind::parse(&kind_str).unwrap_or_default(),
        config: serde_json::from_str(&config_json).unwrap_or(serde_json::Value::Null),
    })
}

fn conflict_on_unique(e: rusqlite::Error, name: &str) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            DbError::Conflict(format!("bucket name '{}' already exists", name))
        }
        _ => DbError::Sqlite(e),
    }
}

pub(crate) fn insert_bucket_tx(conn: &Connection, b: &CreateBucket) -> Result<i64, DbError> {
    let config = b
        .config
        .clone()
        .unwrap_or_else(|| serde_json::json!({}));
    conn.execute(
        "INSERT INTO buckets (name, kind, config_json) VALUES (?, ?, ?)",
        rusqlite::params![b.name, b.kind.as_str(), config.to_string()],
    )
    .map_err(|e| conflict_on_unique(e, &b.name))?;
    Ok(conn.last_insert_rowid())
}

/// Insert preserving the bucket's id (import in replace mode).
pub(crate) fn insert_bucket_with_id_tx(conn: &Connection, b: &Bucket) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO buckets (id, name, kind, config_json) VALUES (?, ?, ?, ?)",
        rusqlite::params![b.id, b.name, b.kind.as_str(), b.config.to_string()],
    )
    .map_err(|e| conflict_on_unique(e, &b.name))?;
    Ok(())
}

pub(crate) fn get_bucket_tx(conn: &Connection, bucket_id: i64) -> Result<Bucket, DbError> {
    conn.prepare("SELECT id, name, kind, config_json FROM buckets WHERE id = ?")?
        .query_row([bucket_id], map_bucket_row)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                DbError::NotFound(format!("Bucket {}", bucket_id))
            }
            other => DbError::Sqlite(other),
        })
}

pub(crate) fn list_buckets_tx(conn: &Connection) -> Result<Vec<Bucket>, DbError> {
    let mut stmt =
        conn.prepare("SELECT id, name, kind, config_json FROM buckets ORDER BY id")?;
    let rows = stmt.query_map([], map_bucket_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
}

impl Database {
    pub fn create_bucket(&self, bucket: &CreateBucket) -> Result<Bucket, DbError> {
        if bucket.name.trim().is_empty() {
            return Err(DbError::Validation("bucket name cannot be empty".into()));
        }
        self.with_tx(|tx| {
            let id = insert_bucket_tx(tx, bucket)?;
            get_bucket_tx(tx, id)
        })
    }

    pub fn get_bucket(&self, bucket_id: i64) -> Result<Bucket, DbError> {
        self.with_conn(|conn| get_bucket_tx(conn, bucket_id))
    }

    pub fn list_buckets(&self) -> Result<Vec<Bucket>, DbError> {
        self.with_conn(list_buckets_tx)
    }

    /// Exact case-insensitive lookup, used to resolve parsed bucket names.
    pub fn find_bucket_by_name(&self, name: &str) -> Result<Option<Bucket>, DbError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, name, kind, config_json FROM buckets
                 WHERE name = ? COLLATE NOCASE",
            )?
            .query_row([name], map_bucket_row)
            .optional()
            .map_err(DbError::from)
        })
    }

    /// Delete a bucket; member tasks keep existing with `bucket_id`
    /// cleared atomically (I6).
    pub fn delete_bucket(&self, bucket_id: i64) -> Result<(), DbError> {
        self.with_tx(|tx| {
            let affected = tx.execute("DELETE FROM buckets WHERE id = ?", [bucket_id])?;
            if affected == 0 {
                return Err(DbError::NotFound(format!("Bucket {}", bucket_id)));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(db: &Database, name: &str, kind: BucketKind) -> Bucket {
        db.create_bucket(&CreateBucket {
            name: name.to_string(),
            kind,
            config: None,
        })
        .unwrap()
    }

    #[test]
    fn create_and_get_bucket() {
        let db = Database::open_in_memory().unwrap();
        let b = create(&db, "Deep Work", BucketKind::Context);
        assert!(b.id > 0);
        let got = db.get_bucket(b.id).unwrap();
        assert_eq!(got.name, "Deep Work");
        assert_eq!(got.kind, BucketKind::Context);
    }

    #[test]
    fn duplicate_name_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        create(&db, "Inbox", BucketKind::Category);
        let err = db
            .create_bucket(&CreateBucket {
                name: "Inbox".to_string(),
                kind: BucketKind::Project,
                config: None,
            })
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[test]
    fn empty_name_is_validation() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_bucket(&CreateBucket {
                name: "  ".to_string(),
                kind: BucketKind::Category,
                config: None,
            })
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn name_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        let b = create(&db, "Errands", BucketKind::Category);
        let found = db.find_bucket_by_name("errands").unwrap();
        assert_eq!(found.map(|f| f.id), Some(b.id));
        assert!(db.find_bucket_by_name("nothing").unwrap().is_none());
    }

    #[test]
    fn delete_missing_bucket_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.delete_bucket(7), Err(DbError::NotFound(_))));
    }

    #[test]
    fn delete_bucket_clears_task_membership() {
        let db = Database::open_in_memory().unwrap();
        let b = create(&db, "Chores", BucketKind::Category);

        use crate::curve::CurveConfig;
        use crate::db::models::{Task, TaskStatus};
        use chrono::TimeZone as _;
        let now = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let task = Task {
            id: 0,
            title: "dishes".into(),
            project: None,
            bucket_id: Some(b.id),
            tags: vec![],
            deadline: None,
            estimate_minutes: None,
            recurrence: None,
            window_start: None,
            window_end: None,
            dependencies: vec![],
            curve: CurveConfig::Linear {
                start_date: now,
                deadline: now + chrono::Duration::days(7),
            },
            status: TaskStatus::Open,
            last_completed_at: None,
            next_due_at: None,
            created_at: now,
            updated_at: now,
        };
        let task_id = db
            .with_tx(|tx| crate::db::tasks::insert_task_tx(tx, &task))
            .unwrap();

        db.delete_bucket(b.id).unwrap();

        let got = db.get_task(task_id).unwrap();
        assert_eq!(got.bucket_id, None);
        assert_eq!(got.title, "dishes");
    }
}
