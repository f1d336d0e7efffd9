//! JSON export and import. Export snapshots the whole store in one
//! transaction; import runs as one transaction in either `replace` mode
//! (wipe first, ids preserved) or `merge` mode (ids re-allocated and
//! references remapped).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};

use crate::db::models::{Bucket, Completion, CreateBucket, Task};
use crate::db::schema::DATA_VERSION;
use crate::db::{
    buckets as bucket_store, completions as completion_store, tasks as task_store, Database,
    DbError,
};
use crate::graph;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub buckets: Vec<Bucket>,
    pub completions: Vec<Completion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Wipe the store, then insert with source ids preserved.
    Replace,
    /// Keep existing data; re-allocate incoming ids and remap references.
    Merge,
}

impl ImportMode {
    pub fn parse(s: &str) -> Result<Self, DbError> {
        match s {
            "replace" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            other => Err(DbError::Unsupported(format!(
                "unknown import mode '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ImportReport {
    pub tasks: ImportCounts,
    pub buckets: ImportCounts,
    pub completions: ImportCounts,
}

pub fn export(db: &Database, at: DateTime<Utc>) -> Result<ExportData, DbError> {
    db.with_tx(|tx| {
        Ok(ExportData {
            version: DATA_VERSION.to_string(),
            exported_at: at,
            tasks: task_store::list_tasks_tx(tx)?,
            buckets: bucket_store::list_buckets_tx(tx)?,
            completions: completion_store::list_completions_tx(tx)?,
        })
    })
}

pub fn import(
    db: &Database,
    data: &ExportData,
    mode: ImportMode,
    now: DateTime<Utc>,
) -> Result<ImportReport, DbError> {
    if data.version != DATA_VERSION {
        return Err(DbError::Unsupported(format!(
            "unknown export version '{}'",
            data.version
        )));
    }

    match mode {
        ImportMode::Replace => db.with_tx(|tx| import_replace(tx, data)),
        ImportMode::Merge => db.with_tx(|tx| import_merge(tx, data, now)),
    }
}

fn import_replace(
    tx: &rusqlite::Transaction,
    data: &ExportData,
) -> Result<ImportReport, DbError> {
    tx.execute("DELETE FROM completions", [])?;
    tx.execute("DELETE FROM tasks", [])?;
    tx.execute("DELETE FROM buckets", [])?;

    let mut report = ImportReport::default();

    let mut bucket_ids = HashSet::new();
    for bucket in &data.buckets {
        match bucket_store::insert_bucket_with_id_tx(tx, bucket) {
            Ok(()) => {
                bucket_ids.insert(bucket.id);
                report.buckets.imported += 1;
            }
            Err(e) => {
                tracing::warn!("skipping bucket {} ('{}'): {}", bucket.id, bucket.name, e);
                report.buckets.skipped += 1;
            }
        }
    }

    let file_task_ids: HashSet<i64> = data.tasks.iter().map(|t| t.id).collect();
    let mut task_ids = HashSet::new();
    for task in &data.tasks {
        let mut t = task.clone();
        if let Some(bucket_id) = t.bucket_id {
            if !bucket_ids.contains(&bucket_id) {
                t.bucket_id = None;
            }
        }
        // Keep I1: edges may only point at tasks present in the file.
        t.dependencies.retain(|d| file_task_ids.contains(d));
        match task_store::insert_task_with_id_tx(tx, &t) {
            Ok(()) => {
                task_ids.insert(t.id);
                report.tasks.imported += 1;
            }
            Err(e) => {
                tracing::warn!("skipping task {} ('{}'): {}", task.id, task.title, e);
                report.tasks.skipped += 1;
            }
        }
    }

    for completion in &data.completions {
        if !task_ids.contains(&completion.task_id) {
            report.completions.skipped += 1;
            continue;
        }
        match completion_store::insert_completion_row_tx(tx, completion, true) {
            Ok(_) => report.completions.imported += 1,
            Err(e) => {
                tracing::warn!("skipping completion {}: {}", completion.id, e);
                report.completions.skipped += 1;
            }
        }
    }

    Ok(report)
}

fn import_merge(
    tx: &rusqlite::Transaction,
    data: &ExportData,
    now: DateTime<Utc>,
) -> Result<ImportReport, DbError> {
    let mut report = ImportReport::default();

    // Buckets: an existing name wins; incoming members are pointed at it.
    let mut bucket_map: HashMap<i64, i64> = HashMap::new();
    for bucket in &data.buckets {
        let existing: Option<i64> = tx
            .prepare("SELECT id FROM buckets WHERE name = ?")?
            .query_row([&bucket.name], |row| row.get(0))
            .optional()?;
        match existing {
            Some(id) => {
                bucket_map.insert(bucket.id, id);
                report.buckets.skipped += 1;
            }
            None => {
                let id = bucket_store::insert_bucket_tx(
                    tx,
                    &CreateBucket {
                        name: bucket.name.clone(),
                        kind: bucket.kind,
                        config: Some(bucket.config.clone()),
                    },
                )?;
                bucket_map.insert(bucket.id, id);
                report.buckets.imported += 1;
            }
        }
    }

    // Tasks, first pass: insert with fresh ids and empty dependency lists;
    // edges are rewritten once the full source -> new id map exists.
    let mut task_map: HashMap<i64, i64> = HashMap::new();
    for task in &data.tasks {
        let mut t = task.clone();
        t.bucket_id = t.bucket_id.and_then(|old| bucket_map.get(&old).copied());
        t.dependencies = Vec::new();
        match task_store::insert_task_tx(tx, &t) {
            Ok(new_id) => {
                task_map.insert(task.id, new_id);
                report.tasks.imported += 1;
            }
            Err(e) => {
                tracing::warn!("skipping task {} ('{}'): {}", task.id, task.title, e);
                report.tasks.skipped += 1;
            }
        }
    }

    // Second pass: remap dependency edges within the import.
    for task in &data.tasks {
        let Some(new_id) = task_map.get(&task.id) else {
            continue;
        };
        let mapped: Vec<i64> = task
            .dependencies
            .iter()
            .filter_map(|old| {
                let new = task_map.get(old).copied();
                if new.is_none() {
                    tracing::warn!(
                        "dropping dependency {} of imported task {}: not in import",
                        old,
                        task.id
                    );
                }
                new
            })
            .collect();
        if !mapped.is_empty() {
            let mut stored = task_store::get_task_tx(tx, *new_id)?;
            stored.dependencies = mapped;
            task_store::update_task_row_tx(tx, &stored)?;
        }
        graph::cascade_on_create_or_update(tx, *new_id, now)?;
    }

    for completion in &data.completions {
        match task_map.get(&completion.task_id) {
            Some(new_task_id) => {
                let mut c = completion.clone();
                c.task_id = *new_task_id;
                match completion_store::insert_completion_row_tx(tx, &c, false) {
                    Ok(_) => report.completions.imported += 1,
                    Err(e) => {
                        tracing::warn!("skipping completion {}: {}", completion.id, e);
                        report.completions.skipped += 1;
                    }
                }
            }
            None => report.completions.skipped += 1,
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tasks::create_task;
    use crate::db::models::{BucketKind, CreateBucket, CreateTask, TaskStatus};
    use crate::lifecycle;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn now() -> DateTime<Utc> {
        utc(2025, 1, 1, 9, 0)
    }

    fn seeded_store() -> Database {
        let db = Database::open_in_memory().unwrap();
        let bucket = db
            .create_bucket(&CreateBucket {
                name: "Work".into(),
                kind: BucketKind::Project,
                config: None,
            })
            .unwrap();

        let a = create_task(
            &db,
            CreateTask {
                title: "first".into(),
                bucket_id: Some(bucket.id),
                tags: vec!["alpha".into()],
                estimate_minutes: Some(30),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        create_task(
            &db,
            CreateTask {
                title: "second".into(),
                dependencies: vec![a.id],
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        lifecycle::complete(&db, a.id, utc(2025, 1, 2, 10, 0), Some(28)).unwrap();
        db
    }

    #[test]
    fn replace_round_trips_the_store() {
        let source = seeded_store();
        let data = export(&source, utc(2025, 1, 3, 0, 0)).unwrap();
        assert_eq!(data.version, DATA_VERSION);

        let target = Database::open_in_memory().unwrap();
        let report = import(&target, &data, ImportMode::Replace, now()).unwrap();
        assert_eq!(report.tasks, ImportCounts { imported: 2, skipped: 0 });
        assert_eq!(report.buckets, ImportCounts { imported: 1, skipped: 0 });
        assert_eq!(
            report.completions,
            ImportCounts { imported: 1, skipped: 0 }
        );

        assert_eq!(target.all_tasks().unwrap(), source.all_tasks().unwrap());
        assert_eq!(target.list_buckets().unwrap(), source.list_buckets().unwrap());
        assert_eq!(
            target.all_completions().unwrap(),
            source.all_completions().unwrap()
        );
    }

    #[test]
    fn replace_wipes_existing_data() {
        let source = seeded_store();
        let data = export(&source, utc(2025, 1, 3, 0, 0)).unwrap();

        let target = Database::open_in_memory().unwrap();
        create_task(
            &target,
            CreateTask {
                title: "pre-existing".into(),
                ..Default::default()
            },
            now(),
        )
        .unwrap();

        import(&target, &data, ImportMode::Replace, now()).unwrap();
        let titles: Vec<String> = target
            .all_tasks()
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn merge_reallocates_ids_and_remaps_dependencies() {
        let source = seeded_store();
        let data = export(&source, utc(2025, 1, 3, 0, 0)).unwrap();

        let target = Database::open_in_memory().unwrap();
        // Occupy the low ids so the import cannot collide silently.
        for i in 0..3 {
            create_task(
                &target,
                CreateTask {
                    title: format!("existing {}", i),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        }

        let report = import(&target, &data, ImportMode::Merge, now()).unwrap();
        assert_eq!(report.tasks.imported, 2);

        let tasks = target.all_tasks().unwrap();
        assert_eq!(tasks.len(), 5);

        let first = tasks.iter().find(|t| t.title == "first").unwrap();
        let second = tasks.iter().find(|t| t.title == "second").unwrap();
        assert!(first.id > 3);
        assert_eq!(second.dependencies, vec![first.id]);
        // The dependency is completed in the source, so the import keeps
        // the dependent actionable.
        assert_eq!(first.status, TaskStatus::Completed);
        assert_eq!(second.status, TaskStatus::Open);

        // The completion row follows its remapped task.
        let completions = target.all_completions().unwrap();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].task_id, first.id);
    }

    #[test]
    fn merge_keeps_existing_bucket_on_name_collision() {
        let source = seeded_store();
        let data = export(&source, utc(2025, 1, 3, 0, 0)).unwrap();

        let target = Database::open_in_memory().unwrap();
        let existing = target
            .create_bucket(&CreateBucket {
                name: "Work".into(),
                kind: BucketKind::Category,
                config: None,
            })
            .unwrap();

        let report = import(&target, &data, ImportMode::Merge, now()).unwrap();
        assert_eq!(report.buckets, ImportCounts { imported: 0, skipped: 1 });

        let first = target
            .all_tasks()
            .unwrap()
            .into_iter()
            .find(|t| t.title == "first")
            .unwrap();
        assert_eq!(first.bucket_id, Some(existing.id));
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let db = Database::open_in_memory().unwrap();
        let data = ExportData {
            version: "9.9.9".into(),
            exported_at: now(),
            tasks: vec![],
            buckets: vec![],
            completions: vec![],
        };
        let err = import(&db, &data, ImportMode::Replace, now()).unwrap_err();
        assert!(matches!(err, DbError::Unsupported(_)));
    }

    #[test]
    fn import_mode_parse() {
        assert_eq!(ImportMode::parse("replace").unwrap(), ImportMode::Replace);
        assert_eq!(ImportMode::parse("merge").unwrap(), ImportMode::Merge);
        assert!(matches!(
            ImportMode::parse("upsert"),
            Err(DbError::Unsupported(_))
        ));
    }
}
