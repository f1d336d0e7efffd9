//! Completion orchestrator: wires a completion into the recurrence engine,
//! the completion log, and the dependency cascade in one transaction.

use chrono::{DateTime, Utc};

use crate::db::models::{Task, TaskStatus};
use crate::db::{completions, tasks as task_store, Database, DbError};
use crate::graph;
use crate::recurrence;

/// Complete a task at `at`.
///
/// Non-recurring tasks transition to Completed. Recurring tasks never do:
/// completion advances `last_completed_at` and `next_due_at` and leaves the
/// task Open. Either way a Completion row is logged and dependents whose
/// last unmet dependency this was are unblocked, all in the same
/// transaction.
pub fn complete(
    db: &Database,
    task_id: i64,
    at: DateTime<Utc>,
    actual_minutes: Option<i64>,
) -> Result<Task, DbError> {
    db.with_tx(|tx| {
        let mut task = task_store::get_task_tx(tx, task_id)?;

        completions::insert_completion_tx(
            tx,
            task_id,
            at,
            actual_minutes,
            task.estimate_minutes,
        )?;

        task.last_completed_at = Some(at);
        match &task.recurrence {
            Some(pattern) => {
                task.next_due_at =
                    Some(recurrence::next_due(pattern, Some(at), task.created_at, at)?);
                task.status = TaskStatus::Open;
            }
            None => {
                task.status = TaskStatus::Completed;
            }
        }
        task.updated_at = at;
        task_store::update_task_row_tx(tx, &task)?;

        graph::cascade_on_complete(tx, task_id, at)?;

        tracing::info!("completed task {} ({})", task_id, task.title);
        task_store::get_task_tx(tx, task_id)
    })
}

/// Return a Completed task to Open, then re-derive Blocked from its
/// dependency picture.
pub fn reopen(db: &Database, task_id: i64, at: DateTime<Utc>) -> Result<Task, DbError> {
    db.with_tx(|tx| {
        let task = task_store::get_task_tx(tx, task_id)?;
        if task.status != TaskStatus::Completed {
            return Err(DbError::Validation(format!(
                "task {} is not completed",
                task_id
            )));
        }

        task_store::set_status_tx(tx, task_id, TaskStatus::Open, at)?;
        graph::cascade_on_create_or_update(tx, task_id, at)?;

        // Reopening may re-block dependents that were only open because
        // this task counted as done.
        let all = task_store::list_tasks_tx(tx)?;
        for dependent in graph::dependents_of(task_id, &all) {
            graph::cascade_on_create_or_update(tx, dependent, at)?;
        }

        task_store::get_task_tx(tx, task_id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::CurveConfig;
    use crate::recurrence::{RecurrenceKind, RecurrenceMode, RecurrencePattern};
    use chrono::{Datelike, TimeZone};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn base_task(title: &str) -> Task {
        let created = utc(2025, 1, 1, 8, 0);
        Task {
            id: 0,
            title: title.to_string(),
            project: None,
            bucket_id: None,
            tags: vec![],
            deadline: None,
            estimate_minutes: Some(45),
            recurrence: None,
            window_start: None,
            window_end: None,
            dependencies: vec![],
            curve: CurveConfig::Linear {
                start_date: created,
                deadline: utc(2025, 1, 8, 8, 0),
            },
            status: TaskStatus::Open,
            last_completed_at: None,
            next_due_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn insert(db: &Database, t: &Task) -> i64 {
        db.with_tx(|tx| task_store::insert_task_tx(tx, t)).unwrap()
    }

    #[test]
    fn complete_non_recurring_terminates() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db, &base_task("one-shot"));

        let at = utc(2025, 1, 5, 14, 20);
        let task = complete(&db, id, at, Some(50)).unwrap();

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.last_completed_at, Some(at));
        assert_eq!(task.next_due_at, None);

        let log = db.completions_for_task(id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].scheduled_minutes, Some(45));
        assert_eq!(log[0].actual_minutes, Some(50));
        assert_eq!(log[0].hour_of_day, 14);
    }

    #[test]
    fn complete_recurring_advances_and_stays_open() {
        let db = Database::open_in_memory().unwrap();
        let mut t = base_task("weekly review");
        t.recurrence = Some(RecurrencePattern {
            mode: RecurrenceMode::Calendar,
            kind: RecurrenceKind::Weekly,
            interval: None,
            unit: None,
            day_of_week: Some(1),
            days_of_week: None,
            time_of_day: None,
            anchor: None,
        });
        let id = insert(&db, &t);

        // Completed on Wednesday 2025-01-08; next Monday is 2025-01-13.
        let at = utc(2025, 1, 8, 10, 0);
        let task = complete(&db, id, at, None).unwrap();

        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.last_completed_at, Some(at));
        let due = task.next_due_at.unwrap();
        assert_eq!(due.date_naive(), utc(2025, 1, 13, 0, 0).date_naive());
        assert_eq!(due.weekday().num_days_from_sunday(), 1);
        assert!(due > at);

        // The completion is still logged.
        assert_eq!(db.completions_for_task(id).unwrap().len(), 1);
    }

    #[test]
    fn completing_last_dependency_unblocks_in_same_transaction() {
        let db = Database::open_in_memory().unwrap();
        let dep = insert(&db, &base_task("dep"));
        let mut waiting = base_task("waiting");
        waiting.dependencies = vec![dep];
        waiting.status = TaskStatus::Blocked;
        let blocked_id = insert(&db, &waiting);

        complete(&db, dep, utc(2025, 1, 5, 9, 0), None).unwrap();

        assert_eq!(db.get_task(blocked_id).unwrap().status, TaskStatus::Open);
    }

    #[test]
    fn complete_missing_task_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let err = complete(&db, 99, utc(2025, 1, 5, 9, 0), None).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
        // Nothing was logged by the rolled-back transaction.
        assert!(db.all_completions().unwrap().is_empty());
    }

    #[test]
    fn reopen_returns_to_open() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db, &base_task("again"));
        complete(&db, id, utc(2025, 1, 5, 9, 0), None).unwrap();

        let task = reopen(&db, id, utc(2025, 1, 6, 9, 0)).unwrap();
        assert_eq!(task.status, TaskStatus::Open);
    }

    #[test]
    fn reopen_non_completed_is_validation() {
        let db = Database::open_in_memory().unwrap();
        let id = insert(&db, &base_task("open"));
        let err = reopen(&db, id, utc(2025, 1, 6, 9, 0)).unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn reopen_reblocks_dependents() {
        let db = Database::open_in_memory().unwrap();
        let dep = insert(&db, &base_task("dep"));
        let mut waiting = base_task("waiting");
        waiting.dependencies = vec![dep];
        waiting.status = TaskStatus::Blocked;
        let waiting_id = insert(&db, &waiting);

        complete(&db, dep, utc(2025, 1, 5, 9, 0), None).unwrap();
        assert_eq!(db.get_task(waiting_id).unwrap().status, TaskStatus::Open);

        reopen(&db, dep, utc(2025, 1, 6, 9, 0)).unwrap();
        assert_eq!(db.get_task(waiting_id).unwrap().status, TaskStatus::Blocked);
    }
}
