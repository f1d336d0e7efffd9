//! Task services: creation (with curve inference and dependency
//! validation), partial update, and protected delete.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::curve;
use crate::db::models::{CreateTask, ParsedTask, Task, TaskStatus, UpdateTask};
use crate::db::{tasks as task_store, Database, DbError};
use crate::graph;
use crate::recurrence;

fn validate_title(title: &str) -> Result<(), DbError> {
    if title.trim().is_empty() {
        return Err(DbError::Validation("title cannot be empty".into()));
    }
    if title.chars().count() > 500 {
        return Err(DbError::Validation("title exceeds 500 characters".into()));
    }
    Ok(())
}

fn validate_estimate(estimate: Option<i64>) -> Result<(), DbError> {
    if let Some(m) = estimate {
        if m <= 0 {
            return Err(DbError::Validation(format!(
                "estimate must be positive, got {}",
                m
            )));
        }
    }
    Ok(())
}

fn validate_window(task: &Task) -> Result<(), DbError> {
    match (task.window_start, task.window_end) {
        (Some(s), Some(e)) if s == e => Err(DbError::Validation(
            "window start and end must differ".into(),
        )),
        (Some(_), None) | (None, Some(_)) => Err(DbError::Validation(
            "time window needs both start and end".into(),
        )),
        _ => Ok(()),
    }
}

/// Create a task. Runs in one transaction: dependency validation against
/// the live task set, curve inference/validation, next-due initialization
/// for recurring tasks, and the initial Blocked/Open status (I3).
pub fn create_task(db: &Database, req: CreateTask, now: DateTime<Utc>) -> Result<Task, DbError> {
    validate_title(&req.title)?;
    validate_estimate(req.estimate_minutes)?;
    if let Some(pattern) = &req.recurrence {
        pattern.validate()?;
    }

    let defaults = db.defaults()?;
    let curve = match req.curve.clone() {
        Some(c) => c,
        None => curve::infer_curve(&req, &defaults.curve_type, now),
    };
    curve.validate(req.recurrence.is_some())?;

    // Recurring tasks carry a due instant from the start, anchored at
    // creation as if the task had just been completed.
    let next_due_at = match &req.recurrence {
        Some(pattern) => Some(recurrence::next_due(pattern, Some(now), now, now)?),
        None => None,
    };

    db.with_tx(|tx| {
        let all = task_store::list_tasks_tx(tx)?;
        let by_id: HashMap<i64, Task> = all.iter().cloned().map(|t| (t.id, t)).collect();
        graph::validate_dependencies(0, &req.dependencies, &by_id)?;

        let status_of: HashMap<i64, TaskStatus> =
            all.iter().map(|t| (t.id, t.status)).collect();

        let mut task = Task {
            id: 0,
            title: req.title.trim().to_string(),
            project: req.project.clone(),
            bucket_id: req.bucket_id,
            tags: req.tags.clone(),
            deadline: req.deadline,
            estimate_minutes: req.estimate_minutes,
            recurrence: req.recurrence.clone(),
            window_start: req.window_start,
            window_end: req.window_end,
            dependencies: req.dependencies.clone(),
            curve: curve.clone(),
            status: TaskStatus::Open,
            last_completed_at: None,
            next_due_at,
            created_at: now,
            updated_at: now,
        };
        validate_window(&task)?;
        if graph::has_incomplete_dependency(&task, &status_of) {
            task.status = TaskStatus::Blocked;
        }

        if let Some(bucket_id) = task.bucket_id {
            crate::db::buckets::get_bucket_tx(tx, bucket_id)?;
        }

        let id = task_store::insert_task_tx(tx, &task)?;
        task_store::get_task_tx(tx, id)
    })
}

/// Consume the external parser's output. An unresolvable bucket name is
/// downgraded to "no bucket" with a warning rather than failing creation.
pub fn create_from_parsed(
    db: &Database,
    parsed: ParsedTask,
    now: DateTime<Utc>,
) -> Result<Task, DbError> {
    let bucket_id = match &parsed.bucket_name {
        Some(name) => match db.find_bucket_by_name(name)? {
            Some(bucket) => Some(bucket.id),
            None => {
                tracing::warn!("unknown bucket '{}'; creating task without one", name);
                None
            }
        },
        None => None,
    };

    create_task(
        db,
        CreateTask {
            title: parsed.title,
            project: parsed.project,
            bucket_id,
            tags: parsed.tags,
            deadline: parsed.deadline,
            estimate_minutes: parsed.duration_minutes,
            recurrence: parsed.recurrence,
            window_start: parsed.window_start,
            window_end: parsed.window_end,
            dependencies: parsed.dependencies,
            curve: None,
        },
        now,
    )
}

/// Apply a partial update, then re-derive the Blocked/Open status. Status
/// may only be set to Open or InProgress here; Completed and Blocked are
/// owned by the lifecycle orchestrator and the resolver.
pub fn update_task(
    db: &Database,
    task_id: i64,
    updates: UpdateTask,
    now: DateTime<Utc>,
) -> Result<Task, DbError> {
    if let Some(status) = updates.status {
        if matches!(status, TaskStatus::Completed | TaskStatus::Blocked) {
            return Err(DbError::Validation(format!(
                "status cannot be set to {} directly",
                status.as_str()
            )));
        }
    }

    db.with_tx(|tx| {
        let mut task = task_store::get_task_tx(tx, task_id)?;

        if let Some(title) = updates.title {
            validate_title(&title)?;
            task.title = title.trim().to_string();
        }
        if let Some(project) = updates.project {
            task.project = project;
        }
        if let Some(bucket_id) = updates.bucket_id {
            if let Some(id) = bucket_id {
                crate::db::buckets::get_bucket_tx(tx, id)?;
            }
            task.bucket_id = bucket_id;
        }
        if let Some(tags) = updates.tags {
            task.tags = tags;
        }
        if let Some(deadline) = updates.deadline {
            task.deadline = deadline;
        }
        if let Some(estimate) = updates.estimate_minutes {
            validate_estimate(estimate)?;
            task.estimate_minutes = estimate;
        }
        if let Some(recurrence) = updates.recurrence {
            match &recurrence {
                Some(pattern) => {
                    pattern.validate()?;
                    task.next_due_at = Some(recurrence::next_due(
                        pattern,
                        task.last_completed_at.or(Some(now)),
                        task.created_at,
                        now,
                    )?);
                }
                None => task.next_due_at = None,
            }
            task.recurrence = recurrence;
        }
        if let Some(window) = updates.window {
            match window {
                Some((start, end)) => {
                    task.window_start = Some(start);
                    task.window_end = Some(end);
                }
                None => {
                    task.window_start = None;
                    task.window_end = None;
                }
            }
        }
        if let Some(dependencies) = updates.dependencies {
            let all = task_store::list_tasks_tx(tx)?;
            let by_id: HashMap<i64, Task> =
                all.into_iter().map(|t| (t.id, t)).collect();
            graph::validate_dependencies(task_id, &dependencies, &by_id)?;
            task.dependencies = dependencies;
        }
        if let Some(curve) = updates.curve {
            task.curve = curve;
        }
        if let Some(status) = updates.status {
            task.status = status;
        }

        validate_window(&task)?;
        task.curve.validate(task.recurrence.is_some())?;

        task.updated_at = now;
        task_store::update_task_row_tx(tx, &task)?;
        graph::cascade_on_create_or_update(tx, task_id, now)?;

        task_store::get_task_tx(tx, task_id)
    })
}

/// Delete a task. Refused with the referencing id list while other tasks
/// depend on it; `force` strips the edge from those dependents and
/// re-derives their status instead (I7).
pub fn delete_task(
    db: &Database,
    task_id: i64,
    force: bool,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    db.with_tx(|tx| {
        task_store::get_task_tx(tx, task_id)?;
        let all = task_store::list_tasks_tx(tx)?;
        let dependents = graph::dependents_of(task_id, &all);

        if !dependents.is_empty() && !force {
            return Err(DbError::HasDependents {
                id: task_id,
                dependents,
            });
        }

        for dependent_id in &dependents {
            let mut dependent = task_store::get_task_tx(tx, *dependent_id)?;
            dependent.dependencies.retain(|d| *d != task_id);
            dependent.updated_at = now;
            task_store::update_task_row_tx(tx, &dependent)?;
        }

        task_store::delete_task_tx(tx, task_id)?;

        for dependent_id in &dependents {
            graph::cascade_on_create_or_update(tx, *dependent_id, now)?;
        }
        Ok(())
    })
}
