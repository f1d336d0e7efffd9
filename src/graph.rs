//! Dependency resolver: cycle detection, blocked-status maintenance, and
//! cascading unblocks.
//!
//! Tasks store forward dependency ids only; dependents are always derived
//! by reverse scan so that delete protection can see the full picture in
//! one transaction.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db::models::{Task, TaskStatus};
use crate::db::{tasks as task_store, DbError};

/// Validate a proposed dependency list for `task_id` against the current
/// task set: no self-loop, no duplicates, every id must exist, and adding
/// the edges must not close a cycle.
pub fn validate_dependencies(
    task_id: i64,
    proposed: &[i64],
    tasks: &HashMap<i64, Task>,
) -> Result<(), DbError> {
    if proposed.contains(&task_id) {
        return Err(DbError::CircularDependency(format!(
            "task {} cannot depend on itself",
            task_id
        )));
    }

    let mut seen = HashSet::new();
    for dep in proposed {
        if !seen.insert(*dep) {
            return Err(DbError::Validation(format!(
                "duplicate dependency on task {}",
                dep
            )));
        }
        if !tasks.contains_key(dep) {
            return Err(DbError::Validation(format!(
                "dependency task {} does not exist",
                dep
            )));
        }
    }

    // BFS from the proposed dependencies through stored forward edges. If
    // the frontier ever reaches task_id, the new edges would close a cycle.
    let mut queue: VecDeque<i64> = proposed.iter().copied().collect();
    let mut visited: HashSet<i64> = proposed.iter().copied().collect();
    while let Some(current) = queue.pop_front() {
        let Some(task) = tasks.get(&current) else {
            continue;
        };
        for next in &task.dependencies {
            if *next == task_id {
                return Err(DbError::CircularDependency(format!(
                    "task {} -> task {} closes a cycle",
                    current, task_id
                )));
            }
            if visited.insert(*next) {
                queue.push_back(*next);
            }
        }
    }

    Ok(())
}

/// Ids of tasks that list `task_id` as a dependency, ascending.
pub fn dependents_of(task_id: i64, tasks: &[Task]) -> Vec<i64> {
    let mut ids: Vec<i64> = tasks
        .iter()
        .filter(|t| t.dependencies.contains(&task_id))
        .map(|t| t.id)
        .collect();
    ids.sort_unstable();
    ids
}

/// True when the task has at least one dependency that is not Completed.
/// A dependency missing from the snapshot counts as incomplete.
pub fn has_incomplete_dependency(
    task: &Task,
    status_of: &HashMap<i64, TaskStatus>,
) -> bool {
    !task.dependencies.is_empty()
        && task
            .dependencies
            .iter()
            .any(|id| status_of.get(id) != Some(&TaskStatus::Completed))
}

/// Status a task should hold given its dependency picture (I3). Completed
/// is terminal and never demoted; anything else with an unmet dependency
/// is Blocked; a Blocked task whose dependencies cleared becomes Open.
pub fn resolved_status(current: TaskStatus, blocked: bool) -> TaskStatus {
    if current == TaskStatus::Completed {
        return current;
    }
    if blocked {
        TaskStatus::Blocked
    } else if current == TaskStatus::Blocked {
        TaskStatus::Open
    } else {
        current
    }
}

/// After `completed_id` finishes: every Blocked task whose dependencies are
/// now all Completed transitions to Open. Runs inside the caller's
/// transaction; returns the unblocked ids.
pub fn cascade_on_complete(
    conn: &Connection,
    completed_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, DbError> {
    let all = task_store::list_tasks_tx(conn)?;
    let status_of: HashMap<i64, TaskStatus> = all.iter().map(|t| (t.id, t.status)).collect();

    let mut unblocked = Vec::new();
    for task in all.iter().filter(|t| t.dependencies.contains(&completed_id)) {
        if task.status == TaskStatus::Blocked && !has_incomplete_dependency(task, &status_of) {
            task_store::set_status_tx(conn, task.id, TaskStatus::Open, now)?;
            unblocked.push(task.id);
        }
    }
    if !unblocked.is_empty() {
        tracing::debug!(
            "completing task {} unblocked tasks {:?}",
            completed_id,
            unblocked
        );
    }
    Ok(unblocked)
}

/// Re-derive one task's Blocked/Open status from its dependency picture
/// (I3). Runs inside the caller's transaction; returns the status now held.
pub fn cascade_on_create_or_update(
    conn: &Connection,
    task_id: i64,
    now: DateTime<Utc>,
) -> Result<TaskStatus, DbError> {
    let all = task_store::list_tasks_tx(conn)?;
    let status_of: HashMap<i64, TaskStatus> = all.iter().map(|t| (t.id, t.status)).collect();
    let task = all
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| DbError::NotFound(format!("Task {}", task_id)))?;

    let next = resolved_status(task.status, has_incomplete_dependency(task, &status_of));
    if next != task.status {
        task_store::set_status_tx(conn, task_id, next, now)?;
    }
    Ok(next)
}
