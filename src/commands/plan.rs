//! Read-side services: priority ranking, urgency timelines, and the daily
//! plan, all over a consistent snapshot of the task set.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::curve::{self, RankedTask, TimelinePoint};
use crate::db::{Database, DbError};
use crate::planner::{self, DayPlan, PlanOptions};

/// Open tasks ranked by urgency at `at`.
pub fn priorities(
    db: &Database,
    limit: Option<usize>,
    at: DateTime<Utc>,
) -> Result<Vec<RankedTask>, DbError> {
    let tasks = db.all_tasks()?;
    Ok(curve::rank_by_priority(&tasks, limit, at))
}

/// Sample one task's urgency trajectory from `from` over `days` days.
pub fn timeline(
    db: &Database,
    task_id: i64,
    from: DateTime<Utc>,
    days: u32,
) -> Result<Vec<TimelinePoint>, DbError> {
    let tasks = db.all_tasks()?;
    let task = tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| DbError::NotFound(format!("Task {}", task_id)))?;
    let dep_status = tasks.iter().map(|t| (t.id, t.status)).collect();
    Ok(curve::timeline(task, &dep_status, from, days, 4))
}

/// Per-invocation overrides for the plan command; anything unset falls
/// back to the stored defaults.
#[derive(Debug, Clone, Default)]
pub struct PlanOverrides {
    pub limit: Option<usize>,
    pub include_time_blocks: bool,
    pub work_hours_start: Option<NaiveTime>,
    pub work_hours_end: Option<NaiveTime>,
}

pub fn plan_day(
    db: &Database,
    date: NaiveDate,
    at: DateTime<Utc>,
    overrides: &PlanOverrides,
) -> Result<DayPlan, DbError> {
    let defaults = db.defaults()?;
    let options = PlanOptions {
        limit: overrides.limit.unwrap_or(usize::MAX),
        include_time_blocks: overrides.include_time_blocks,
        work_hours_start: overrides
            .work_hours_start
            .unwrap_or(defaults.work_hours_start),
        work_hours_end: overrides.work_hours_end.unwrap_or(defaults.work_hours_end),
        default_estimate_minutes: defaults.default_estimate_minutes,
    };
    let tasks = db.all_tasks()?;
    planner::plan_day(&tasks, date, at, &options)
}
