//! Daily planner: orders actionable tasks by urgency and packs them into
//! time slots within the working day.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use crate::curve::rank_by_priority;
use crate::db::models::Task;
use crate::db::DbError;

#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub limit: usize,
    pub include_time_blocks: bool,
    pub work_hours_start: NaiveTime,
    pub work_hours_end: NaiveTime,
    /// Used when a task has no estimate; such slots are flagged.
    pub default_estimate_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnscheduledReason {
    /// The task's time window leaves no gap large enough for its estimate.
    NoFittingSlot,
    /// The working day has no remaining room for the estimate.
    InsufficientTime,
}

impl UnscheduledReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnscheduledReason::NoFittingSlot => "no fitting slot",
            UnscheduledReason::InsufficientTime => "insufficient time",
        }
    }
}

/// Half-open interval [start, end) assigned to one task.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub task: Task,
    pub slot: Option<Slot>,
    pub estimate_minutes: i64,
    pub is_default_estimate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnscheduledTask {
    pub task: Task,
    pub reason: UnscheduledReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub scheduled: Vec<ScheduledTask>,
    pub unscheduled: Vec<UnscheduledTask>,
    #[serde(with = "work_hours_serde")]
    pub work_hours: (NaiveTime, NaiveTime),
    pub total_scheduled_minutes: i64,
    pub remaining_minutes: i64,
}

mod work_hours_serde {
    use chrono::NaiveTime;
    use serde::{ser::SerializeStruct, Serializer};

    pub fn serialize<S: Serializer>(
        v: &(NaiveTime, NaiveTime),
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        let mut s = ser.serialize_struct("WorkHours", 2)?;
        s.serialize_field("start", &crate::db::models::format_hhmm(v.0))?;
        s.serialize_field("end", &crate::db::models::format_hhmm(v.1))?;
        s.end()
    }
}

fn minutes_of(t: NaiveTime) -> i64 {
    t.hour() as i64 * 60 + t.minute() as i64
}

/// Overlap of a task's time-of-day window with the working window, as
/// minute intervals within the planned day. A midnight-crossing window
/// contributes its evening and morning sides separately.
fn window_overlap(
    work: (i64, i64),
    window_start: NaiveTime,
    window_end: NaiveTime,
) -> Vec<(i64, i64)> {
    let (ws, we) = work;
    let s = minutes_of(window_start);
    let e = minutes_of(window_end);

    let raw: Vec<(i64, i64)> = if s <= e {
        vec![(s, e)]
    } else {
        vec![(0, e), (s, 24 * 60)]
    };

    raw.into_iter()
        .filter_map(|(a, b)| {
            let lo = a.max(ws);
            let hi = b.min(we);
            (lo < hi).then_some((lo, hi))
        })
        .collect()
}

/// Earliest placement of `estimate` minutes that fits both a free gap and
/// one of the allowed segments.
fn find_placement(
    gaps: &[(i64, i64)],
    allowed: &[(i64, i64)],
    estimate: i64,
) -> Option<(i64, i64)> {
    let mut best: Option<(i64, i64)> = None;
    for &(gap_lo, gap_hi) in gaps {
        for &(seg_lo, seg_hi) in allowed {
            let lo = gap_lo.max(seg_lo);
            let hi = gap_hi.min(seg_hi);
            if hi - lo >= estimate {
                let candidate = (lo, lo + estimate);
                if best.map(|b| candidate.0 < b.0).unwrap_or(true) {
                    best = Some(candidate);
                }
            }
        }
    }
    best
}

/// Carve a placed slot out of the free-gap list, keeping it sorted.
fn occupy(gaps: &mut Vec<(i64, i64)>, slot: (i64, i64)) {
    let mut next = Vec::with_capacity(gaps.len() + 1);
    for &(lo, hi) in gaps.iter() {
        if slot.1 <= lo || slot.0 >= hi {
            next.push((lo, hi));
            continue;
        }
        if slot.0 > lo {
            next.push((lo, slot.0));
        }
        if slot.1 < hi {
            next.push((slot.1, hi));
        }
    }
    *gaps = next;
}

fn slot_instant(date: NaiveDate, minutes: i64) -> DateTime<Utc> {
    let t = NaiveTime::from_num_seconds_from_midnight_opt(minutes as u32 * 60, 0)
        .expect("minutes within a day");
    date.and_time(t).and_utc()
}

/// Build the plan for `date`. Candidates are the Open, non-Blocked tasks
/// whose priority at `at` is above zero, in descending priority order;
/// packing is greedy over a free-gap list within the working window.
pub fn plan_day(
    tasks: &[Task],
    date: NaiveDate,
    at: DateTime<Utc>,
    options: &PlanOptions,
) -> Result<DayPlan, DbError> {
    let work = (
        minutes_of(options.work_hours_start),
        minutes_of(options.work_hours_end),
    );
    if work.0 >= work.1 {
        return Err(DbError::Validation(
            "work hours start must be before end".into(),
        ));
    }
    let working_minutes = work.1 - work.0;

    let mut candidates = rank_by_priority(tasks, None, at);
    candidates.retain(|r| r.priority > 0.0);
    candidates.truncate(options.limit);

    let mut scheduled = Vec::new();
    let mut unscheduled = Vec::new();
    let mut total_scheduled = 0i64;
    let mut gaps: Vec<(i64, i64)> = vec![work];

    for ranked in candidates {
        let task = ranked.task;
        let (estimate, is_default) = match task.estimate_minutes {
            Some(m) => (m, false),
            None => (options.default_estimate_minutes, true),
        };

        if !options.include_time_blocks {
            total_scheduled += estimate;
            scheduled.push(ScheduledTask {
                task,
                slot: None,
                estimate_minutes: estimate,
                is_default_estimate: is_default,
            });
            continue;
        }

        let allowed: Vec<(i64, i64)> = match (task.window_start, task.window_end) {
            (Some(ws), Some(we)) => window_overlap(work, ws, we),
            _ => vec![work],
        };

        match find_placement(&gaps, &allowed, estimate) {
            Some(slot) => {
                occupy(&mut gaps, slot);
                total_scheduled += estimate;
                scheduled.push(ScheduledTask {
                    task,
                    slot: Some(Slot {
                        start: slot_instant(date, slot.0),
                        end: slot_instant(date, slot.1),
                    }),
                    estimate_minutes: estimate,
                    is_default_estimate: is_default,
                });
            }
            None => {
                let reason = if task.has_window() {
                    UnscheduledReason::NoFittingSlot
                } else {
                    UnscheduledReason::InsufficientTime
                };
                unscheduled.push(UnscheduledTask { task, reason });
            }
        }
    }

    Ok(DayPlan {
        date,
        scheduled,
        unscheduled,
        work_hours: (options.work_hours_start, options.work_hours_end),
        total_scheduled_minutes: total_scheduled,
        remaining_minutes: working_minutes - total_scheduled,
    })
}
