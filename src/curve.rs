//! Priority curve family and evaluator.
//!
//! A curve answers one question: how urgent is this task at instant `t`?
//! Values in [0, 1) mean inside the active range, exactly 1.0 means due,
//! and anything above 1.0 is overdue. The evaluator is a pure function of
//! the task snapshot, the evaluation instant, and a dependency-status
//! snapshot; it never reads the wall clock.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Task, TaskStatus};
use crate::db::DbError;
use crate::recurrence::RecurrenceMode;

const MS_PER_DAY: f64 = 86_400_000.0;

fn default_exponent() -> f64 {
    2.0
}

fn default_window_priority() -> f64 {
    1.0
}

fn default_buildup_rate() -> f64 {
    0.1
}

/// Closed curve family. Dispatch is exhaustive: a new variant forces every
/// handler below to be updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CurveConfig {
    /// Linear rise from `start_date` to `deadline`, then a linear overdue
    /// tail with the same slope.
    Linear {
        start_date: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },
    /// Like Linear inside the interval but raised to `exponent`; the
    /// overdue tail stays linear.
    Exponential {
        start_date: DateTime<Utc>,
        deadline: DateTime<Utc>,
        #[serde(default = "default_exponent")]
        exponent: f64,
    },
    /// Constant `priority` inside [window_start, window_end], zero outside.
    HardWindow {
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        #[serde(default = "default_window_priority")]
        priority: f64,
    },
    /// Zero until every dependency of the task completes, then defers to
    /// the wrapped curve. The task-level dependency list is authoritative;
    /// this variant carries no list of its own.
    Blocked { then_curve: Box<CurveConfig> },
    /// Urgency accumulates against the task's recurrence cadence.
    Accumulator {
        #[serde(default = "default_buildup_rate")]
        buildup_rate: f64,
    },
}

impl CurveConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            CurveConfig::Linear { .. } => "linear",
            CurveConfig::Exponential { .. } => "exponential",
            CurveConfig::HardWindow { .. } => "hard_window",
            CurveConfig::Blocked { .. } => "blocked",
            CurveConfig::Accumulator { .. } => "accumulator",
        }
    }

    /// Structural validation (I8). `has_recurrence` ties the Accumulator
    /// variant to the task it is attached to.
    pub fn validate(&self, has_recurrence: bool) -> Result<(), DbError> {
        match self {
            CurveConfig::Linear { start_date, deadline } => {
                if deadline <= start_date {
                    return Err(DbError::Validation(
                        "curve deadline must be after start_date".into(),
                    ));
                }
            }
            CurveConfig::Exponential {
                start_date,
                deadline,
                exponent,
            } => {
                if deadline <= start_date {
                    return Err(DbError::Validation(
                        "curve deadline must be after start_date".into(),
                    ));
                }
                if !(1.0..=5.0).contains(exponent) {
                    return Err(DbError::Validation(format!(
                        "curve exponent must be within [1, 5], got {}",
                        exponent
                    )));
                }
            }
            CurveConfig::HardWindow {
                window_start,
                window_end,
                priority,
            } => {
                if window_start == window_end {
                    return Err(DbError::Validation(
                        "hard window start and end must differ".into(),
                    ));
                }
                if !(0.0..=2.0).contains(priority) {
                    return Err(DbError::Validation(format!(
                        "hard window priority must be within [0, 2], got {}",
                        priority
                    )));
                }
            }
            CurveConfig::Blocked { then_curve } => {
                if matches!(**then_curve, CurveConfig::Blocked { .. }) {
                    return Err(DbError::Validation(
                        "blocked curve cannot wrap another blocked curve".into(),
                    ));
                }
                then_curve.validate(has_recurrence)?;
            }
            CurveConfig::Accumulator { buildup_rate } => {
                if !has_recurrence {
                    return Err(DbError::Validation(
                        "accumulator curve requires a recurrence pattern".into(),
                    ));
                }
                if *buildup_rate < 0.0 {
                    return Err(DbError::Validation(
                        "accumulator buildup_rate must be nonnegative".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// True when `t` falls inside the wall-clock window. A window whose start
/// is after its end crosses midnight; both shapes are inclusive of start
/// and exclusive of end.
pub fn in_window(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

fn deps_satisfied(task: &Task, dep_status: &HashMap<i64, TaskStatus>) -> bool {
    task.dependencies
        .iter()
        .all(|id| dep_status.get(id) == Some(&TaskStatus::Completed))
}

/// Evaluate a task's priority at `at`.
///
/// Two universal gates run before any variant math: a task outside its
/// time-of-day window scores 0, and a task with any incomplete dependency
/// scores 0.
pub fn priority(task: &Task, at: DateTime<Utc>, dep_status: &HashMap<i64, TaskStatus>) -> f64 {
    if !task.dependencies.is_empty() && !deps_satisfied(task, dep_status) {
        return 0.0;
    }
    if let (Some(ws), Some(we)) = (task.window_start, task.window_end) {
        if !in_window(at.time(), ws, we) {
            return 0.0;
        }
    }
    eval(&task.curve, task, at, dep_status)
}

fn eval(
    curve: &CurveConfig,
    task: &Task,
    at: DateTime<Utc>,
    dep_status: &HashMap<i64, TaskStatus>,
) -> f64 {
    match curve {
        CurveConfig::Linear { start_date, deadline } => {
            ramp(at, *start_date, *deadline, 1.0)
        }
        CurveConfig::Exponential {
            start_date,
            deadline,
            exponent,
        } => ramp(at, *start_date, *deadline, *exponent),
        CurveConfig::HardWindow {
            window_start,
            window_end,
            priority,
        } => {
            if at >= *window_start && at <= *window_end {
                *priority
            } else {
                0.0
            }
        }
        CurveConfig::Blocked { then_curve } => {
            if deps_satisfied(task, dep_status) {
                eval(then_curve, task, at, dep_status)
            } else {
                0.0
            }
        }
        CurveConfig::Accumulator { buildup_rate } => accumulator(task, at, *buildup_rate),
    }
}

/// Shared Linear/Exponential shape: zero before start, `ratio^exponent`
/// inside the interval, linear overdue tail past the deadline.
fn ramp(at: DateTime<Utc>, start: DateTime<Utc>, deadline: DateTime<Utc>, exponent: f64) -> f64 {
    if at < start {
        return 0.0;
    }
    let span = (deadline - start).num_milliseconds() as f64;
    if span <= 0.0 {
        return 0.0;
    }
    if at > deadline {
        return 1.0 + (at - deadline).num_milliseconds() as f64 / span;
    }
    let ratio = (at - start).num_milliseconds() as f64 / span;
    ratio.powf(exponent)
}

fn accumulator(task: &Task, at: DateTime<Utc>, buildup_rate: f64) -> f64 {
    let pattern = match &task.recurrence {
        Some(p) => p,
        None => return 0.0,
    };
    let expected_days = pattern.expected_interval_days();

    match pattern.mode {
        RecurrenceMode::Completion => {
            let last = task.last_completed_at.unwrap_or(task.created_at);
            let elapsed_days = (at - last).num_milliseconds() as f64 / MS_PER_DAY;
            let ratio = elapsed_days / expected_days;
            if ratio < 0.5 {
                0.1
            } else if ratio < 0.8 {
                0.3
            } else if ratio < 1.0 {
                0.6
            } else if ratio < 1.2 {
                0.9
            } else {
                1.0
            }
        }
        RecurrenceMode::Calendar => {
            // next_due_at is initialized at creation; fall back to the
            // plateau when it is somehow absent.
            let next_due = match task.next_due_at {
                Some(d) => d,
                None => return 0.2,
            };
            let days_until = (next_due - at).num_milliseconds() as f64 / MS_PER_DAY;
            let half = expected_days / 2.0;
            if days_until > half {
                0.2
            } else if days_until < 0.0 {
                (1.0 + buildup_rate * days_until.abs()).min(1.5)
            } else {
                0.2 + 0.8 * (1.0 - days_until / half)
            }
        }
    }
}

/// Pick a curve for a creation request that did not specify one: a hard
/// window when the task has a time-of-day window, Blocked wrapping the
/// fallback ramp when it has dependencies, an accumulator when it recurs,
/// otherwise the configured default ramp over `now..deadline` (deadline
/// defaulting to a week out).
pub fn infer_curve(
    req: &crate::db::models::CreateTask,
    default_curve_type: &str,
    now: DateTime<Utc>,
) -> CurveConfig {
    let deadline = req.deadline.unwrap_or(now + Duration::days(7));

    let fallback = || match default_curve_type {
        "exponential" => CurveConfig::Exponential {
            start_date: now,
            deadline,
            exponent: default_exponent(),
        },
        _ => CurveConfig::Linear {
            start_date: now,
            deadline,
        },
    };

    if req.window_start.is_some() && req.window_end.is_some() {
        CurveConfig::HardWindow {
            window_start: now,
            window_end: deadline,
            priority: default_window_priority(),
        }
    } else if !req.dependencies.is_empty() {
        CurveConfig::Blocked {
            then_curve: Box::new(fallback()),
        }
    } else if req.recurrence.is_some() {
        CurveConfig::Accumulator {
            buildup_rate: default_buildup_rate(),
        }
    } else {
        fallback()
    }
}

/// A task paired with its priority at the evaluation instant.
#[derive(Debug, Clone, Serialize)]
pub struct RankedTask {
    pub task: Task,
    pub priority: f64,
}

/// Rank Open tasks by descending priority, ascending id as the stable
/// tie-breaker. Only Open tasks appear: Blocked, InProgress, and Completed
/// are all excluded.
pub fn rank_by_priority(tasks: &[Task], limit: Option<usize>, at: DateTime<Utc>) -> Vec<RankedTask> {
    let dep_status: HashMap<i64, TaskStatus> =
        tasks.iter().map(|t| (t.id, t.status)).collect();

    let mut ranked: Vec<RankedTask> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Open)
        .map(|t| RankedTask {
            priority: priority(t, at, &dep_status),
            task: t.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.task.id.cmp(&b.task.id))
    });

    if let Some(n) = limit {
        ranked.truncate(n);
    }
    ranked
}

/// One sampled point of a task's urgency trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub at: DateTime<Utc>,
    pub priority: f64,
}

/// Sample a task's curve over `days` days starting at `from`.
pub fn timeline(
    task: &Task,
    dep_status: &HashMap<i64, TaskStatus>,
    from: DateTime<Utc>,
    days: u32,
    samples_per_day: u32,
) -> Vec<TimelinePoint> {
    let samples_per_day = samples_per_day.max(1);
    let step = Duration::milliseconds((MS_PER_DAY / samples_per_day as f64) as i64);
    let total = (days.max(1) * samples_per_day) as i64;

    (0..=total)
        .map(|i| {
            let at = from + step * i as i32;
            TimelinePoint {
                at,
                priority: priority(task, at, dep_status),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::parse_hhmm;
    use crate::recurrence::{RecurrenceKind, RecurrencePattern};
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn task_with(curve: CurveConfig) -> Task {
        Task {
            id: 1,
            title: "t".into(),
            project: None,
            bucket_id: None,
            tags: vec![],
            deadline: None,
            estimate_minutes: None,
            recurrence: None,
            window_start: None,
            window_end: None,
            dependencies: vec![],
            curve,
            status: TaskStatus::Open,
            last_completed_at: None,
            next_due_at: None,
            created_at: utc(2025, 1, 1, 0, 0),
            updated_at: utc(2025, 1, 1, 0, 0),
        }
    }

    fn linear(s: DateTime<Utc>, e: DateTime<Utc>) -> CurveConfig {
        CurveConfig::Linear {
            start_date: s,
            deadline: e,
        }
    }

    #[test]
    fn linear_midpoint_is_half() {
        let t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        let p = priority(&t, utc(2025, 1, 5, 12, 0), &HashMap::new());
        assert!((p - 0.5).abs() < 0.01, "got {}", p);
    }

    #[test]
    fn linear_before_start_is_zero() {
        let t = task_with(linear(utc(2025, 1, 5, 0, 0), utc(2025, 1, 10, 0, 0)));
        assert_eq!(priority(&t, utc(2025, 1, 1, 0, 0), &HashMap::new()), 0.0);
    }

    #[test]
    fn linear_overdue_tail_keeps_slope() {
        // Nine-day span, nine days overdue -> 2.0.
        let t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        let p = priority(&t, utc(2025, 1, 19, 0, 0), &HashMap::new());
        assert!((p - 2.0).abs() < 0.001, "got {}", p);
    }

    #[test]
    fn exponential_bows_below_linear() {
        let t = task_with(CurveConfig::Exponential {
            start_date: utc(2025, 1, 1, 0, 0),
            deadline: utc(2025, 1, 11, 0, 0),
            exponent: 2.0,
        });
        let p = priority(&t, utc(2025, 1, 6, 0, 0), &HashMap::new());
        assert!((p - 0.25).abs() < 0.001, "got {}", p);
    }

    #[test]
    fn exponential_overdue_tail_is_linear() {
        let t = task_with(CurveConfig::Exponential {
            start_date: utc(2025, 1, 1, 0, 0),
            deadline: utc(2025, 1, 11, 0, 0),
            exponent: 3.0,
        });
        let p = priority(&t, utc(2025, 1, 16, 0, 0), &HashMap::new());
        assert!((p - 1.5).abs() < 0.001, "got {}", p);
    }

    #[test]
    fn hard_window_constant_inside() {
        let t = task_with(CurveConfig::HardWindow {
            window_start: utc(2025, 1, 5, 9, 0),
            window_end: utc(2025, 1, 5, 17, 0),
            priority: 1.5,
        });
        assert_eq!(priority(&t, utc(2025, 1, 5, 12, 0), &HashMap::new()), 1.5);
        assert_eq!(priority(&t, utc(2025, 1, 5, 18, 0), &HashMap::new()), 0.0);
        assert_eq!(priority(&t, utc(2025, 1, 4, 12, 0), &HashMap::new()), 0.0);
    }

    #[test]
    fn window_gate_zeroes_outside() {
        let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        t.window_start = parse_hhmm("18:00");
        t.window_end = parse_hhmm("22:00");
        assert_eq!(priority(&t, utc(2025, 1, 5, 10, 0), &HashMap::new()), 0.0);
        assert!(priority(&t, utc(2025, 1, 5, 20, 0), &HashMap::new()) > 0.0);
    }

    #[test]
    fn window_gate_crosses_midnight() {
        let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        t.window_start = parse_hhmm("22:00");
        t.window_end = parse_hhmm("02:00");
        // Inside on both sides of midnight.
        assert!(priority(&t, utc(2025, 1, 5, 23, 0), &HashMap::new()) > 0.0);
        assert!(priority(&t, utc(2025, 1, 5, 1, 0), &HashMap::new()) > 0.0);
        // Start inclusive, end exclusive.
        assert!(priority(&t, utc(2025, 1, 5, 22, 0), &HashMap::new()) > 0.0);
        assert_eq!(priority(&t, utc(2025, 1, 5, 2, 0), &HashMap::new()), 0.0);
        assert_eq!(priority(&t, utc(2025, 1, 5, 12, 0), &HashMap::new()), 0.0);
    }

    #[test]
    fn block_gate_zeroes_any_variant() {
        let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        t.dependencies = vec![9];
        let mut deps = HashMap::new();
        deps.insert(9, TaskStatus::Open);
        assert_eq!(priority(&t, utc(2025, 1, 5, 12, 0), &deps), 0.0);

        deps.insert(9, TaskStatus::Completed);
        let p = priority(&t, utc(2025, 1, 5, 12, 0), &deps);
        assert!(p > 0.0, "got {}", p);
    }

    #[test]
    fn blocked_curve_defers_to_wrapped() {
        let mut t = task_with(CurveConfig::Blocked {
            then_curve: Box::new(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0))),
        });
        t.dependencies = vec![4];
        let mut deps = HashMap::new();
        deps.insert(4, TaskStatus::InProgress);
        assert_eq!(priority(&t, utc(2025, 1, 5, 12, 0), &deps), 0.0);

        deps.insert(4, TaskStatus::Completed);
        let p = priority(&t, utc(2025, 1, 5, 12, 0), &deps);
        assert!((p - 0.5).abs() < 0.01, "got {}", p);
    }

    fn completion_weekly() -> RecurrencePattern {
        RecurrencePattern {
            mode: RecurrenceMode::Completion,
            kind: RecurrenceKind::Weekly,
            interval: None,
            unit: None,
            day_of_week: None,
            days_of_week: None,
            time_of_day: None,
            anchor: None,
        }
    }

    #[test]
    fn accumulator_completion_steps() {
        let mut t = task_with(CurveConfig::Accumulator { buildup_rate: 0.1 });
        t.recurrence = Some(completion_weekly());
        t.last_completed_at = Some(utc(2025, 1, 1, 0, 0));
        let deps = HashMap::new();

        // Expected interval 7d: the step table at each elapsed ratio.
        let cases = [
            (utc(2025, 1, 2, 0, 0), 0.1),  // 1d, ratio 0.14
            (utc(2025, 1, 5, 0, 0), 0.3),  // 4d, ratio 0.57
            (utc(2025, 1, 7, 0, 0), 0.6),  // 6d, ratio 0.86
            (utc(2025, 1, 8, 12, 0), 0.9), // 7.5d, ratio 1.07
            (utc(2025, 1, 12, 0, 0), 1.0), // 11d, ratio 1.57
        ];
        for (at, want) in cases {
            let got = priority(&t, at, &deps);
            assert!((got - want).abs() < 1e-9, "at {}: got {}", at, got);
        }
    }

    fn calendar_weekly() -> RecurrencePattern {
        RecurrencePattern {
            mode: RecurrenceMode::Calendar,
            kind: RecurrenceKind::Weekly,
            interval: None,
            unit: None,
            day_of_week: None,
            days_of_week: None,
            time_of_day: None,
            anchor: None,
        }
    }

    #[test]
    fn accumulator_calendar_plateau_ramp_overdue() {
        let mut t = task_with(CurveConfig::Accumulator { buildup_rate: 0.1 });
        t.recurrence = Some(calendar_weekly());
        t.next_due_at = Some(utc(2025, 1, 15, 0, 0));
        let deps = HashMap::new();

        // More than half the interval away: plateau.
        assert!((priority(&t, utc(2025, 1, 10, 0, 0), &deps) - 0.2).abs() < 1e-9);
        // Due now: top of the ramp.
        assert!((priority(&t, utc(2025, 1, 15, 0, 0), &deps) - 1.0).abs() < 1e-9);
        // Halfway down the second half.
        let mid = priority(&t, utc(2025, 1, 13, 6, 0), &deps);
        assert!((mid - 0.6).abs() < 0.01, "got {}", mid);
        // Two days overdue.
        let over = priority(&t, utc(2025, 1, 17, 0, 0), &deps);
        assert!((over - 1.2).abs() < 1e-9, "got {}", over);
        // Cap at 1.5.
        let far = priority(&t, utc(2025, 3, 1, 0, 0), &deps);
        assert!((far - 1.5).abs() < 1e-9, "got {}", far);
    }

    #[test]
    fn rank_orders_desc_with_id_tiebreak() {
        let a = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
            t.id = 2;
            t
        };
        let b = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
            t.id = 1;
            t
        };
        let c = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 2, 0, 0)));
            t.id = 3;
            t
        };
        let done = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 2, 0, 0)));
            t.id = 4;
            t.status = TaskStatus::Completed;
            t
        };
        let blocked = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 2, 0, 0)));
            t.id = 5;
            t.status = TaskStatus::Blocked;
            t
        };
        let started = {
            let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 2, 0, 0)));
            t.id = 6;
            t.status = TaskStatus::InProgress;
            t
        };

        let ranked =
            rank_by_priority(&[a, b, c, done, blocked, started], None, utc(2025, 1, 5, 0, 0));
        let ids: Vec<i64> = ranked.iter().map(|r| r.task.id).collect();
        // c is overdue (highest); a and b tie and order by id. Completed,
        // Blocked, and InProgress tasks are all absent.
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn rank_respects_limit() {
        let tasks: Vec<Task> = (1..=5)
            .map(|i| {
                let mut t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
                t.id = i;
                t
            })
            .collect();
        let ranked = rank_by_priority(&tasks, Some(2), utc(2025, 1, 5, 0, 0));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn validate_rejects_bad_params() {
        let bad_span = linear(utc(2025, 1, 10, 0, 0), utc(2025, 1, 1, 0, 0));
        assert!(matches!(bad_span.validate(false), Err(DbError::Validation(_))));

        let bad_exp = CurveConfig::Exponential {
            start_date: utc(2025, 1, 1, 0, 0),
            deadline: utc(2025, 1, 10, 0, 0),
            exponent: 7.0,
        };
        assert!(matches!(bad_exp.validate(false), Err(DbError::Validation(_))));

        let nested = CurveConfig::Blocked {
            then_curve: Box::new(CurveConfig::Blocked {
                then_curve: Box::new(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0))),
            }),
        };
        assert!(matches!(nested.validate(false), Err(DbError::Validation(_))));

        let acc = CurveConfig::Accumulator { buildup_rate: 0.1 };
        assert!(acc.validate(false).is_err());
        assert!(acc.validate(true).is_ok());
    }

    #[test]
    fn curve_json_roundtrip() {
        let c = CurveConfig::Exponential {
            start_date: utc(2025, 1, 1, 0, 0),
            deadline: utc(2025, 1, 10, 0, 0),
            exponent: 3.0,
        };
        let json = serde_json::to_string(&c).unwrap();
        assert!(json.contains("\"type\":\"exponential\""));
        let back: CurveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn timeline_samples_inclusive_span() {
        let t = task_with(linear(utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 0, 0)));
        let points = timeline(&t, &HashMap::new(), utc(2025, 1, 1, 0, 0), 2, 4);
        assert_eq!(points.len(), 9);
        assert!(points.windows(2).all(|w| w[0].at < w[1].at));
    }
}
