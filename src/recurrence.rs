//! Recurrence engine: next-due computation for calendar- and
//! completion-anchored schedules.

use chrono::{DateTime, Datelike, Duration, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::hhmm_opt;
use crate::db::DbError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceMode {
    /// Anchored to a fixed schedule, independent of completion instants.
    Calendar,
    /// Anchored to the last completion instant.
    Completion,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    Interval,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrencePattern {
    pub mode: RecurrenceMode,
    pub kind: RecurrenceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<IntervalUnit>,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(with = "hhmm_opt", default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<NaiveTime>,
    /// Epoch for calendar interval mode; defaults to the task's creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<DateTime<Utc>>,
}

impl RecurrencePattern {
    pub fn validate(&self) -> Result<(), DbError> {
        if self.kind == RecurrenceKind::Interval {
            match self.interval {
                Some(n) if n > 0 => {}
                Some(_) => {
                    return Err(DbError::Validation(
                        "recurrence interval must be positive".into(),
                    ))
                }
                None => {
                    return Err(DbError::Validation(
                        "interval recurrence requires an interval".into(),
                    ))
                }
            }
            if self.unit.is_none() {
                return Err(DbError::Validation(
                    "interval recurrence requires a unit".into(),
                ));
            }
        }
        if let Some(d) = self.day_of_week {
            if d > 6 {
                return Err(DbError::Validation(format!(
                    "day_of_week must be 0..6, got {}",
                    d
                )));
            }
        }
        if let Some(days) = &self.days_of_week {
            if days.is_empty() {
                return Err(DbError::Validation("days_of_week must be nonempty".into()));
            }
            if let Some(bad) = days.iter().find(|d| **d > 6) {
                return Err(DbError::Validation(format!(
                    "days_of_week must be 0..6, got {}",
                    bad
                )));
            }
        }
        Ok(())
    }

    /// Expected gap between occurrences, in days. Months use a 30-day
    /// approximation here; scheduling uses true calendar months.
    pub fn expected_interval_days(&self) -> f64 {
        match self.kind {
            RecurrenceKind::Daily => 1.0,
            RecurrenceKind::Weekly => 7.0,
            RecurrenceKind::Monthly => 30.0,
            RecurrenceKind::Interval => {
                let n = self.interval.unwrap_or(1) as f64;
                match self.unit {
                    Some(IntervalUnit::Days) | None => n,
                    Some(IntervalUnit::Weeks) => n * 7.0,
                    Some(IntervalUnit::Months) => n * 30.0,
                }
            }
        }
    }
}

/// Compute the next due instant for a pattern.
///
/// Skipped occurrences are never backfilled: a weekly Monday task completed
/// on Wednesday yields the coming Monday. Completion-anchored patterns
/// re-anchor on every completion, so finishing early pulls the next
/// occurrence earlier by the same amount.
pub fn next_due(
    pattern: &RecurrencePattern,
    last_completed: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DbError> {
    pattern.validate()?;

    let due = match pattern.mode {
        RecurrenceMode::Calendar => next_calendar(pattern, created_at, now)?,
        RecurrenceMode::Completion => {
            next_from_base(pattern, last_completed.unwrap_or(now))?
        }
    };

    Ok(match pattern.time_of_day {
        Some(t) => due.date_naive().and_time(t).and_utc(),
        None => due,
    })
}

fn next_calendar(
    pattern: &RecurrencePattern,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DbError> {
    match pattern.kind {
        RecurrenceKind::Daily => Ok(midnight(now + Duration::days(1))),
        RecurrenceKind::Weekly => {
            let days = match (&pattern.days_of_week, pattern.day_of_week) {
                (Some(set), _) => set.clone(),
                (None, Some(d)) => vec![d],
                (None, None) => return Ok(now + Duration::days(7)),
            };
            let today = now.weekday().num_days_from_sunday() as i64;
            let ahead = days
                .iter()
                .map(|d| {
                    let diff = (*d as i64 + 7 - today) % 7;
                    // A match on today's weekday means the occurrence has
                    // passed; skip to next week.
                    if diff == 0 {
                        7
                    } else {
                        diff
                    }
                })
                .min()
                .expect("validated nonempty");
            Ok(midnight(now + Duration::days(ahead)))
        }
        RecurrenceKind::Monthly => add_months(now, 1),
        RecurrenceKind::Interval => {
            let anchor = pattern.anchor.unwrap_or(created_at);
            let interval = pattern.interval.unwrap_or(1);
            match pattern.unit.unwrap_or(IntervalUnit::Days) {
                IntervalUnit::Days => Ok(step_from_anchor(anchor, now, interval as i64)),
                IntervalUnit::Weeks => {
                    Ok(step_from_anchor(anchor, now, interval as i64 * 7))
                }
                IntervalUnit::Months => {
                    // Calendar months step true month lengths; the 30-day
                    // approximation is only for the priority ramp.
                    let mut t = anchor;
                    while t < now {
                        t = add_months(t, interval)?;
                    }
                    Ok(t)
                }
            }
        }
    }
}

fn next_from_base(
    pattern: &RecurrencePattern,
    base: DateTime<Utc>,
) -> Result<DateTime<Utc>, DbError> {
    match pattern.kind {
        RecurrenceKind::Daily => Ok(base + Duration::days(1)),
        RecurrenceKind::Weekly => Ok(base + Duration::days(7)),
        RecurrenceKind::Monthly => add_months(base, 1),
        RecurrenceKind::Interval => {
            let interval = pattern.interval.unwrap_or(1);
            match pattern.unit.unwrap_or(IntervalUnit::Days) {
                IntervalUnit::Days => Ok(base + Duration::days(interval as i64)),
                IntervalUnit::Weeks => Ok(base + Duration::days(interval as i64 * 7)),
                IntervalUnit::Months => add_months(base, interval),
            }
        }
    }
}

/// `anchor + ceil((now - anchor) / interval) * interval`, in whole days.
fn step_from_anchor(anchor: DateTime<Utc>, now: DateTime<Utc>, interval_days: i64) -> DateTime<Utc> {
    if now <= anchor {
        return anchor;
    }
    let step_ms = interval_days * 24 * 60 * 60 * 1000;
    let elapsed_ms = (now - anchor).num_milliseconds();
    let k = (elapsed_ms + step_ms - 1) / step_ms;
    anchor + Duration::milliseconds(k * step_ms)
}

fn midnight(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
}

fn add_months(t: DateTime<Utc>, months: u32) -> Result<DateTime<Utc>, DbError> {
    // chrono clamps the day to the target month's length (Jan 31 -> Feb 28).
    t.checked_add_months(Months::new(months))
        .ok_or_else(|| DbError::Validation("date out of range adding months".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn calendar(kind: RecurrenceKind) -> RecurrencePattern {
        RecurrencePattern {
            mode: RecurrenceMode::Calendar,
            kind,
            interval: None,
            unit: None,
            day_of_week: None,
            days_of_week: None,
            time_of_day: None,
            anchor: None,
        }
    }

    #[test]
    fn daily_is_next_midnight() {
        let now = utc(2025, 1, 8, 15, 30);
        let due = next_due(&calendar(RecurrenceKind::Daily), None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 9, 0, 0));
    }

    #[test]
    fn weekly_monday_from_wednesday() {
        // 2025-01-08 is a Wednesday; day 1 is Monday.
        let mut p = calendar(RecurrenceKind::Weekly);
        p.day_of_week = Some(1);
        let now = utc(2025, 1, 8, 10, 0);
        let due = next_due(&p, None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 13, 0, 0));
        assert_eq!(due.weekday().num_days_from_sunday(), 1);
    }

    #[test]
    fn weekly_same_day_skips_to_next_week() {
        // 2025-01-13 is a Monday.
        let mut p = calendar(RecurrenceKind::Weekly);
        p.day_of_week = Some(1);
        let now = utc(2025, 1, 13, 9, 0);
        let due = next_due(&p, None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 20, 0, 0));
    }

    #[test]
    fn weekly_set_picks_earliest_member() {
        // From Wednesday, {Friday=5, Monday=1} -> Friday 2025-01-10.
        let mut p = calendar(RecurrenceKind::Weekly);
        p.days_of_week = Some(vec![5, 1]);
        let now = utc(2025, 1, 8, 10, 0);
        let due = next_due(&p, None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 10, 0, 0));
    }

    #[test]
    fn weekly_bare_adds_seven_days() {
        let now = utc(2025, 1, 8, 10, 0);
        let due = next_due(&calendar(RecurrenceKind::Weekly), None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 15, 10, 0));
    }

    #[test]
    fn monthly_clamps_to_month_length() {
        let now = utc(2025, 1, 31, 12, 0);
        let due = next_due(&calendar(RecurrenceKind::Monthly), None, now, now).unwrap();
        assert_eq!(due, utc(2025, 2, 28, 12, 0));
    }

    #[test]
    fn calendar_interval_steps_from_anchor() {
        let mut p = calendar(RecurrenceKind::Interval);
        p.interval = Some(3);
        p.unit = Some(IntervalUnit::Days);
        p.anchor = Some(utc(2025, 1, 1, 0, 0));
        // 10.5 days elapsed -> ceil(10.5 / 3) = 4 steps -> Jan 13.
        let now = utc(2025, 1, 11, 12, 0);
        let due = next_due(&p, None, utc(2025, 1, 1, 0, 0), now).unwrap();
        assert_eq!(due, utc(2025, 1, 13, 0, 0));
    }

    #[test]
    fn calendar_interval_defaults_anchor_to_creation() {
        let mut p = calendar(RecurrenceKind::Interval);
        p.interval = Some(2);
        p.unit = Some(IntervalUnit::Weeks);
        let created = utc(2025, 1, 1, 8, 0);
        let now = utc(2025, 1, 20, 0, 0);
        // ceil(19d / 14d) = 2 -> Jan 29 08:00.
        let due = next_due(&p, None, created, now).unwrap();
        assert_eq!(due, utc(2025, 1, 29, 8, 0));
    }

    #[test]
    fn completion_interval_two_weeks() {
        let mut p = calendar(RecurrenceKind::Interval);
        p.mode = RecurrenceMode::Completion;
        p.interval = Some(2);
        p.unit = Some(IntervalUnit::Weeks);
        let completed = utc(2025, 1, 10, 12, 0);
        let due = next_due(&p, Some(completed), utc(2025, 1, 1, 0, 0), completed).unwrap();
        assert_eq!(due, utc(2025, 1, 24, 12, 0));
    }

    #[test]
    fn completion_mode_reanchors_on_early_completion() {
        let mut p = calendar(RecurrenceKind::Interval);
        p.mode = RecurrenceMode::Completion;
        p.interval = Some(10);
        p.unit = Some(IntervalUnit::Days);
        let on_time = next_due(&p, Some(utc(2025, 1, 10, 9, 0)), utc(2025, 1, 1, 0, 0), utc(2025, 1, 10, 9, 0)).unwrap();
        let early = next_due(&p, Some(utc(2025, 1, 6, 9, 0)), utc(2025, 1, 1, 0, 0), utc(2025, 1, 6, 9, 0)).unwrap();
        assert_eq!(on_time - early, Duration::days(4));
    }

    #[test]
    fn time_of_day_overwrites_clock_time() {
        let mut p = calendar(RecurrenceKind::Daily);
        p.time_of_day = parse("08:30");
        let now = utc(2025, 1, 8, 15, 0);
        let due = next_due(&p, None, now, now).unwrap();
        assert_eq!(due, utc(2025, 1, 9, 8, 30));
    }

    fn parse(s: &str) -> Option<NaiveTime> {
        crate::db::models::parse_hhmm(s)
    }

    #[test]
    fn interval_without_interval_is_invalid() {
        let p = calendar(RecurrenceKind::Interval);
        let now = utc(2025, 1, 8, 0, 0);
        assert!(matches!(
            next_due(&p, None, now, now),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn day_of_week_out_of_range_is_invalid() {
        let mut p = calendar(RecurrenceKind::Weekly);
        p.day_of_week = Some(7);
        assert!(matches!(p.validate(), Err(DbError::Validation(_))));
    }

    #[test]
    fn expected_interval_days_table() {
        assert_eq!(calendar(RecurrenceKind::Daily).expected_interval_days(), 1.0);
        assert_eq!(calendar(RecurrenceKind::Weekly).expected_interval_days(), 7.0);
        assert_eq!(calendar(RecurrenceKind::Monthly).expected_interval_days(), 30.0);
        let mut p = calendar(RecurrenceKind::Interval);
        p.interval = Some(2);
        p.unit = Some(IntervalUnit::Months);
        assert_eq!(p.expected_interval_days(), 60.0);
    }
}
