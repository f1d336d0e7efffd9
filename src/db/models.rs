use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::curve::CurveConfig;
use crate::recurrence::RecurrencePattern;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(TaskStatus::Open),
            "in_progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "blocked" => Some(TaskStatus::Blocked),
            _ => None,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Open
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Project,
    Category,
    Context,
}

impl BucketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Project => "project",
            BucketKind::Category => "category",
            BucketKind::Context => "context",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "project" => Some(BucketKind::Project),
            "category" => Some(BucketKind::Category),
            "context" => Some(BucketKind::Context),
            _ => None,
        }
    }
}

impl Default for BucketKind {
    fn default() -> Self {
        BucketKind::Category
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub project: Option<String>,
    pub bucket_id: Option<i64>,
    /// Insertion-ordered for display; set semantics for filtering.
    pub tags: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimate_minutes: Option<i64>,
    pub recurrence: Option<RecurrencePattern>,
    #[serde(with = "hhmm_opt")]
    pub window_start: Option<NaiveTime>,
    #[serde(with = "hhmm_opt")]
    pub window_end: Option<NaiveTime>,
    /// Forward edges only; dependents are derived by reverse scan.
    pub dependencies: Vec<i64>,
    pub curve: CurveConfig,
    pub status: TaskStatus,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True when the task carries a time-of-day window.
    pub fn has_window(&self) -> bool {
        self.window_start.is_some() && self.window_end.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub project: Option<String>,
    pub bucket_id: Option<i64>,
    pub tags: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub estimate_minutes: Option<i64>,
    pub recurrence: Option<RecurrencePattern>,
    #[serde(with = "hhmm_opt", default)]
    pub window_start: Option<NaiveTime>,
    #[serde(with = "hhmm_opt", default)]
    pub window_end: Option<NaiveTime>,
    pub dependencies: Vec<i64>,
    /// When absent the curve is inferred from the other fields.
    pub curve: Option<CurveConfig>,
}

/// Partial update. Outer `None` keeps the stored value; for optional fields
/// the inner `None` clears it.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub project: Option<Option<String>>,
    pub bucket_id: Option<Option<i64>>,
    pub tags: Option<Vec<String>>,
    pub deadline: Option<Option<DateTime<Utc>>>,
    pub estimate_minutes: Option<Option<i64>>,
    pub recurrence: Option<Option<RecurrencePattern>>,
    pub window: Option<Option<(NaiveTime, NaiveTime)>>,
    pub dependencies: Option<Vec<i64>>,
    pub curve: Option<CurveConfig>,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    pub id: i64,
    pub name: String,
    pub kind: BucketKind,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBucket {
    pub name: String,
    pub kind: BucketKind,
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Completion {
    pub id: i64,
    pub task_id: i64,
    pub completed_at: DateTime<Utc>,
    pub actual_minutes: Option<i64>,
    pub scheduled_minutes: Option<i64>,
    /// 0 = Sunday .. 6 = Saturday.
    pub day_of_week: u8,
    /// 0..23.
    pub hour_of_day: u8,
}

/// Output of the (external) free-form description parser. The core resolves
/// `bucket_name` to a bucket id by exact case-insensitive match; an unknown
/// name is downgraded to "no bucket" with a warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedTask {
    pub title: String,
    pub project: Option<String>,
    pub tags: Vec<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub bucket_name: Option<String>,
    pub recurrence: Option<RecurrencePattern>,
    #[serde(with = "hhmm_opt", default)]
    pub window_start: Option<NaiveTime>,
    #[serde(with = "hhmm_opt", default)]
    pub window_end: Option<NaiveTime>,
    pub dependencies: Vec<i64>,
}

/// Parse an `HH:MM` wall-clock time.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

/// Render a wall-clock time as `HH:MM`.
pub fn format_hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Serde adapter for `Option<NaiveTime>` as `"HH:MM"`.
pub(crate) mod hhmm_opt {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<NaiveTime>, ser: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(t) => ser.serialize_some(&super::format_hhmm(*t)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<NaiveTime>, D::Error> {
        let raw: Option<String> = Option::deserialize(de)?;
        match raw {
            Some(s) => super::parse_hhmm(&s)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid HH:MM time: {}", s))),
            None => Ok(None),
        }
    }
}
