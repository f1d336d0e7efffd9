//! Database schema definitions and migrations

pub const SCHEMA_VERSION: i32 = 1;

/// Config key holding the data format version.
pub const VERSION_KEY: &str = "version";

/// Data format version written on init and stamped into exports.
pub const DATA_VERSION: &str = "1.0.0";

/// Initial schema creation SQL
pub const CREATE_TABLES: &str = r#"
-- Tasks table. Ids are dense positive integers assigned by the store.
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK(length(title) > 0 AND length(title) <= 500),
    project TEXT,
    bucket_id INTEGER REFERENCES buckets(id) ON DELETE SET NULL,
    tags_json TEXT NOT NULL DEFAULT '[]',
    deadline TEXT,
    estimate_minutes INTEGER CHECK(estimate_minutes IS NULL OR estimate_minutes > 0),
    recurrence_json TEXT,
    window_start TEXT,
    window_end TEXT,
    dependencies_json TEXT NOT NULL DEFAULT '[]',
    curve_json TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open'
        CHECK(status IN ('open', 'in_progress', 'completed', 'blocked')),
    last_completed_at TEXT,
    next_due_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project) WHERE project IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_tasks_bucket ON tasks(bucket_id) WHERE bucket_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_tasks_deadline ON tasks(deadline) WHERE deadline IS NOT NULL;

-- Buckets table (named groupings: project, category, context)
CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    kind TEXT NOT NULL DEFAULT 'category'
        CHECK(kind IN ('project', 'category', 'context')),
    config_json TEXT NOT NULL DEFAULT '{}'
);

-- Completion log. Rows follow their task on delete.
CREATE TABLE IF NOT EXISTS completions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
    completed_at TEXT NOT NULL,
    actual_minutes INTEGER,
    scheduled_minutes INTEGER,
    day_of_week INTEGER NOT NULL CHECK(day_of_week BETWEEN 0 AND 6),
    hour_of_day INTEGER NOT NULL CHECK(hour_of_day BETWEEN 0 AND 23)
);

CREATE INDEX IF NOT EXISTS idx_completions_task ON completions(task_id);
CREATE INDEX IF NOT EXISTS idx_completions_at ON completions(completed_at);

-- String key/value configuration map
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);

-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
