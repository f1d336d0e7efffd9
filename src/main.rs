use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use tempo::commands::plan::{self, PlanOverrides};
use tempo::commands::tasks;
use tempo::commands::transfer::{self, ExportData, ImportMode};
use tempo::db::models::{
    format_hhmm, parse_hhmm, BucketKind, CreateBucket, ParsedTask, Task, TaskStatus, UpdateTask,
};
use tempo::db::tasks::TaskFilter;
use tempo::recurrence::{
    IntervalUnit, RecurrenceKind, RecurrenceMode, RecurrencePattern,
};
use tempo::{lifecycle, logging, Database};

#[derive(Parser, Debug)]
#[command(name = "tempo", version, about = "Time-driven personal task manager")]
struct Cli {
    /// Database path (default: ~/.tempo/tempo.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize the task store
    Init,

    /// Task operations
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Bucket operations
    Bucket {
        #[command(subcommand)]
        command: BucketCommand,
    },

    /// Show tasks ranked by current urgency
    Priority {
        #[arg(long)]
        limit: Option<usize>,
        /// Evaluation instant (default: now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Show a task's urgency trajectory over the coming days
    Timeline {
        id: i64,
        #[arg(long, default_value_t = 14)]
        days: u32,
        #[arg(long)]
        at: Option<String>,
    },

    /// Plan a working day
    Plan {
        /// Date to plan (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        /// Assign time slots within working hours
        #[arg(long)]
        blocks: bool,
        /// Working hours start, HH:MM
        #[arg(long)]
        start: Option<String>,
        /// Working hours end, HH:MM
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        at: Option<String>,
    },

    /// Export the store as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Import a JSON export
    Import {
        file: PathBuf,
        /// "merge" re-allocates ids; "replace" wipes the store first
        #[arg(long, default_value = "merge")]
        mode: String,
    },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Create a task
    Create {
        title: String,
        #[arg(long)]
        project: Option<String>,
        /// Bucket name (unknown names are dropped with a warning)
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Deadline: RFC 3339, "YYYY-MM-DD HH:MM", or "YYYY-MM-DD" (local)
        #[arg(long)]
        deadline: Option<String>,
        /// Estimated minutes
        #[arg(long)]
        estimate: Option<i64>,
        /// Time-of-day window, "HH:MM-HH:MM"
        #[arg(long)]
        window: Option<String>,
        #[arg(long = "depends-on")]
        dependencies: Vec<i64>,
        /// Recurrence kind: daily, weekly, monthly, interval
        #[arg(long)]
        recur: Option<String>,
        /// Recurrence anchor mode: calendar (default) or completion
        #[arg(long)]
        recur_mode: Option<String>,
        /// Interval length for interval recurrence
        #[arg(long)]
        every: Option<u32>,
        /// Interval unit: days, weeks, months
        #[arg(long)]
        unit: Option<String>,
        /// Weekday(s) 0-6 (0 = Sunday) for weekly recurrence
        #[arg(long = "on-day")]
        on_days: Vec<u8>,
        /// Time of day, HH:MM, stamped onto computed due instants
        #[arg(long)]
        at_time: Option<String>,
    },

    /// List tasks
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project: Option<String>,
        /// Bucket name, or "none" for unbucketed tasks
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        overdue: bool,
        #[arg(long)]
        has_deadline: bool,
        #[arg(long)]
        recurring: bool,
    },

    /// Show one task in full
    Show { id: i64 },

    /// Update task fields
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        clear_project: bool,
        /// Bucket name
        #[arg(long)]
        bucket: Option<String>,
        #[arg(long)]
        clear_bucket: bool,
        /// Replaces the full tag list
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        deadline: Option<String>,
        #[arg(long)]
        clear_deadline: bool,
        #[arg(long)]
        estimate: Option<i64>,
        #[arg(long)]
        clear_estimate: bool,
        #[arg(long)]
        window: Option<String>,
        #[arg(long)]
        clear_window: bool,
        #[arg(long)]
        clear_recurrence: bool,
        /// Replaces the full dependency list
        #[arg(long = "depends-on")]
        dependencies: Vec<i64>,
        #[arg(long)]
        clear_dependencies: bool,
        /// "open" or "in-progress"
        #[arg(long)]
        status: Option<String>,
    },

    /// Complete a task
    Complete {
        id: i64,
        /// Completion instant (default: now)
        #[arg(long)]
        at: Option<String>,
        /// Minutes actually spent
        #[arg(long)]
        actual: Option<i64>,
    },

    /// Delete a task
    Delete {
        id: i64,
        /// Also strip the task from its dependents
        #[arg(long)]
        force: bool,
    },

    /// Return a completed task to open
    Reopen { id: i64 },

    /// Search title, project, and tags
    Search { query: String },
}

#[derive(Subcommand, Debug)]
enum BucketCommand {
    Create {
        name: String,
        /// project, category, or context
        #[arg(long, default_value = "category")]
        kind: String,
    },
    List,
    Show { id: i64 },
    Delete { id: i64 },
}

fn default_db_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(home.join(".tempo").join("tempo.db"))
}

/// Parse an instant: RFC 3339, or a local "YYYY-MM-DD HH:MM" / "YYYY-MM-DD".
/// This is the only place wall-clock-local input enters the core.
fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        })
        .with_context(|| format!("invalid datetime '{}'", s))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .with_context(|| format!("ambiguous local time '{}' (DST?)", s))
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_instant_or_now(s: &Option<String>) -> Result<DateTime<Utc>> {
    match s {
        Some(raw) => parse_instant(raw),
        None => Ok(Utc::now()),
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    parse_hhmm(s).with_context(|| format!("invalid HH:MM time '{}'", s))
}

fn parse_window(s: &str) -> Result<(NaiveTime, NaiveTime)> {
    let (start, end) = s
        .split_once('-')
        .with_context(|| format!("window must be HH:MM-HH:MM, got '{}'", s))?;
    Ok((parse_time(start.trim())?, parse_time(end.trim())?))
}

fn parse_status(s: &str) -> Result<TaskStatus> {
    TaskStatus::parse(&s.replace('-', "_"))
        .with_context(|| format!("unknown status '{}'", s))
}

#[allow(clippy::too_many_arguments)]
fn build_recurrence(
    recur: Option<String>,
    recur_mode: Option<String>,
    every: Option<u32>,
    unit: Option<String>,
    on_days: Vec<u8>,
    at_time: Option<String>,
) -> Result<Option<RecurrencePattern>> {
    let Some(kind_raw) = recur else {
        if recur_mode.is_some() || every.is_some() || unit.is_some() || !on_days.is_empty() {
            bail!("recurrence flags require --recur");
        }
        return Ok(None);
    };

    let kind = match kind_raw.as_str() {
        "daily" => RecurrenceKind::Daily,
        "weekly" => RecurrenceKind::Weekly,
        "monthly" => RecurrenceKind::Monthly,
        "interval" => RecurrenceKind::Interval,
        other => bail!("unknown recurrence kind '{}'", other),
    };
    let mode = match recur_mode.as_deref() {
        None | Some("calendar") => RecurrenceMode::Calendar,
        Some("completion") => RecurrenceMode::Completion,
        Some(other) => bail!("unknown recurrence mode '{}'", other),
    };
    let unit = match unit.as_deref() {
        None => None,
        Some("days") => Some(IntervalUnit::Days),
        Some("weeks") => Some(IntervalUnit::Weeks),
        Some("months") => Some(IntervalUnit::Months),
        Some(other) => bail!("unknown interval unit '{}'", other),
    };
    let (day_of_week, days_of_week) = match on_days.len() {
        0 => (None, None),
        1 => (Some(on_days[0]), None),
        _ => (None, Some(on_days)),
    };

    Ok(Some(RecurrencePattern {
        mode,
        kind,
        interval: every,
        unit,
        day_of_week,
        days_of_week,
        time_of_day: at_time.as_deref().map(parse_time).transpose()?,
        anchor: None,
    }))
}

fn task_line(t: &Task) -> String {
    let mut extras = Vec::new();
    if let Some(project) = &t.project {
        extras.push(format!("project={}", project));
    }
    if !t.tags.is_empty() {
        extras.push(format!("tags={}", t.tags.join(",")));
    }
    if let Some(deadline) = t.deadline {
        extras.push(format!("due={}", deadline.format("%Y-%m-%d %H:%M")));
    }
    if !t.dependencies.is_empty() {
        let deps: Vec<String> = t.dependencies.iter().map(|d| d.to_string()).collect();
        extras.push(format!("deps={}", deps.join(",")));
    }
    let extras = if extras.is_empty() {
        String::new()
    } else {
        format!(" ({})", extras.join(" "))
    };
    format!("#{} [{}] {}{}", t.id, t.status.as_str(), t.title, extras)
}

fn print_task_detail(t: &Task) {
    println!("#{} {}", t.id, t.title);
    println!("  status:     {}", t.status.as_str());
    if let Some(project) = &t.project {
        println!("  project:    {}", project);
    }
    if let Some(bucket_id) = t.bucket_id {
        println!("  bucket:     {}", bucket_id);
    }
    if !t.tags.is_empty() {
        println!("  tags:       {}", t.tags.join(", "));
    }
    if let Some(deadline) = t.deadline {
        println!("  deadline:   {}", deadline.to_rfc3339());
    }
    if let Some(estimate) = t.estimate_minutes {
        println!("  estimate:   {} min", estimate);
    }
    if let (Some(ws), Some(we)) = (t.window_start, t.window_end) {
        println!("  window:     {}-{}", format_hhmm(ws), format_hhmm(we));
    }
    if let Some(recurrence) = &t.recurrence {
        println!(
            "  recurrence: {}",
            serde_json::to_string(recurrence).unwrap_or_default()
        );
    }
    if !t.dependencies.is_empty() {
        let deps: Vec<String> = t.dependencies.iter().map(|d| d.to_string()).collect();
        println!("  depends on: {}", deps.join(", "));
    }
    println!(
        "  curve:      {}",
        serde_json::to_string(&t.curve).unwrap_or_default()
    );
    if let Some(last) = t.last_completed_at {
        println!("  last done:  {}", last.to_rfc3339());
    }
    if let Some(due) = t.next_due_at {
        println!("  next due:   {}", due.to_rfc3339());
    }
    println!("  created:    {}", t.created_at.to_rfc3339());
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    let data_dir = db_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let _guard = logging::init_logging(&data_dir)?;

    let db = Database::open(db_path.clone())?;

    match cli.command {
        Command::Init => {
            println!("Initialized tempo store at {}", db_path.display());
        }
        Command::Task { command } => run_task(&db, command)?,
        Command::Bucket { command } => run_bucket(&db, command)?,
        Command::Priority { limit, at } => {
            let at = parse_instant_or_now(&at)?;
            let ranked = plan::priorities(&db, limit, at)?;
            if ranked.is_empty() {
                println!("No actionable tasks.");
            }
            for r in ranked {
                println!("{:>6.3}  {}", r.priority, task_line(&r.task));
            }
        }
        Command::Timeline { id, days, at } => {
            let from = parse_instant_or_now(&at)?;
            let points = plan::timeline(&db, id, from, days)?;
            for p in points {
                let bar_len = (p.priority * 20.0).round().clamp(0.0, 40.0) as usize;
                println!(
                    "{}  {:>5.2} {}",
                    p.at.format("%Y-%m-%d %H:%M"),
                    p.priority,
                    "#".repeat(bar_len)
                );
            }
        }
        Command::Plan {
            date,
            limit,
            blocks,
            start,
            end,
            at,
        } => {
            let at = parse_instant_or_now(&at)?;
            let date = match date {
                Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{}'", raw))?,
                None => Local::now().date_naive(),
            };
            let overrides = PlanOverrides {
                limit,
                include_time_blocks: blocks,
                work_hours_start: start.as_deref().map(parse_time).transpose()?,
                work_hours_end: end.as_deref().map(parse_time).transpose()?,
            };
            let day_plan = plan::plan_day(&db, date, at, &overrides)?;

            println!(
                "Plan for {} ({}-{})",
                day_plan.date,
                format_hhmm(day_plan.work_hours.0),
                format_hhmm(day_plan.work_hours.1)
            );
            for s in &day_plan.scheduled {
                let flag = if s.is_default_estimate { "*" } else { "" };
                match &s.slot {
                    Some(slot) => println!(
                        "  {}-{}  {} ({} min{})",
                        slot.start.format("%H:%M"),
                        slot.end.format("%H:%M"),
                        task_line(&s.task),
                        s.estimate_minutes,
                        flag
                    ),
                    None => println!(
                        "  {} ({} min{})",
                        task_line(&s.task),
                        s.estimate_minutes,
                        flag
                    ),
                }
            }
            for u in &day_plan.unscheduled {
                println!("  unscheduled: {} [{}]", task_line(&u.task), u.reason.as_str());
            }
            println!(
                "Scheduled {} min, {} min remaining.",
                day_plan.total_scheduled_minutes, day_plan.remaining_minutes
            );
        }
        Command::Export { out } => {
            let data = transfer::export(&db, Utc::now())?;
            let json = serde_json::to_string_pretty(&data)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!(
                        "Exported {} tasks, {} buckets, {} completions to {}",
                        data.tasks.len(),
                        data.buckets.len(),
                        data.completions.len(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
        }
        Command::Import { file, mode } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let data: ExportData =
                serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
            let mode = ImportMode::parse(&mode)?;
            let report = transfer::import(&db, &data, mode, Utc::now())?;
            println!(
                "Imported tasks {}/{} buckets {}/{} completions {}/{} (imported/skipped)",
                report.tasks.imported,
                report.tasks.skipped,
                report.buckets.imported,
                report.buckets.skipped,
                report.completions.imported,
                report.completions.skipped
            );
        }
    }

    Ok(())
}

fn run_task(db: &Database, command: TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Create {
            title,
            project,
            bucket,
            tags,
            deadline,
            estimate,
            window,
            dependencies,
            recur,
            recur_mode,
            every,
            unit,
            on_days,
            at_time,
        } => {
            let window = window.as_deref().map(parse_window).transpose()?;
            let parsed = ParsedTask {
                title,
                project,
                tags,
                deadline: deadline.as_deref().map(parse_instant).transpose()?,
                duration_minutes: estimate,
                bucket_name: bucket,
                recurrence: build_recurrence(recur, recur_mode, every, unit, on_days, at_time)?,
                window_start: window.map(|w| w.0),
                window_end: window.map(|w| w.1),
                dependencies,
            };
            let task = tasks::create_from_parsed(db, parsed, Utc::now())?;
            println!("Created {}", task_line(&task));
        }
        TaskCommand::List {
            status,
            project,
            bucket,
            tags,
            overdue,
            has_deadline,
            recurring,
        } => {
            let bucket_id = match bucket.as_deref() {
                None => None,
                Some("none") => Some(None),
                Some(name) => {
                    let found = db
                        .find_bucket_by_name(name)?
                        .with_context(|| format!("no bucket named '{}'", name))?;
                    Some(Some(found.id))
                }
            };
            let filter = TaskFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                project,
                bucket_id,
                tags,
                has_deadline: has_deadline.then_some(true),
                has_recurrence: recurring.then_some(true),
                overdue: overdue.then_some(true),
            };
            let found = db.list_tasks(&filter, Utc::now())?;
            if found.is_empty() {
                println!("No tasks.");
            }
            for t in found {
                println!("{}", task_line(&t));
            }
        }
        TaskCommand::Show { id } => {
            let task = db.get_task(id)?;
            print_task_detail(&task);
        }
        TaskCommand::Update {
            id,
            title,
            project,
            clear_project,
            bucket,
            clear_bucket,
            tags,
            deadline,
            clear_deadline,
            estimate,
            clear_estimate,
            window,
            clear_window,
            clear_recurrence,
            dependencies,
            clear_dependencies,
            status,
        } => {
            let bucket_id = if clear_bucket {
                Some(None)
            } else {
                match bucket.as_deref() {
                    None => None,
                    Some(name) => {
                        let found = db
                            .find_bucket_by_name(name)?
                            .with_context(|| format!("no bucket named '{}'", name))?;
                        Some(Some(found.id))
                    }
                }
            };
            let updates = UpdateTask {
                title,
                project: if clear_project {
                    Some(None)
                } else {
                    project.map(Some)
                },
                bucket_id,
                tags: (!tags.is_empty()).then_some(tags),
                deadline: if clear_deadline {
                    Some(None)
                } else {
                    deadline
                        .as_deref()
                        .map(parse_instant)
                        .transpose()?
                        .map(Some)
                },
                estimate_minutes: if clear_estimate {
                    Some(None)
                } else {
                    estimate.map(Some)
                },
                recurrence: clear_recurrence.then_some(None),
                window: if clear_window {
                    Some(None)
                } else {
                    window.as_deref().map(parse_window).transpose()?.map(Some)
                },
                dependencies: if clear_dependencies {
                    Some(Vec::new())
                } else {
                    (!dependencies.is_empty()).then_some(dependencies)
                },
                curve: None,
                status: status.as_deref().map(parse_status).transpose()?,
            };
            let task = tasks::update_task(db, id, updates, Utc::now())?;
            println!("Updated {}", task_line(&task));
        }
        TaskCommand::Complete { id, at, actual } => {
            let at = parse_instant_or_now(&at)?;
            let task = lifecycle::complete(db, id, at, actual)?;
            match task.next_due_at {
                Some(due) if task.status == TaskStatus::Open => {
                    println!("Completed #{}; next due {}", task.id, due.to_rfc3339());
                }
                _ => println!("Completed {}", task_line(&task)),
            }
        }
        TaskCommand::Delete { id, force } => {
            tasks::delete_task(db, id, force, Utc::now())?;
            println!("Deleted task {}", id);
        }
        TaskCommand::Reopen { id } => {
            let task = lifecycle::reopen(db, id, Utc::now())?;
            println!("Reopened {}", task_line(&task));
        }
        TaskCommand::Search { query } => {
            let ids = db.search_tasks(&query)?;
            if ids.is_empty() {
                println!("No matches.");
            }
            for id in ids {
                let task = db.get_task(id)?;
                println!("{}", task_line(&task));
            }
        }
    }
    Ok(())
}

fn run_bucket(db: &Database, command: BucketCommand) -> Result<()> {
    match command {
        BucketCommand::Create { name, kind } => {
            let kind = BucketKind::parse(&kind)
                .with_context(|| format!("unknown bucket kind '{}'", kind))?;
            let bucket = db.create_bucket(&CreateBucket {
                name,
                kind,
                config: None,
            })?;
            println!("Created bucket #{} {} ({})", bucket.id, bucket.name, bucket.kind.as_str());
        }
        BucketCommand::List => {
            let buckets = db.list_buckets()?;
            if buckets.is_empty() {
                println!("No buckets.");
            }
            for b in buckets {
                println!("#{} {} ({})", b.id, b.name, b.kind.as_str());
            }
        }
        BucketCommand::Show { id } => {
            let bucket = db.get_bucket(id)?;
            println!("#{} {} ({})", bucket.id, bucket.name, bucket.kind.as_str());
            if !bucket.config.is_null() {
                println!("  config: {}", bucket.config);
            }
        }
        BucketCommand::Delete { id } => {
            db.delete_bucket(id)?;
            println!("Deleted bucket {} (member tasks kept)", id);
        }
    }
    Ok(())
}
