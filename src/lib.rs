//! tempo: a personal task manager where urgency is a function of time.
//!
//! The core is a set of synchronous services over a transactional SQLite
//! store: a priority-curve evaluator, a recurrence engine, a dependency
//! resolver, and a daily planner. Every query that depends on "now" takes
//! the evaluation instant as an argument; only the CLI boundary reads the
//! wall clock.

pub mod commands;
pub mod curve;
pub mod db;
pub mod graph;
pub mod lifecycle;
pub mod logging;
pub mod planner;
pub mod recurrence;

pub use db::{Database, DbError};
