//! Service layer: the operations the CLI front-end dispatches to. Each
//! function runs against an open `Database` and takes its evaluation
//! instant explicitly; only the CLI boundary reads the wall clock.

pub mod plan;
pub mod tasks;
pub mod transfer;
