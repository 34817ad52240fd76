//! Embedded relational store for tasks and their progress logs.
//!
//! Backed by rusqlite with a single writer connection behind a mutex; the
//! store survives restarts while queue state intentionally does not.

mod store;
mod types;

pub use store::{now_rfc3339, TaskStore};
pub use types::{LogEntry, LogLevel, StoredTask, TaskStatus};
