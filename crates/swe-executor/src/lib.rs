//! Task execution: git workspaces, the provider invocation state machine,
//! and the tracking comment that mirrors progress back to the platform.

mod compare_url;
mod executor;
mod git_workspace;
mod tracker;

pub use compare_url::{compose_commit_url, compose_compare_url};
pub use executor::{Executor, ExecutorConfig};
pub use tracker::{CommentTracker, TrackerSeed};
