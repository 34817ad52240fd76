use anyhow::{bail, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported task lifecycle states.
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => bail!("unknown task status '{raw}'"),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Position on the monotone `pending → running → terminal` path.
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// True when `next` is reachable from `self` without moving backwards
    /// or switching between terminal states.
    pub fn allows_transition_to(self, next: Self) -> bool {
        if self == next {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported log entry levels.
pub enum LogLevel {
    Info,
    Error,
    Success,
    Hint,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Success => "success",
            Self::Hint => "hint",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "info" => Ok(Self::Info),
            "error" => Ok(Self::Error),
            "success" => Ok(Self::Success),
            "hint" => Ok(Self::Hint),
            _ => bail!("unknown log level '{raw}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// One append-only progress log line.
pub struct LogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
/// Audit/UI mirror of a task; logs hydrate only on single-task reads.
pub struct StoredTask {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub repo_owner: String,
    pub repo_name: String,
    pub issue_number: u64,
    pub actor: String,
    pub created_at: String,
    pub updated_at: String,
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::{LogLevel, TaskStatus};

    #[test]
    fn unit_task_status_round_trips_wire_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()).expect("parse"), status);
        }
        assert!(TaskStatus::parse("cancelled").is_err());
    }

    #[test]
    fn unit_status_transitions_follow_the_monotone_path() {
        assert!(TaskStatus::Pending.allows_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Pending.allows_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Running.allows_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.allows_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Running.allows_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.allows_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.allows_transition_to(TaskStatus::Running));
    }

    #[test]
    fn unit_log_level_round_trips_wire_strings() {
        for level in [
            LogLevel::Info,
            LogLevel::Error,
            LogLevel::Success,
            LogLevel::Hint,
        ] {
            assert_eq!(LogLevel::parse(level.as_str()).expect("parse"), level);
        }
        assert!(LogLevel::parse("warning").is_err());
    }
}
