//! The unit of work and its semantic identifier.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Semantic task id components: repo, optional issue/pr numbers, timestamp.
pub struct TaskId {
    pub repo: String,
    pub issue_number: Option<u64>,
    pub pr_number: Option<u64>,
    pub timestamp_ns: u128,
}

impl TaskId {
    /// Render the id as `{repo|/→-}[-issue-{N}][-pr-{M}]-{nanos}`.
    ///
    /// The nanosecond timestamp keeps ids unique across the process lifetime
    /// even when deliveries for the same issue arrive in a burst.
    pub fn render(&self) -> String {
        let mut rendered = self.repo.replace('/', "-");
        if let Some(issue_number) = self.issue_number {
            rendered.push_str(&format!("-issue-{issue_number}"));
        }
        if let Some(pr_number) = self.pr_number {
            rendered.push_str(&format!("-pr-{pr_number}"));
        }
        rendered.push_str(&format!("-{}", self.timestamp_ns));
        rendered
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The unit of work flowing from the webhook pipeline through the dispatcher
/// into the executor.
pub struct Task {
    pub id: String,
    /// Canonical `owner/name` slug.
    pub repo: String,
    /// Primary issue or pull request number.
    pub number: u64,
    /// Base branch, the target of the eventual pull request.
    pub branch: String,
    /// Composed instruction forwarded to the provider.
    pub prompt: String,
    /// Short human-readable form for comments and logs.
    pub prompt_summary: String,
    pub is_pr: bool,
    /// Head ref when the event originated on an open pull request.
    pub pr_branch: Option<String>,
    /// `open`/`closed` when applicable.
    pub pr_state: Option<String>,
    /// Actor who triggered the task.
    pub username: String,
    /// Retry counter maintained by the dispatcher.
    pub attempt: usize,
    /// Free-form key/value context forwarded to the provider environment.
    pub prompt_context: BTreeMap<String, String>,
}

impl Task {
    /// Serialization key for per-repo/number exclusive execution.
    pub fn serialization_key(&self) -> String {
        format!("{}#{}", self.repo, self.number)
    }

    /// True when commits should append to the existing open PR head ref.
    pub fn is_append_path(&self) -> bool {
        self.is_pr
            && self.pr_branch.is_some()
            && self.pr_state.as_deref() == Some("open")
    }

    pub fn repo_owner(&self) -> &str {
        self.repo.split('/').next().unwrap_or(&self.repo)
    }

    pub fn repo_name(&self) -> &str {
        self.repo.split('/').nth(1).unwrap_or(&self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::{Task, TaskId};
    use std::collections::BTreeMap;

    fn sample_task() -> Task {
        Task {
            id: "acme-repo-issue-123-1734567891000000000".to_string(),
            repo: "acme/repo".to_string(),
            number: 123,
            branch: "main".to_string(),
            prompt: "fix typo".to_string(),
            prompt_summary: "fix typo".to_string(),
            is_pr: false,
            pr_branch: None,
            pr_state: None,
            username: "octocat".to_string(),
            attempt: 1,
            prompt_context: BTreeMap::new(),
        }
    }

    #[test]
    fn unit_task_id_renders_issue_only_form() {
        let id = TaskId {
            repo: "acme/repo".to_string(),
            issue_number: Some(123),
            pr_number: None,
            timestamp_ns: 1_734_567_891_000_000_000,
        };
        assert_eq!(id.render(), "acme-repo-issue-123-1734567891000000000");
    }

    #[test]
    fn unit_task_id_renders_pr_only_form() {
        let id = TaskId {
            repo: "acme/repo".to_string(),
            issue_number: None,
            pr_number: Some(456),
            timestamp_ns: 1_734_567_891_000_000_000,
        };
        assert_eq!(id.render(), "acme-repo-pr-456-1734567891000000000");
    }

    #[test]
    fn unit_task_id_renders_enriched_issue_then_pr_form() {
        let id = TaskId {
            repo: "acme/repo".to_string(),
            issue_number: Some(100),
            pr_number: Some(456),
            timestamp_ns: 1_734_567_891_000_000_000,
        };
        assert_eq!(id.render(), "acme-repo-issue-100-pr-456-1734567891000000000");
    }

    #[test]
    fn unit_serialization_key_joins_repo_and_number() {
        assert_eq!(sample_task().serialization_key(), "acme/repo#123");
    }

    #[test]
    fn functional_append_path_requires_open_pr_with_head_ref() {
        let mut task = sample_task();
        assert!(!task.is_append_path());
        task.is_pr = true;
        task.pr_branch = Some("feature".to_string());
        task.pr_state = Some("open".to_string());
        assert!(task.is_append_path());
        task.pr_state = Some("closed".to_string());
        assert!(!task.is_append_path());
    }

    #[test]
    fn unit_repo_owner_and_name_split_the_slug() {
        let task = sample_task();
        assert_eq!(task.repo_owner(), "acme");
        assert_eq!(task.repo_name(), "repo");
    }
}
