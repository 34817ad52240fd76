//! The task state machine:
//! clone → invoke provider → detect changes → commit → push → link.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use swe_dispatch::{RunDisposition, TaskRunner};
use swe_github::{GithubApiClient, InstallationTokenSource, RepoRef, Task, TrackerState};
use swe_provider::{GenerateOutcome, GenerateRequest, ProviderClient, ProviderError};
use swe_store::{LogLevel, TaskStatus, TaskStore};

use crate::compare_url::{compose_commit_url, compose_compare_url};
use crate::git_workspace::{build_clone_url, GitWorkspace};
use crate::tracker::{CommentTracker, TrackerSeed};

const FAILURE_DETAIL_MAX_CHARS: usize = 1_200;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Everything the executor needs besides its collaborators.
pub struct ExecutorConfig {
    pub platform_base_url: String,
    pub git_author_name: String,
    pub git_author_email: String,
    pub provider_deadline: Duration,
    /// Mirrors the dispatcher budget; rendered in the Working header.
    pub max_attempts: usize,
    pub workdir_root: PathBuf,
    /// Credential pass-through for the provider subprocess.
    pub provider_env: BTreeMap<String, String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            platform_base_url: "https://github.com".to_string(),
            git_author_name: "swe-agent".to_string(),
            git_author_email: "swe-agent@users.noreply.github.com".to_string(),
            provider_deadline: Duration::from_secs(600),
            max_attempts: 3,
            workdir_root: std::env::temp_dir(),
            provider_env: BTreeMap::new(),
        }
    }
}

/// Executes tasks pulled off the dispatcher.
///
/// The tracking-comment handle lives here, keyed by task id, never on the
/// task itself; it is dropped once the task reaches a terminal state.
pub struct Executor {
    config: ExecutorConfig,
    provider: Arc<dyn ProviderClient>,
    github: Arc<GithubApiClient>,
    store: Arc<TaskStore>,
    token_source: InstallationTokenSource,
    trackers: Mutex<HashMap<String, TrackerSeed>>,
}

struct StepError {
    stage: &'static str,
    retryable: bool,
    error: anyhow::Error,
}

impl StepError {
    fn retryable(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self {
            stage,
            retryable: true,
            error,
        }
    }

    fn terminal(stage: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |error| Self {
            stage,
            retryable: false,
            error,
        }
    }
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        provider: Arc<dyn ProviderClient>,
        github: Arc<GithubApiClient>,
        store: Arc<TaskStore>,
        token_source: InstallationTokenSource,
    ) -> Self {
        Self {
            config,
            provider,
            github,
            store,
            token_source,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Register the Queued tracking comment created at enqueue time.
    pub fn register_tracker(&self, task_id: &str, seed: TrackerSeed) {
        self.lock_trackers().insert(task_id.to_string(), seed);
    }

    fn take_tracker(&self, task_id: &str) -> TrackerSeed {
        self.lock_trackers().remove(task_id).unwrap_or(TrackerSeed {
            comment_id: None,
            details: Vec::new(),
        })
    }

    fn store_tracker(&self, task_id: &str, seed: TrackerSeed) {
        self.lock_trackers().insert(task_id.to_string(), seed);
    }

    fn lock_trackers(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrackerSeed>> {
        match self.trackers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log(&self, task_id: &str, level: LogLevel, message: &str) {
        if let Err(error) = self.store.add_log(task_id, level, message) {
            tracing::warn!(task_id, "failed to record task log: {error:#}");
        }
    }

    async fn execute_attempt(
        &self,
        task: &Task,
        tracker: &mut CommentTracker,
        working: TrackerState,
    ) -> Result<(), StepError> {
        // Cloning
        let token = self
            .token_source
            .token()
            .await
            .map_err(StepError::retryable("clone"))?;
        let clone_url = build_clone_url(&self.config.platform_base_url, &task.repo, &token);
        let target_branch = if task.is_append_path() {
            task.pr_branch.clone().unwrap_or_else(|| task.branch.clone())
        } else {
            task.branch.clone()
        };
        let workspace = GitWorkspace::clone_shallow(
            &self.config.workdir_root,
            &clone_url,
            &target_branch,
            &token,
            &task.id,
        )
        .await
        .map_err(StepError::retryable("clone"))?;
        self.log(
            &task.id,
            LogLevel::Info,
            &format!("cloned {} at '{target_branch}'", task.repo),
        );
        tracker
            .append_message(working, &format!("Cloned `{}` at `{target_branch}`.", task.repo))
            .await;

        // Invoking
        let outcome = self.invoke_provider(task, &workspace, &token).await?;
        self.log(
            &task.id,
            LogLevel::Info,
            &format!(
                "provider {} finished in {}ms",
                self.provider.name(),
                outcome.elapsed_ms
            ),
        );

        // Detecting; failures here report immediately.
        let changed_files = workspace
            .changed_files()
            .await
            .map_err(StepError::terminal("detect"))?;
        if changed_files.is_empty() {
            self.log(
                &task.id,
                LogLevel::Hint,
                "no file changes detected; analysis only",
            );
            tracker.set_completed_no_changes(&outcome.summary).await;
            return Ok(());
        }
        self.log(
            &task.id,
            LogLevel::Info,
            &format!("{} file(s) modified", changed_files.len()),
        );

        // Committing
        let head_branch = if task.is_append_path() {
            task.pr_branch.clone().unwrap_or_else(|| task.branch.clone())
        } else {
            let name = format!(
                "swe-agent/{}-{}",
                task.number,
                swe_core::current_unix_timestamp_ms()
            );
            workspace
                .create_branch(&name)
                .await
                .map_err(StepError::terminal("commit"))?;
            name
        };
        let commit_message = format!(
            "{}\n\nRequested by @{} in {}#{}",
            task.prompt_summary, task.username, task.repo, task.number
        );
        workspace
            .commit_all(
                &self.config.git_author_name,
                &self.config.git_author_email,
                &commit_message,
            )
            .await
            .map_err(StepError::terminal("commit"))?;

        // Pushing; transient remote failures retry.
        workspace
            .push(&head_branch)
            .await
            .map_err(StepError::retryable("push"))?;
        self.log(
            &task.id,
            LogLevel::Success,
            &format!("pushed branch '{head_branch}'"),
        );

        // Linking; never retried, a second pass could double-post.
        if task.is_append_path() {
            let sha = workspace
                .head_sha()
                .await
                .map_err(StepError::terminal("link"))?;
            let commit_url = compose_commit_url(&self.config.platform_base_url, &task.repo, &sha);
            let short_sha = &sha[..sha.len().min(7)];
            tracker.note(format!(
                "Pushed [`{short_sha}`]({commit_url}) to `{head_branch}`."
            ));
            tracker
                .set_completed(&outcome.summary, &changed_files, None)
                .await;
        } else {
            let compare = compose_compare_url(
                &self.config.platform_base_url,
                &task.repo,
                &task.branch,
                &head_branch,
                &task.prompt_summary,
                task.number,
            );
            tracker
                .set_completed(&outcome.summary, &changed_files, Some(&compare))
                .await;
        }
        Ok(())
    }

    async fn invoke_provider(
        &self,
        task: &Task,
        workspace: &GitWorkspace,
        token: &str,
    ) -> Result<GenerateOutcome, StepError> {
        let mut env = self.config.provider_env.clone();
        for (key, value) in &task.prompt_context {
            env.insert(format!("SWE_TASK_{}", key.to_ascii_uppercase()), value.clone());
        }
        env.insert("GITHUB_TOKEN".to_string(), token.to_string());

        self.provider
            .generate_code(GenerateRequest {
                prompt: task.prompt.clone(),
                workdir: workspace.repo_dir().to_path_buf(),
                deadline: Some(self.config.provider_deadline),
                env,
            })
            .await
            .map_err(classify_provider_error)
    }
}

/// Timeouts and broken configuration are terminal; transient process
/// failures stay inside the dispatcher's attempts budget.
fn classify_provider_error(error: ProviderError) -> StepError {
    let retryable = match &error {
        ProviderError::Timeout { .. } | ProviderError::InvalidConfig(_) => false,
        ProviderError::Failed { .. } | ProviderError::Spawn { .. } | ProviderError::Io(_) => true,
    };
    StepError {
        stage: "invoke",
        retryable,
        error: anyhow::Error::new(error),
    }
}

#[async_trait]
impl TaskRunner for Executor {
    async fn run(&self, task: &Task) -> RunDisposition {
        let repo = match RepoRef::parse(&task.repo) {
            Ok(repo) => repo,
            Err(error) => {
                let reason = format!("invalid repository slug: {error:#}");
                self.log(&task.id, LogLevel::Error, &reason);
                let _ = self.store.update_status(&task.id, TaskStatus::Failed);
                return RunDisposition::Failed { reason };
            }
        };

        let seed = self.take_tracker(&task.id);
        let mut tracker = CommentTracker::attach(
            Arc::clone(&self.github),
            repo.clone(),
            task.number,
            task.id.clone(),
            task.prompt_summary.clone(),
            seed,
        );
        let working = TrackerState::Working {
            attempt: task.attempt,
            max_attempts: self.config.max_attempts,
        };
        tracker.set_state(working).await;
        if let Err(error) = self.store.update_status(&task.id, TaskStatus::Running) {
            tracing::warn!(task_id = %task.id, "failed to mark task running: {error:#}");
        }
        self.log(
            &task.id,
            LogLevel::Info,
            &format!(
                "execution started (attempt {}/{})",
                task.attempt, self.config.max_attempts
            ),
        );

        match self.execute_attempt(task, &mut tracker, working).await {
            Ok(()) => {
                if let Err(error) = self.store.update_status(&task.id, TaskStatus::Completed) {
                    tracing::warn!(task_id = %task.id, "failed to mark task completed: {error:#}");
                }
                self.log(&task.id, LogLevel::Success, "task completed");
                RunDisposition::Completed
            }
            Err(step) if step.retryable => {
                let reason = format!("{} failed: {:#}", step.stage, step.error);
                self.log(&task.id, LogLevel::Error, &reason);
                tracker
                    .append_message(
                        working,
                        &format!(
                            "Attempt {} failed during {}; the task will be retried.",
                            task.attempt, step.stage
                        ),
                    )
                    .await;
                self.store_tracker(&task.id, tracker.seed());
                RunDisposition::Retry { reason }
            }
            Err(step) => {
                let reason = format!("{} failed: {:#}", step.stage, step.error);
                self.log(&task.id, LogLevel::Error, &reason);
                tracker
                    .set_failed(&swe_core::truncate_head_tail(
                        &reason,
                        FAILURE_DETAIL_MAX_CHARS,
                    ))
                    .await;
                if let Err(error) = self.store.update_status(&task.id, TaskStatus::Failed) {
                    tracing::warn!(task_id = %task.id, "failed to mark task failed: {error:#}");
                }
                RunDisposition::Failed { reason }
            }
        }
    }

    async fn abandon(&self, task: &Task, reason: &str) {
        self.log(&task.id, LogLevel::Error, reason);
        if let Ok(repo) = RepoRef::parse(&task.repo) {
            let seed = self.take_tracker(&task.id);
            let mut tracker = CommentTracker::attach(
                Arc::clone(&self.github),
                repo,
                task.number,
                task.id.clone(),
                task.prompt_summary.clone(),
                seed,
            );
            tracker
                .set_failed(&swe_core::truncate_head_tail(
                    reason,
                    FAILURE_DETAIL_MAX_CHARS,
                ))
                .await;
        }
        if let Err(error) = self.store.update_status(&task.id, TaskStatus::Failed) {
            tracing::warn!(task_id = %task.id, "failed to mark task failed: {error:#}");
        }
    }
}
