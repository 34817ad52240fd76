//! The ingestion pipeline: verify → decode → dedupe → authorize → parse →
//! build task → store → tracking comment → enqueue.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use swe_core::current_unix_timestamp_ns;
use swe_dispatch::{DispatchHandle, EnqueueError};
use swe_executor::{CommentTracker, Executor};
use swe_github::{
    compose_prompt, decode_comment_event, extract_instruction, summarize_instruction,
    verify_webhook_signature, CommentEvent, GithubApiClient, RepoRef, Task, TaskId,
};
use swe_store::{now_rfc3339, LogEntry, LogLevel, StoredTask, TaskStatus, TaskStore};

use crate::authorize::{authorize_actor, AuthorizerConfig};
use crate::dedupe::CommentDeduper;

pub const DEFAULT_ENRICHMENT_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
/// Pipeline knobs sourced from the environment at startup.
pub struct PipelineConfig {
    pub webhook_secret: String,
    pub trigger: String,
    pub enrichment_deadline: Duration,
    pub authorizer: AuthorizerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What the webhook handler should answer for one delivery.
pub enum WebhookOutcome {
    /// 202; exactly one task row and one tracking comment exist.
    Queued { task_id: String },
    /// 200 with an explanatory body; no task was created.
    Ignored { reason: String },
    /// 400; the payload was recognized but malformed.
    Rejected { reason: String },
    /// 401; the delivery failed authentication. No detail leaks.
    Unauthorized,
    /// 503; the upstream platform is expected to redeliver.
    Busy { closed: bool },
    /// 500; an internal store failure.
    Error { reason: String },
}

/// One pipeline instance serves every repository delivering to this bridge.
pub struct WebhookPipeline {
    config: PipelineConfig,
    github: Arc<GithubApiClient>,
    store: Arc<TaskStore>,
    dispatch: DispatchHandle,
    executor: Arc<Executor>,
    deduper: CommentDeduper,
}

impl WebhookPipeline {
    pub fn new(
        config: PipelineConfig,
        github: Arc<GithubApiClient>,
        store: Arc<TaskStore>,
        dispatch: DispatchHandle,
        executor: Arc<Executor>,
    ) -> Self {
        Self {
            config,
            github,
            store,
            dispatch,
            executor,
            deduper: CommentDeduper::default(),
        }
    }

    pub async fn process(&self, event_name: &str, signature: &str, body: &[u8]) -> WebhookOutcome {
        if let Err(error) = verify_webhook_signature(body, signature, &self.config.webhook_secret)
        {
            tracing::info!("webhook rejected: {error:#}");
            return WebhookOutcome::Unauthorized;
        }

        let event = match decode_comment_event(event_name, body) {
            Ok(Some(event)) => event,
            Ok(None) => {
                return WebhookOutcome::Ignored {
                    reason: format!("event '{event_name}' is not dispatched"),
                }
            }
            Err(error) => {
                return WebhookOutcome::Rejected {
                    reason: format!("{error:#}"),
                }
            }
        };

        if event.action != "created" {
            return WebhookOutcome::Ignored {
                reason: format!("action '{}' is not processed", event.action),
            };
        }
        if event.author_is_bot {
            return WebhookOutcome::Ignored {
                reason: "bot comment ignored".to_string(),
            };
        }
        if !self.deduper.mark_if_new(event.comment_id) {
            return WebhookOutcome::Ignored {
                reason: "Duplicate comment ignored".to_string(),
            };
        }

        let repo = match RepoRef::parse(&event.repo) {
            Ok(repo) => repo,
            Err(error) => {
                return WebhookOutcome::Rejected {
                    reason: format!("{error:#}"),
                }
            }
        };
        if !authorize_actor(&self.github, &repo, &event.author, self.config.authorizer).await {
            return WebhookOutcome::Ignored {
                reason: format!("user '{}' lacks write permission", event.author),
            };
        }

        let Some(instruction) = extract_instruction(&event.comment_body, &self.config.trigger)
        else {
            return WebhookOutcome::Ignored {
                reason: format!("no '{}' trigger in comment", self.config.trigger),
            };
        };

        // Hold queue capacity before any state mutation; a saturated queue
        // must reject without leaving a task row behind.
        let slot = match self.dispatch.reserve() {
            Ok(slot) => slot,
            Err(EnqueueError::QueueFull) => return WebhookOutcome::Busy { closed: false },
            Err(EnqueueError::QueueClosed) => return WebhookOutcome::Busy { closed: true },
        };

        let task = self.build_task(&event, &repo, &instruction).await;
        if let Err(error) = self.store.create(&stored_record(&task)) {
            return WebhookOutcome::Error {
                reason: format!("failed to persist task: {error:#}"),
            };
        }

        match CommentTracker::create(
            Arc::clone(&self.github),
            repo,
            task.number,
            task.id.clone(),
            task.prompt_summary.clone(),
        )
        .await
        {
            Ok(tracker) => self.executor.register_tracker(&task.id, tracker.seed()),
            Err(error) => {
                tracing::warn!(
                    task_id = %task.id,
                    "failed to create tracking comment, executor will post one: {error:#}"
                );
            }
        }

        let task_id = task.id.clone();
        tracing::info!(task_id = %task_id, repo = %task.repo, number = task.number, "task queued");
        slot.submit(task);
        WebhookOutcome::Queued { task_id }
    }

    async fn build_task(&self, event: &CommentEvent, repo: &RepoRef, instruction: &str) -> Task {
        let mut pr_branch = event.pr_head_ref.clone();
        let mut pr_state = event.pr_state.clone();
        if event.is_pr && pr_branch.is_none() {
            // Issue-comment payloads on PRs carry no head ref; fetch it so
            // the append path can reuse the PR branch.
            match self.github.pull_request(repo, event.number).await {
                Ok(details) => {
                    pr_branch = Some(details.head_ref);
                    pr_state = Some(details.state);
                }
                Err(error) => {
                    tracing::warn!(
                        repo = %event.repo,
                        number = event.number,
                        "pull request lookup failed, falling back to a fresh branch: {error:#}"
                    );
                }
            }
        }

        let issue_number = if event.is_pr {
            self.github
                .enrich_closing_issue(repo, event.number, self.config.enrichment_deadline)
                .await
        } else {
            Some(event.number)
        };
        let id = TaskId {
            repo: event.repo.clone(),
            issue_number,
            pr_number: event.is_pr.then_some(event.number),
            timestamp_ns: current_unix_timestamp_ns(),
        }
        .render();

        let mut prompt_context = BTreeMap::new();
        prompt_context.insert("event".to_string(), event.kind.as_str().to_string());
        prompt_context.insert("trigger".to_string(), self.config.trigger.clone());
        prompt_context.insert("repo".to_string(), event.repo.clone());
        prompt_context.insert("base_branch".to_string(), event.default_branch.clone());

        Task {
            id,
            repo: event.repo.clone(),
            number: event.number,
            branch: event.default_branch.clone(),
            prompt: compose_prompt(instruction, &event.title, &event.body),
            prompt_summary: summarize_instruction(instruction),
            is_pr: event.is_pr,
            pr_branch,
            pr_state,
            username: event.author.clone(),
            attempt: 1,
            prompt_context,
        }
    }
}

fn stored_record(task: &Task) -> StoredTask {
    let now = now_rfc3339();
    StoredTask {
        id: task.id.clone(),
        title: task.prompt_summary.clone(),
        status: TaskStatus::Pending,
        repo_owner: task.repo_owner().to_string(),
        repo_name: task.repo_name().to_string(),
        issue_number: task.number,
        actor: task.username.clone(),
        created_at: now.clone(),
        updated_at: now,
        logs: vec![LogEntry {
            timestamp: now_rfc3339(),
            level: LogLevel::Info,
            message: format!("task accepted from @{}", task.username),
        }],
    }
}
