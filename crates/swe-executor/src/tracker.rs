//! The tracking comment: the canonical user-facing progress record.
//!
//! One owner per task, full-body replacement edits, and tracker failures are
//! logged and swallowed so they never mask the underlying task status.

use std::sync::Arc;

use anyhow::Result;

use swe_github::comment_render::{
    render_completed_detail, render_no_change_detail, render_tracker_body,
};
use swe_github::{GithubApiClient, RepoRef, TrackerState};

#[derive(Debug, Clone)]
/// Portable tracker state carried between attempts of the same task.
pub struct TrackerSeed {
    pub comment_id: Option<u64>,
    pub details: Vec<String>,
}

/// Editor for the single comment that mirrors task state.
pub struct CommentTracker {
    client: Arc<GithubApiClient>,
    repo: RepoRef,
    issue_number: u64,
    task_id: String,
    prompt_summary: String,
    comment_id: Option<u64>,
    details: Vec<String>,
}

impl CommentTracker {
    /// Post the initial `Queued` comment. This is the only tracker call whose
    /// failure propagates: without a comment there is nothing to track.
    pub async fn create(
        client: Arc<GithubApiClient>,
        repo: RepoRef,
        issue_number: u64,
        task_id: String,
        prompt_summary: String,
    ) -> Result<Self> {
        let mut tracker = Self {
            client,
            repo,
            issue_number,
            task_id,
            prompt_summary,
            comment_id: None,
            details: Vec::new(),
        };
        let body = tracker.render(TrackerState::Queued);
        let created = tracker
            .client
            .create_issue_comment(&tracker.repo, tracker.issue_number, &body)
            .await?;
        tracker.comment_id = Some(created.id);
        Ok(tracker)
    }

    /// Re-attach to an existing comment for a later attempt.
    pub fn attach(
        client: Arc<GithubApiClient>,
        repo: RepoRef,
        issue_number: u64,
        task_id: String,
        prompt_summary: String,
        seed: TrackerSeed,
    ) -> Self {
        Self {
            client,
            repo,
            issue_number,
            task_id,
            prompt_summary,
            comment_id: seed.comment_id,
            details: seed.details,
        }
    }

    pub fn seed(&self) -> TrackerSeed {
        TrackerSeed {
            comment_id: self.comment_id,
            details: self.details.clone(),
        }
    }

    /// Replace the header, preserving appended detail sections.
    pub async fn set_state(&mut self, state: TrackerState) {
        let body = self.render(state);
        self.push_body(&body).await;
    }

    /// Queue a detail line without editing; the next edit carries it.
    pub fn note(&mut self, message: String) {
        self.details.push(message);
    }

    /// Append one detail line under the current header.
    pub async fn append_message(&mut self, state: TrackerState, message: &str) {
        self.details.push(message.to_string());
        let body = self.render(state);
        self.push_body(&body).await;
    }

    pub async fn set_completed(
        &mut self,
        summary: &str,
        changed_files: &[String],
        compare_url: Option<&str>,
    ) {
        self.details
            .push(render_completed_detail(summary, changed_files, compare_url));
        let body = self.render(TrackerState::Completed);
        self.push_body(&body).await;
    }

    /// Terminal edit for a run that modified nothing.
    pub async fn set_completed_no_changes(&mut self, summary: &str) {
        self.details.push(render_no_change_detail(summary));
        let body = self.render(TrackerState::Completed);
        self.push_body(&body).await;
    }

    pub async fn set_failed(&mut self, error_text: &str) {
        self.details
            .push(format!("```\n{}\n```", error_text.trim()));
        let body = self.render(TrackerState::Failed);
        self.push_body(&body).await;
    }

    fn render(&self, state: TrackerState) -> String {
        render_tracker_body(state, &self.task_id, &self.prompt_summary, &self.details)
    }

    async fn push_body(&mut self, body: &str) {
        let result = match self.comment_id {
            Some(comment_id) => self
                .client
                .update_issue_comment(&self.repo, comment_id, body)
                .await,
            None => {
                // The Queued comment never landed; post one now so later
                // edits have a target.
                self.client
                    .create_issue_comment(&self.repo, self.issue_number, body)
                    .await
            }
        };
        match result {
            Ok(response) => {
                self.comment_id = Some(response.id);
            }
            Err(error) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    "tracking comment update failed: {error:#}"
                );
            }
        }
    }
}
