//! Decoding of GitHub comment webhook payloads into internal event records.

use anyhow::{Context, Result};
use serde::Deserialize;

pub const EVENT_ISSUE_COMMENT: &str = "issue_comment";
pub const EVENT_REVIEW_COMMENT: &str = "pull_request_review_comment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Enumerates the webhook event kinds the bridge dispatches on.
pub enum CommentEventKind {
    /// Top-level comment on an issue or on a pull request conversation.
    IssueComment,
    /// Inline review comment on pull request code.
    ReviewComment,
}

impl CommentEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IssueComment => EVENT_ISSUE_COMMENT,
            Self::ReviewComment => EVENT_REVIEW_COMMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Internal record for a comment delivery, normalized across event kinds.
pub struct CommentEvent {
    pub kind: CommentEventKind,
    pub action: String,
    pub repo: String,
    pub default_branch: String,
    /// Primary issue or pull request number the comment belongs to.
    pub number: u64,
    pub is_pr: bool,
    pub title: String,
    pub body: String,
    pub comment_id: u64,
    pub comment_body: String,
    pub author: String,
    pub author_is_bot: bool,
    /// Head ref, present only on review-comment payloads.
    pub pr_head_ref: Option<String>,
    /// PR state (`open`/`closed`), present only on review-comment payloads.
    pub pr_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubUser {
    login: String,
    #[serde(default, rename = "type")]
    user_type: Option<String>,
}

impl GithubUser {
    fn is_bot(&self) -> bool {
        self.user_type.as_deref() == Some("Bot")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    user: GithubUser,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRepository {
    full_name: String,
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssue {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequestRef {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPullRequest {
    number: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state: Option<String>,
    head: GithubPullRequestRef,
}

#[derive(Debug, Clone, Deserialize)]
struct IssueCommentPayload {
    action: String,
    issue: GithubIssue,
    comment: GithubComment,
    repository: GithubRepository,
}

#[derive(Debug, Clone, Deserialize)]
struct ReviewCommentPayload {
    action: String,
    comment: GithubComment,
    pull_request: GithubPullRequest,
    repository: GithubRepository,
}

/// Decode a webhook delivery into a [`CommentEvent`].
///
/// Returns `Ok(None)` for event names the bridge does not dispatch on; the
/// caller acknowledges those without creating a task. Malformed payloads for
/// recognized event names are an error.
pub fn decode_comment_event(event_name: &str, payload: &[u8]) -> Result<Option<CommentEvent>> {
    match event_name {
        EVENT_ISSUE_COMMENT => {
            let payload: IssueCommentPayload = serde_json::from_slice(payload)
                .context("malformed issue_comment webhook payload")?;
            Ok(Some(CommentEvent {
                kind: CommentEventKind::IssueComment,
                action: payload.action,
                repo: payload.repository.full_name,
                default_branch: payload
                    .repository
                    .default_branch
                    .unwrap_or_else(|| "main".to_string()),
                number: payload.issue.number,
                is_pr: payload.issue.pull_request.is_some(),
                title: payload.issue.title.unwrap_or_default(),
                body: payload.issue.body.unwrap_or_default(),
                comment_id: payload.comment.id,
                comment_body: payload.comment.body.unwrap_or_default(),
                author: payload.comment.user.login.clone(),
                author_is_bot: payload.comment.user.is_bot(),
                pr_head_ref: None,
                pr_state: None,
            }))
        }
        EVENT_REVIEW_COMMENT => {
            let payload: ReviewCommentPayload = serde_json::from_slice(payload)
                .context("malformed pull_request_review_comment webhook payload")?;
            Ok(Some(CommentEvent {
                kind: CommentEventKind::ReviewComment,
                action: payload.action,
                repo: payload.repository.full_name,
                default_branch: payload
                    .repository
                    .default_branch
                    .unwrap_or_else(|| "main".to_string()),
                number: payload.pull_request.number,
                is_pr: true,
                title: payload.pull_request.title.unwrap_or_default(),
                body: payload.pull_request.body.unwrap_or_default(),
                comment_id: payload.comment.id,
                comment_body: payload.comment.body.unwrap_or_default(),
                author: payload.comment.user.login.clone(),
                author_is_bot: payload.comment.user.is_bot(),
                pr_head_ref: Some(payload.pull_request.head.git_ref),
                pr_state: payload.pull_request.state,
            }))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_comment_event, CommentEventKind};
    use serde_json::json;

    fn issue_comment_payload(pull_request: Option<serde_json::Value>) -> Vec<u8> {
        let mut issue = json!({
            "number": 123,
            "title": "Fix the typo",
            "body": "There is a typo in the README.",
        });
        if let Some(pull_request) = pull_request {
            issue["pull_request"] = pull_request;
        }
        serde_json::to_vec(&json!({
            "action": "created",
            "issue": issue,
            "comment": {
                "id": 9001,
                "body": "/code fix typo",
                "user": {"login": "octocat", "type": "User"},
            },
            "repository": {"full_name": "acme/repo", "default_branch": "main"},
        }))
        .expect("payload")
    }

    #[test]
    fn functional_decode_issue_comment_produces_issue_context() {
        let event = decode_comment_event("issue_comment", &issue_comment_payload(None))
            .expect("decode")
            .expect("recognized");
        assert_eq!(event.kind, CommentEventKind::IssueComment);
        assert_eq!(event.repo, "acme/repo");
        assert_eq!(event.number, 123);
        assert!(!event.is_pr);
        assert!(!event.author_is_bot);
        assert_eq!(event.comment_id, 9001);
        assert_eq!(event.pr_head_ref, None);
    }

    #[test]
    fn functional_decode_issue_comment_with_pull_request_ref_is_pr_context() {
        let payload =
            issue_comment_payload(Some(json!({"url": "https://api.github.com/pulls/123"})));
        let event = decode_comment_event("issue_comment", &payload)
            .expect("decode")
            .expect("recognized");
        assert!(event.is_pr);
        assert_eq!(event.pr_head_ref, None);
    }

    #[test]
    fn functional_decode_review_comment_carries_head_ref_and_state() {
        let payload = serde_json::to_vec(&json!({
            "action": "created",
            "comment": {
                "id": 42,
                "body": "/code refactor this function",
                "user": {"login": "hubot", "type": "Bot"},
            },
            "pull_request": {
                "number": 456,
                "title": "Add feature",
                "body": "Closes #100",
                "state": "open",
                "head": {"ref": "feature-branch"},
            },
            "repository": {"full_name": "acme/repo", "default_branch": "main"},
        }))
        .expect("payload");
        let event = decode_comment_event("pull_request_review_comment", &payload)
            .expect("decode")
            .expect("recognized");
        assert_eq!(event.kind, CommentEventKind::ReviewComment);
        assert_eq!(event.number, 456);
        assert!(event.is_pr);
        assert!(event.author_is_bot);
        assert_eq!(event.pr_head_ref.as_deref(), Some("feature-branch"));
        assert_eq!(event.pr_state.as_deref(), Some("open"));
    }

    #[test]
    fn unit_decode_unrecognized_event_returns_none() {
        let decoded = decode_comment_event("push", b"{}").expect("decode");
        assert!(decoded.is_none());
    }

    #[test]
    fn regression_decode_malformed_recognized_payload_is_an_error() {
        assert!(decode_comment_event("issue_comment", b"{not json").is_err());
        assert!(decode_comment_event("issue_comment", b"{}").is_err());
    }
}
