//! GitHub-facing domain types and transport for the swe-bridge.
//!
//! Covers webhook signature verification, comment-event payload decoding,
//! trigger-phrase parsing, the task model with its semantic id, the REST and
//! GraphQL client used for permissions/comments/enrichment, and rendering of
//! the tracking comment body.

pub mod api_client;
pub mod comment_render;
pub mod task;
pub mod token_source;
pub mod transport_helpers;
pub mod trigger;
pub mod webhook_event;
pub mod webhook_signature;

pub use api_client::{
    CommentCreateResponse, GithubApiClient, GithubApiClientConfig, PullRequestDetails, RepoRef,
};
pub use comment_render::{render_tracker_body, TrackerState};
pub use task::{Task, TaskId};
pub use token_source::InstallationTokenSource;
pub use trigger::{compose_prompt, extract_instruction, summarize_instruction};
pub use webhook_event::{decode_comment_event, CommentEvent, CommentEventKind};
pub use webhook_signature::verify_webhook_signature;
