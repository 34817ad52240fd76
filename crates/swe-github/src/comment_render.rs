//! Rendering of the tracking-comment body.
//!
//! The bridge owns one comment per task and edits it in place; every render
//! produces the complete replacement body: a state header, the task marker,
//! and any appended detail lines.

pub const TASK_MARKER_PREFIX: &str = "<!-- swe-bridge-task:";
pub const TASK_MARKER_SUFFIX: &str = " -->";
const COMMENT_MAX_CHARS: usize = 65_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Tracker states rendered as the comment header.
pub enum TrackerState {
    Queued,
    /// Attempt counter is 1-based; the suffix only renders on retries.
    Working { attempt: usize, max_attempts: usize },
    Completed,
    Failed,
}

impl TrackerState {
    pub fn header(self) -> String {
        match self {
            Self::Queued => "⏳ **Queued**".to_string(),
            Self::Working {
                attempt,
                max_attempts,
            } => {
                if attempt > 1 {
                    format!("🔄 **Working** (attempt {attempt}/{max_attempts})")
                } else {
                    "🔄 **Working**".to_string()
                }
            }
            Self::Completed => "✅ **Completed**".to_string(),
            Self::Failed => "❌ **Failed**".to_string(),
        }
    }
}

/// Render the full replacement comment body.
///
/// Applying the same state twice produces the same body; edits are
/// idempotent by construction.
pub fn render_tracker_body(
    state: TrackerState,
    task_id: &str,
    prompt_summary: &str,
    details: &[String],
) -> String {
    let mut body = format!(
        "{}\n\n**Task**: `{task_id}`\n**Request**: {prompt_summary}\n",
        state.header()
    );
    if !details.is_empty() {
        body.push('\n');
        for detail in details {
            body.push_str(detail);
            body.push('\n');
        }
    }
    body.push_str(&format!(
        "\n{TASK_MARKER_PREFIX}{task_id}{TASK_MARKER_SUFFIX}"
    ));
    if body.chars().count() > COMMENT_MAX_CHARS {
        return swe_core::truncate_head_tail(&body, COMMENT_MAX_CHARS);
    }
    body
}

/// Detail section for a successful run with pushed changes.
pub fn render_completed_detail(
    summary: &str,
    changed_files: &[String],
    compare_url: Option<&str>,
) -> String {
    let mut detail = String::new();
    if !summary.trim().is_empty() {
        detail.push_str(&format!("{}\n", summary.trim()));
    }
    if !changed_files.is_empty() {
        detail.push_str(&format!("\n**Changed files** ({}):\n", changed_files.len()));
        for file in changed_files {
            detail.push_str(&format!("- `{file}`\n"));
        }
    }
    if let Some(url) = compare_url {
        detail.push_str(&format!("\n[Create a pull request]({url})\n"));
    }
    detail.trim_end().to_string()
}

/// Detail section for an analysis-only run (no filesystem changes).
pub fn render_no_change_detail(summary: &str) -> String {
    let mut detail =
        "The agent finished without modifying any files (analysis only).".to_string();
    if !summary.trim().is_empty() {
        detail.push_str(&format!("\n\n{}", summary.trim()));
    }
    detail
}
