//! Aggregation of line-oriented structured provider output.

use serde_json::Value;

const SUMMARY_MAX_CHARS: usize = 4_000;

/// Parse each stdout line as JSON and collect the human-readable pieces:
/// `message` (string or assistant message object), `item.text`, and
/// `item.content[].text`. When nothing structured surfaces, the raw text is
/// the summary.
pub(crate) fn aggregate_structured_lines(stdout: &str) -> String {
    let mut pieces = Vec::new();
    for line in stdout.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
            continue;
        };
        collect_line_text(&value, &mut pieces);
    }

    let aggregated = pieces.join("\n");
    let summary = if aggregated.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        aggregated
    };
    swe_core::truncate_head_tail(&summary, SUMMARY_MAX_CHARS)
}

fn collect_line_text(value: &Value, pieces: &mut Vec<String>) {
    match value.get("message") {
        Some(Value::String(message)) => push_non_empty(pieces, message),
        Some(message @ Value::Object(_)) => collect_content_blocks(message.get("content"), pieces),
        _ => {}
    }

    if let Some(item) = value.get("item") {
        if let Some(text) = item.get("text").and_then(Value::as_str) {
            push_non_empty(pieces, text);
        }
        collect_content_blocks(item.get("content"), pieces);
    }
}

fn collect_content_blocks(content: Option<&Value>, pieces: &mut Vec<String>) {
    let Some(Value::Array(blocks)) = content else {
        return;
    };
    for block in blocks {
        if let Some(text) = block.get("text").and_then(Value::as_str) {
            push_non_empty(pieces, text);
        }
    }
}

fn push_non_empty(pieces: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        pieces.push(trimmed.to_string());
    }
}
