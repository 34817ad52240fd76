//! Trigger-phrase parsing and prompt composition.

pub const DEFAULT_TRIGGER: &str = "/code";
const SUMMARY_MAX_CHARS: usize = 80;

/// Extract the user instruction following the first trigger occurrence.
///
/// Absence of the trigger means "no task", not an error. A bare trigger with
/// nothing after it yields an empty instruction.
pub fn extract_instruction(body: &str, trigger: &str) -> Option<String> {
    let index = body.find(trigger)?;
    let remainder = &body[index + trigger.len()..];
    Some(remainder.trim().to_string())
}

/// Compose the provider prompt from the instruction and issue/pr context.
pub fn compose_prompt(instruction: &str, title: &str, body: &str) -> String {
    format!("{instruction}\n\n---\n\n# Issue Context\n## Title\n{title}\n## Body\n{body}")
}

/// Short single-line form of the instruction, for comment headers and logs.
pub fn summarize_instruction(instruction: &str) -> String {
    let first_line = instruction.lines().next().unwrap_or_default().trim();
    if first_line.is_empty() {
        return "(no instruction)".to_string();
    }
    swe_core::truncate_for_log(first_line, SUMMARY_MAX_CHARS)
}
