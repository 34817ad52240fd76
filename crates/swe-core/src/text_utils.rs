/// Truncate text without breaking unicode boundaries and append ellipsis.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text.chars().take(max_chars).collect::<String>();
    truncated.push_str("...");
    truncated
}

/// Truncate long output keeping both head and tail with an ellipsis marker.
///
/// Subprocess logs put the interesting failure at the end, so the tail must
/// survive truncation.
pub fn truncate_head_tail(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let head_chars = max_chars / 2;
    let tail_chars = max_chars.saturating_sub(head_chars);
    let head = text.chars().take(head_chars).collect::<String>();
    let tail = text
        .chars()
        .skip(total.saturating_sub(tail_chars))
        .collect::<String>();
    format!("{head}\n... [{} chars elided] ...\n{tail}", total - max_chars)
}
