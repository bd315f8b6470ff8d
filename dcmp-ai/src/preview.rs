//! Char-safe truncation for diagnostics and log previews

/// Characters of raw generation output embedded in error messages
pub const RAW_RESPONSE_PREVIEW_CHARS: usize = 150;

/// Longest prompt/response preview written to debug logs
pub const MAX_LOG_PREVIEW_CHARS: usize = 4_000;

/// Truncate `input` to at most `max_chars` characters, marking the cut
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}
