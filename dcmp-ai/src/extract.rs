//! Response extraction
//!
//! Turns the generation service's text output into a structural JSON value.
//! Output may arrive wrapped in a markdown code fence (with or without a
//! language tag); an unfenced body is the normal case, not an error.

use serde_json::Value;
use std::ops::Range;
use thiserror::Error;

use crate::preview::truncate_chars;

/// Longest slice of the original text carried by an [`ExtractionError`]
pub const MAX_EXTRACTION_TEXT_CHARS: usize = 1_000;

const FENCE: &str = "```";

/// Output is not syntactically valid JSON after fence removal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response is not valid JSON at byte {offset}: {message}")]
pub struct ExtractionError {
    /// Original (unstripped) text, truncated
    pub text: String,
    /// Byte offset into the original text where parsing failed
    pub offset: usize,
    /// Parser message
    pub message: String,
}

/// Parse generation output into a structural value
pub fn extract(raw: &str) -> Result<Value, ExtractionError> {
    let range = fenced_body(raw).unwrap_or(0..raw.len());
    let body = &raw[range.clone()];

    serde_json::from_str(body).map_err(|e| ExtractionError {
        text: truncate_chars(raw, MAX_EXTRACTION_TEXT_CHARS),
        offset: (range.start + byte_offset(body, e.line(), e.column())).min(raw.len()),
        message: e.to_string(),
    })
}

/// Byte range of the content inside a leading code fence, if there is one
///
/// The opening fence must be the first non-whitespace text and may carry a
/// language tag on its own line (` ```json `). The closing fence is removed
/// only when the text ends with one; an unterminated fence keeps the rest of
/// the text as body.
pub fn fenced_body(raw: &str) -> Option<Range<usize>> {
    let open = raw.len() - raw.trim_start().len();
    if !raw[open..].starts_with(FENCE) {
        return None;
    }
    let after_open = open + FENCE.len();

    let line_end = raw[after_open..]
        .find('\n')
        .map_or(raw.len(), |i| after_open + i);
    let tag = raw[after_open..line_end].trim_end_matches('\r');

    let body_start = if is_language_tag(tag) {
        (line_end + 1).min(raw.len())
    } else {
        // Inline fence: ```{"a":1}``` or ```json {"a":1}```
        after_open + inline_tag_len(tag)
    };

    let content_end = raw.trim_end().len().max(body_start);
    let body_end = if raw[body_start..content_end].ends_with(FENCE) {
        content_end - FENCE.len()
    } else {
        content_end
    };

    Some(body_start..body_end)
}

/// Length of a leading `tag ` prefix on an inline fence line, 0 when absent
fn inline_tag_len(line: &str) -> usize {
    let Some(tag_end) = line.find(char::is_whitespace) else {
        return 0;
    };
    let tag = &line[..tag_end];
    if !tag.starts_with(|c: char| c.is_ascii_alphabetic()) || !is_language_tag(tag) {
        return 0;
    }
    let rest = &line[tag_end..];
    tag_end + (rest.len() - rest.trim_start().len())
}

fn is_language_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// Convert a parser line/column position into a byte offset within `text`
fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    if line <= 1 {
        return column.min(text.len());
    }
    let line_start = text
        .match_indices('\n')
        .nth(line - 2)
        .map_or(text.len(), |(i, _)| i + 1);
    (line_start + column).min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_and_bare_extract_identically() {
        let fenced = extract("```json\n{\"a\":1}\n```").unwrap();
        let bare = extract("{\"a\":1}").unwrap();

        assert_eq!(fenced, bare);
        assert_eq!(bare, json!({"a": 1}));
    }

    #[test]
    fn test_fence_without_language_tag() {
        assert_eq!(extract("```\n{\"a\":1}\n```\n").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_inline_fence() {
        assert_eq!(extract("```{\"a\":1}```").unwrap(), json!({"a": 1}));
        assert_eq!(extract("```json {\"a\":1}```").unwrap(), json!({"a": 1}));
        assert_eq!(extract("```{\"a\": 1}```").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_unterminated_fence_keeps_body() {
        assert_eq!(extract("```json\n{\"a\":1}\n").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_leading_whitespace_before_fence() {
        assert_eq!(
            extract("\n  ```JSON\r\n{\"a\":1}\r\n```  ").unwrap(),
            json!({"a": 1})
        );
    }

    #[test]
    fn test_content_near_fence_characters_survives() {
        // Character-class trimming of "```json\n" would eat the leading 'n' and 's'
        let value = extract("```json\n\"json-ish string\"\n```").unwrap();
        assert_eq!(value, json!("json-ish string"));

        let value = extract("{\"abc\":\"ends with backtick `\"}").unwrap();
        assert_eq!(value["abc"], "ends with backtick `");
    }

    #[test]
    fn test_malformed_json_reports_offset_at_truncation() {
        let raw = "{\"a\":";
        let err = extract(raw).unwrap_err();

        assert_eq!(err.text, raw);
        assert!(err.offset >= raw.len() - 1);
        assert!(err.offset <= raw.len());
    }

    #[test]
    fn test_offset_is_relative_to_original_text() {
        let raw = "```json\n{\"a\": 1,\n \"b\": }\n```";
        let err = extract(raw).unwrap_err();

        let bad = raw.find("}\n```").unwrap();
        assert!(err.offset >= bad - 1 && err.offset <= bad + 1, "offset {}", err.offset);
        assert_eq!(err.text, raw);
    }

    #[test]
    fn test_empty_output_is_extraction_error() {
        let err = extract("").unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("EOF"));
    }

    #[test]
    fn test_long_text_is_truncated() {
        let raw = format!("{{\"a\": \"{}", "x".repeat(5_000));
        let err = extract(&raw).unwrap_err();

        assert!(err.text.len() < raw.len());
        assert!(err.text.contains("[truncated, total_chars="));
    }
}
