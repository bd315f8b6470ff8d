//! Advisory lint for ABC notation bodies
//!
//! Track notation is expected to contain no blank lines, no fixed tune headers
//! (those are assembled by the renderer) and no voice declarations. These
//! checks only produce warnings; a Track is never rejected for its notation.

use std::fmt;

/// Tune-level headers owned by the renderer, not by individual Tracks
const FIXED_HEADERS: &[char] = &['X', 'T', 'C', 'Z', 'N', 'P', 'W'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotationWarning {
    /// Empty line inside the body (1-based line number)
    BlankLine { line: usize },
    /// Fixed tune header such as `X:` or `T:`
    FixedHeader { line: usize, directive: char },
    /// `V:` voice declaration
    VoiceDeclaration { line: usize },
}

impl fmt::Display for NotationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotationWarning::BlankLine { line } => write!(f, "line {}: blank line", line),
            NotationWarning::FixedHeader { line, directive } => {
                write!(f, "line {}: fixed header '{}:' not allowed", line, directive)
            }
            NotationWarning::VoiceDeclaration { line } => {
                write!(f, "line {}: voice declaration not allowed", line)
            }
        }
    }
}

pub(crate) fn lint(abc: &str) -> Vec<NotationWarning> {
    let mut warnings = Vec::new();
    // Leading/trailing whitespace around the whole body is harmless
    let body = abc.trim_matches(|c| c == '\n' || c == '\r');
    let leading = abc.len() - abc.trim_start_matches(|c| c == '\n' || c == '\r').len();
    let offset = abc[..leading].matches('\n').count();

    for (i, raw_line) in body.lines().enumerate() {
        let line = i + 1 + offset;
        let text = raw_line.trim();
        if text.is_empty() {
            warnings.push(NotationWarning::BlankLine { line });
            continue;
        }

        let mut chars = text.chars();
        if let (Some(first), Some(':')) = (chars.next(), chars.next()) {
            if first == 'V' {
                warnings.push(NotationWarning::VoiceDeclaration { line });
            } else if FIXED_HEADERS.contains(&first) {
                warnings.push(NotationWarning::FixedHeader {
                    line,
                    directive: first,
                });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_body_has_no_warnings() {
        let abc = "Q:1/4=120\nM:4/4\nL:1/8\nK:Am\n% Verse 1\n\"Am\" A,2 E,2 ^G,A, B,A, |\n";
        assert!(lint(abc).is_empty());
    }

    #[test]
    fn test_blank_lines_and_headers_flagged() {
        let abc = "X:1\nT:Song\nK:C\nC D E F|\n\nV:1\nG A B c|";
        assert_eq!(
            lint(abc),
            vec![
                NotationWarning::FixedHeader {
                    line: 1,
                    directive: 'X'
                },
                NotationWarning::FixedHeader {
                    line: 2,
                    directive: 'T'
                },
                NotationWarning::BlankLine { line: 5 },
                NotationWarning::VoiceDeclaration { line: 6 },
            ]
        );
    }

    #[test]
    fn test_line_numbers_account_for_leading_newlines() {
        let warnings = lint("\n\nK:C\nW:lyrics");
        assert_eq!(
            warnings,
            vec![NotationWarning::FixedHeader {
                line: 4,
                directive: 'W'
            }]
        );
        assert_eq!(warnings[0].to_string(), "line 4: fixed header 'W:' not allowed");
    }
}
