//! Line scanner: comments, blank lines and indentation.

use crate::error::{DriftwallError, DriftwallResult};

/// One meaningful line of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    /// 1-based line number in the source text.
    pub number: usize,
    /// Count of leading spaces.
    pub indent: usize,
    /// Content with indentation, comments and trailing space removed.
    pub text: String,
}

pub(crate) fn scan(source: &str) -> DriftwallResult<Vec<Line>> {
    let mut lines = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let number = idx + 1;
        let raw = raw.strip_suffix('\r').unwrap_or(raw);

        let indent = raw.len() - raw.trim_start_matches(' ').len();
        let rest = &raw[indent..];
        if rest.starts_with('\t') {
            if strip_comment(rest.trim_start()).is_empty() {
                continue;
            }
            return Err(DriftwallError::Parse {
                line: number,
                message: "tab character in indentation (use spaces)".to_string(),
            });
        }

        let text = strip_comment(rest).trim_end();
        if text.is_empty() {
            continue;
        }

        if indent == 0 {
            if text == "---" || text.starts_with("--- ") || text == "..." {
                return Err(DriftwallError::Parse {
                    line: number,
                    message: format!(
                        "document marker {:?} is not supported (exactly one document per file)",
                        text
                    ),
                });
            }
            if text.starts_with('%') {
                return Err(DriftwallError::Parse {
                    line: number,
                    message: "directives are not supported".to_string(),
                });
            }
        }

        lines.push(Line {
            number,
            indent,
            text: text.to_string(),
        });
    }

    Ok(lines)
}

/// Cut a `#` comment that starts the text or follows whitespace, outside quotes.
/// Unterminated quotes are left for the parser to report.
fn strip_comment(text: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut escaped = false;

    for (pos, ch) in text.char_indices() {
        match quote {
            Some('"') => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    quote = None;
                }
            }
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '#' if prev.map_or(true, char::is_whitespace) => return &text[..pos],
                _ => {}
            },
        }
        prev = Some(ch);
    }

    text
}
