//! Recursive-descent parser over scanned lines.
//!
//! Only the block subset desired-state documents use is understood. Anything
//! else (anchors, tags, block scalars, flow mappings) is an error rather than
//! a guess.

use super::scanner::Line;
use crate::error::{DriftwallError, DriftwallResult};

/// Untyped document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Scalar(String),
    Sequence(Vec<Node>),
    /// Keys in document order.
    Mapping(Vec<(String, Node)>),
}

impl Node {
    pub fn shape(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "a scalar",
            Node::Sequence(_) => "a sequence",
            Node::Mapping(_) => "a mapping",
        }
    }
}

pub(crate) fn parse_lines(lines: Vec<Line>) -> DriftwallResult<Node> {
    let mut parser = Parser { lines, pos: 0 };
    parser.parse_document()
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
}

fn parse_error(line: usize, message: impl Into<String>) -> DriftwallError {
    DriftwallError::Parse {
        line,
        message: message.into(),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Line> {
        self.lines.get(self.pos)
    }

    fn parse_document(&mut self) -> DriftwallResult<Node> {
        let Some(first) = self.peek() else {
            return Ok(Node::Mapping(Vec::new()));
        };
        if first.indent != 0 {
            return Err(parse_error(first.number, "unexpected indentation"));
        }
        if is_sequence_item(&first.text) {
            return Err(parse_error(
                first.number,
                "document root must be a mapping of keys",
            ));
        }

        let root = self.parse_mapping(0)?;
        if let Some(line) = self.peek() {
            return Err(parse_error(line.number, "unexpected indentation"));
        }
        Ok(root)
    }

    fn parse_block(&mut self, indent: usize) -> DriftwallResult<Node> {
        match self.peek() {
            Some(line) if is_sequence_item(&line.text) => self.parse_sequence(indent),
            Some(_) => self.parse_mapping(indent),
            None => Ok(Node::Scalar(String::new())),
        }
    }

    fn parse_mapping(&mut self, indent: usize) -> DriftwallResult<Node> {
        let mut entries: Vec<(String, Node)> = Vec::new();

        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            let number = line.number;
            if line.indent > indent {
                return Err(parse_error(number, "unexpected indentation"));
            }
            if is_sequence_item(&line.text) {
                return Err(parse_error(
                    number,
                    "sequence item where a mapping key was expected",
                ));
            }

            let (key, rest) = split_key(&line.text)
                .ok_or_else(|| parse_error(number, format!("expected key: value, got {:?}", line.text)))?;
            check_key(&key, number)?;
            if entries.iter().any(|(existing, _)| existing == &key) {
                return Err(parse_error(number, format!("duplicate key {:?}", key)));
            }
            self.pos += 1;

            let value = if rest.is_empty() {
                self.parse_nested(indent)?
            } else {
                parse_inline(&rest, number)?
            };
            entries.push((key, value));
        }

        Ok(Node::Mapping(entries))
    }

    /// Value of a key whose content sits on the following lines.
    fn parse_nested(&mut self, parent_indent: usize) -> DriftwallResult<Node> {
        let Some(next) = self.peek() else {
            return Ok(Node::Scalar(String::new()));
        };
        if next.indent > parent_indent {
            let indent = next.indent;
            return self.parse_block(indent);
        }
        // Compact style: `key:` followed by `- item` at the key's own indent.
        if next.indent == parent_indent && is_sequence_item(&next.text) {
            return self.parse_sequence(parent_indent);
        }
        Ok(Node::Scalar(String::new()))
    }

    fn parse_sequence(&mut self, indent: usize) -> DriftwallResult<Node> {
        let mut items = Vec::new();

        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            let number = line.number;
            if line.indent > indent {
                return Err(parse_error(number, "unexpected indentation"));
            }
            if !is_sequence_item(&line.text) {
                break;
            }

            let after_dash = &line.text[1..];
            let content = after_dash.trim_start();
            if content.is_empty() {
                self.pos += 1;
                let nested = self
                    .peek()
                    .map(|next| next.indent)
                    .filter(|next_indent| *next_indent > indent);
                let item = match nested {
                    Some(nested) => self.parse_block(nested)?,
                    None => Node::Scalar(String::new()),
                };
                items.push(item);
                continue;
            }

            if is_sequence_item(content) {
                return Err(parse_error(
                    number,
                    "nested sequences on one line are not supported",
                ));
            }

            if split_key(content).is_some() {
                // `- key: value` opens a mapping whose keys align with `key`.
                let column = indent + 1 + (after_dash.len() - content.len());
                let content = content.to_string();
                let current = &mut self.lines[self.pos];
                current.indent = column;
                current.text = content;
                items.push(self.parse_mapping(column)?);
                continue;
            }

            items.push(parse_inline(content, number)?);
            self.pos += 1;
        }

        Ok(Node::Sequence(items))
    }
}

fn is_sequence_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

/// Split `key: value` at the first `:` outside quotes that ends the line or is
/// followed by a space.
fn split_key(text: &str) -> Option<(String, String)> {
    let mut quote: Option<char> = None;
    let bytes = text.as_bytes();

    for (pos, ch) in text.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' if pos == 0 => quote = Some(ch),
                ':' => {
                    let next = bytes.get(pos + 1).copied();
                    if next.is_none() || next == Some(b' ') {
                        let key = text[..pos].trim_end().to_string();
                        let rest = text[pos + 1..].trim().to_string();
                        return Some((key, rest));
                    }
                }
                _ => {}
            },
        }
    }

    None
}

fn check_key(key: &str, line: usize) -> DriftwallResult<()> {
    let Some(first) = key.chars().next() else {
        return Err(parse_error(line, "empty mapping key"));
    };
    let problem = match first {
        '&' => Some("anchors are not supported"),
        '*' => Some("aliases are not supported"),
        '!' => Some("tags are not supported"),
        '?' => Some("complex keys are not supported"),
        '{' | '[' => Some("flow-style keys are not supported"),
        '"' | '\'' => Some("quoted keys are not supported"),
        _ => None,
    };
    match problem {
        Some(message) => Err(parse_error(line, message)),
        None => Ok(()),
    }
}

/// Parse a value written on the same line as its key or dash.
fn parse_inline(text: &str, line: usize) -> DriftwallResult<Node> {
    let text = text.trim();
    match text.chars().next() {
        Some('[') => parse_inline_sequence(text, line),
        _ => parse_scalar(text, line).map(Node::Scalar),
    }
}

fn parse_inline_sequence(text: &str, line: usize) -> DriftwallResult<Node> {
    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| parse_error(line, format!("invalid inline sequence: {:?}", text)))?;

    if inner.trim().is_empty() {
        return Ok(Node::Sequence(Vec::new()));
    }

    let mut items = Vec::new();
    for part in split_commas(inner, line)? {
        let part = part.trim();
        if part.is_empty() {
            return Err(parse_error(line, "empty element in inline sequence"));
        }
        if part.starts_with('[') {
            return Err(parse_error(line, "nested inline sequences are not supported"));
        }
        items.push(Node::Scalar(parse_scalar(part, line)?));
    }
    Ok(Node::Sequence(items))
}

fn split_commas(inner: &str, line: usize) -> DriftwallResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (pos, ch) in inner.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                ',' => {
                    parts.push(&inner[start..pos]);
                    start = pos + 1;
                }
                _ => {}
            },
        }
    }
    if quote.is_some() {
        return Err(parse_error(line, "unterminated quoted string"));
    }
    parts.push(&inner[start..]);
    Ok(parts)
}

fn parse_scalar(text: &str, line: usize) -> DriftwallResult<String> {
    let Some(first) = text.chars().next() else {
        return Ok(String::new());
    };

    match first {
        '"' => return unquote_double(text, line),
        '\'' => return unquote_single(text, line),
        '&' => return Err(parse_error(line, "anchors are not supported")),
        '*' => return Err(parse_error(line, "aliases are not supported")),
        '!' => return Err(parse_error(line, "tags are not supported")),
        '|' | '>' => return Err(parse_error(line, "block scalars are not supported")),
        '{' => return Err(parse_error(line, "flow mappings are not supported")),
        '@' | '`' => {
            return Err(parse_error(
                line,
                format!("reserved indicator {:?} must be quoted", first),
            ))
        }
        _ => {}
    }

    if text.contains(": ") {
        return Err(parse_error(
            line,
            format!("unexpected ':' in plain value {:?} (quote it)", text),
        ));
    }

    match text {
        "~" | "null" | "Null" | "NULL" => Ok(String::new()),
        _ => Ok(text.to_string()),
    }
}

fn unquote_double(text: &str, line: usize) -> DriftwallResult<String> {
    let mut out = String::new();
    let mut chars = text[1..].chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                let trailing: String = chars.collect();
                if !trailing.trim().is_empty() {
                    return Err(parse_error(
                        line,
                        format!("unexpected text after quoted string: {:?}", trailing.trim()),
                    ));
                }
                return Ok(out);
            }
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| parse_error(line, "unterminated quoted string"))?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    other => {
                        return Err(parse_error(
                            line,
                            format!("unsupported escape sequence \\{}", other),
                        ))
                    }
                }
            }
            other => out.push(other),
        }
    }

    Err(parse_error(line, "unterminated quoted string"))
}

fn unquote_single(text: &str, line: usize) -> DriftwallResult<String> {
    let mut out = String::new();
    let mut chars = text[1..].chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
                continue;
            }
            let trailing: String = chars.collect();
            if !trailing.trim().is_empty() {
                return Err(parse_error(
                    line,
                    format!("unexpected text after quoted string: {:?}", trailing.trim()),
                ));
            }
            return Ok(out);
        }
        out.push(ch);
    }

    Err(parse_error(line, "unterminated quoted string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::scanner::scan;

    fn parse(text: &str) -> DriftwallResult<Node> {
        parse_lines(scan(text)?)
    }

    fn scalar(value: &str) -> Node {
        Node::Scalar(value.to_string())
    }

    fn error_line(result: DriftwallResult<Node>) -> (usize, String) {
        match result {
            Err(DriftwallError::Parse { line, message }) => (line, message),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn parses_nested_mappings_and_sequences() {
        let node = parse(
            "version: \"1\"\npools:\n  - name: tank\n    disks: [a, 'b c']\n    options:\n      compression: lz4\n",
        )
        .unwrap();

        let expected = Node::Mapping(vec![
            ("version".into(), scalar("1")),
            (
                "pools".into(),
                Node::Sequence(vec![Node::Mapping(vec![
                    ("name".into(), scalar("tank")),
                    (
                        "disks".into(),
                        Node::Sequence(vec![scalar("a"), scalar("b c")]),
                    ),
                    (
                        "options".into(),
                        Node::Mapping(vec![("compression".into(), scalar("lz4"))]),
                    ),
                ])]),
            ),
        ]);
        assert_eq!(node, expected);
    }

    #[test]
    fn compact_sequences_sit_at_key_indent() {
        let node = parse("shares:\n- name: media\n  path: /tank/media\nversion: 1\n").unwrap();
        let Node::Mapping(entries) = node else {
            panic!("root is not a mapping")
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0].1,
            Node::Sequence(vec![Node::Mapping(vec![
                ("name".into(), scalar("media")),
                ("path".into(), scalar("/tank/media")),
            ])])
        );
        assert_eq!(entries[1], ("version".into(), scalar("1")));
    }

    #[test]
    fn block_sequence_of_scalars() {
        let node = parse("disks:\n  - /dev/disk/by-id/a\n  - \"/dev/disk/by-id/b\"\n").unwrap();
        assert_eq!(
            node,
            Node::Mapping(vec![(
                "disks".into(),
                Node::Sequence(vec![scalar("/dev/disk/by-id/a"), scalar("/dev/disk/by-id/b")])
            )])
        );
    }

    #[test]
    fn empty_inline_sequence_and_empty_value() {
        let node = parse("pools: []\ndatasets:\n").unwrap();
        assert_eq!(
            node,
            Node::Mapping(vec![
                ("pools".into(), Node::Sequence(vec![])),
                ("datasets".into(), scalar("")),
            ])
        );
    }

    #[test]
    fn quoted_scalars_unescape() {
        let node = parse("a: \"say \\\"hi\\\"\"\nb: 'it''s'\n").unwrap();
        assert_eq!(
            node,
            Node::Mapping(vec![
                ("a".into(), scalar("say \"hi\"")),
                ("b".into(), scalar("it's")),
            ])
        );
    }

    #[test]
    fn unsupported_constructs_fail() {
        for text in [
            "base: &anchor x\n",
            "copy: *anchor\n",
            "name: !!str tank\n",
            "comment: |\n  text\n",
            "comment: >\n  text\n",
            "opts: {a: b}\n",
            "disks: [[a, b]]\n",
            "name: \"open\n",
            "name: 'open\n",
        ] {
            assert!(parse(text).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn duplicate_keys_fail_with_line() {
        let (line, message) = error_line(parse("version: 1\nversion: 2\n"));
        assert_eq!(line, 2);
        assert!(message.contains("duplicate"));
    }

    #[test]
    fn unexpected_indentation_fails() {
        let (line, message) = error_line(parse("version: 1\n  extra: x\n"));
        assert_eq!(line, 2);
        assert!(message.contains("indentation"));

        let (line, _) = error_line(parse("pools:\n  - name: a\n      bad: x\n"));
        assert_eq!(line, 3);
    }

    #[test]
    fn smaller_indent_closes_the_block() {
        let node = parse("pools:\n  - name: a\n    disks: []\n  - name: b\ndatasets: []\n").unwrap();
        let Node::Mapping(entries) = node else {
            panic!("root is not a mapping")
        };
        let Node::Sequence(pools) = &entries[0].1 else {
            panic!("pools is not a sequence")
        };
        assert_eq!(pools.len(), 2);
        assert_eq!(entries[1].0, "datasets");
    }

    #[test]
    fn colons_inside_values_are_allowed_without_space() {
        let node = parse("addr: 10.0.0.1:445\n").unwrap();
        assert_eq!(
            node,
            Node::Mapping(vec![("addr".into(), scalar("10.0.0.1:445"))])
        );
    }
}
