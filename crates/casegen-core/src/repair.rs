//! Heuristic repairs for almost-JSON.
//!
//! Each pass is string-aware: characters inside double-quoted strings are
//! never treated as structure. Passes run in a fixed order and the result
//! is only ever re-validated by the parser; nothing here guarantees
//! validity.

use crate::extract::{extract_shape, Shape, StringState};

/// Apply every repair pass, expecting a top-level object.
pub fn repair(text: &str) -> String {
    repair_shape(text, Shape::Object)
}

/// Apply every repair pass for the given shape.
pub fn repair_shape(text: &str, shape: Shape) -> String {
    let extraction = extract_shape(text, shape);
    let mut out = remove_trailing_commas(&extraction.text);
    out = strip_comments(&out);
    out = quote_single_quoted_keys(&out);
    out = escape_interior_quotes(&out);
    if extraction.truncated {
        out = close_truncated(&out);
        out = remove_trailing_commas(&out);
    }
    out
}

/// Drop commas directly followed (ignoring whitespace) by `}` or `]`.
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();

    for (i, &c) in chars.iter().enumerate() {
        if !state.in_string && c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        state.advance(c);
        out.push(c);
    }
    out
}

/// Strip `//` line comments and `/* */` block comments outside strings.
pub fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !state.in_string && c == '/' {
            match chars.get(i + 1) {
                Some('/') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                Some('*') => {
                    i += 2;
                    while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                        i += 1;
                    }
                    i = (i + 2).min(chars.len());
                    continue;
                }
                _ => {}
            }
        }
        state.advance(c);
        out.push(c);
        i += 1;
    }
    out
}

/// Rewrite `'key':` as `"key":` in key position.
///
/// Only bare identifier-like keys directly after `{` or `,` are touched;
/// single quotes anywhere else, including apostrophes in values, stay.
pub fn quote_single_quoted_keys(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if !state.in_string && c == '\'' && in_key_position(&out) {
            if let Some(close) = single_quoted_key_end(&chars, i) {
                out.push('"');
                out.extend(&chars[i + 1..close]);
                out.push('"');
                i = close + 1;
                continue;
            }
        }
        state.advance(c);
        out.push(c);
        i += 1;
    }
    out
}

fn in_key_position(emitted: &str) -> bool {
    matches!(emitted.trim_end().chars().last(), Some('{') | Some(','))
}

/// Index of the closing quote when `chars[open..]` is `'word'` then `:`.
fn single_quoted_key_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '-') {
        j += 1;
    }
    if j == open + 1 || chars.get(j) != Some(&'\'') {
        return None;
    }
    let after = chars[j + 1..].iter().find(|c| !c.is_whitespace());
    (after == Some(&':')).then_some(j)
}

/// Escape unescaped quotes that appear inside string values.
///
/// A quote inside a string is treated as the string terminator only when
/// the next non-whitespace character is `:`, `,`, `}` or `]` (or the input
/// ends). Anything else is an interior quote and gets escaped. Raw control
/// characters inside strings are escaped too.
pub fn escape_interior_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
                if matches!(next, None | Some(':') | Some(',') | Some('}') | Some(']')) {
                    in_string = false;
                    out.push('"');
                } else {
                    out.push_str("\\\"");
                }
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// Close an unterminated string and any open objects/arrays.
pub fn close_truncated(text: &str) -> String {
    let mut stack = Vec::new();
    let mut state = StringState::default();

    for c in text.chars() {
        let was_in_string = state.in_string;
        state.advance(c);
        if was_in_string || state.in_string {
            continue;
        }
        match c {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.to_string();
    if state.in_string {
        if state.pending_escape() {
            out.pop();
        }
        out.push('"');
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if out.ends_with(',') {
        out.pop();
    } else if out.ends_with(':') {
        out.push_str(" null");
    }

    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn parses(text: &str) -> Value {
        serde_json::from_str(text).unwrap_or_else(|e| panic!("{e}: {text}"))
    }

    #[test]
    fn trailing_commas_removed_outside_strings() {
        let fixed = remove_trailing_commas(r#"{"a": [1, 2, ], "b": "x,}", }"#);
        assert_eq!(parses(&fixed), json!({"a": [1, 2], "b": "x,}"}));
    }

    #[test]
    fn comments_stripped_outside_strings() {
        let fixed = strip_comments(
            "{\n  // note\n  \"url\": \"http://x.io/*y*/\", /* gone */ \"n\": 1\n}",
        );
        assert_eq!(parses(&fixed), json!({"url": "http://x.io/*y*/", "n": 1}));
    }

    #[test]
    fn single_quoted_keys_only_in_key_position() {
        let fixed = quote_single_quoted_keys(r#"{'title': "Bob's 'big': day", 'n-1' : 2}"#);
        assert_eq!(parses(&fixed), json!({"title": "Bob's 'big': day", "n-1": 2}));
    }

    #[test]
    fn interior_quotes_escaped() {
        let fixed = escape_interior_quotes(r#"{"quote": "She said "go" now", "n": 1}"#);
        assert_eq!(parses(&fixed), json!({"quote": "She said \"go\" now", "n": 1}));
    }

    #[test]
    fn raw_newlines_in_strings_escaped() {
        let fixed = escape_interior_quotes("{\"body\": \"line one\nline two\"}");
        assert_eq!(parses(&fixed), json!({"body": "line one\nline two"}));
    }

    #[test]
    fn truncated_structures_closed() {
        assert_eq!(
            parses(&close_truncated(r#"{"a": [1, 2, {"b": "cut"#)),
            json!({"a": [1, 2, {"b": "cut"}]})
        );
        assert_eq!(
            parses(&close_truncated(r#"{"a": 1, "b":"#)),
            json!({"a": 1, "b": null})
        );
        assert_eq!(parses(&close_truncated(r#"{"a": [1, 2,"#)), json!({"a": [1, 2]}));
    }

    #[test]
    fn full_repair_pipeline() {
        let raw = "```json\n{\n  'title': \"Deal\", // name\n  \"items\": [1, 2,],\n}\n```";
        assert_eq!(parses(&repair(raw)), json!({"title": "Deal", "items": [1, 2]}));
    }

    #[test]
    fn repair_leaves_valid_json_alone() {
        let valid = r#"{"a": "x, ]", "b": [true, null]}"#;
        assert_eq!(repair(valid), valid);
    }
}
