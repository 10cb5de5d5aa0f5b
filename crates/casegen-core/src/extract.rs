//! Locate the structured payload inside free-form generator output.
//!
//! Generators wrap JSON in markdown fences, prefix it with prose, or stop
//! mid-object when they hit a token limit. Extraction strips the wrapper
//! and returns the balanced region that starts at an opening brace or
//! bracket, reporting whether the region was cut off.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

/// Which top-level structure to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    #[default]
    Object,
    Array,
    Either,
}

impl Shape {
    fn opens(self, c: char) -> bool {
        match self {
            Shape::Object => c == '{',
            Shape::Array => c == '[',
            Shape::Either => c == '{' || c == '[',
        }
    }

    /// Whether a parsed value has the expected top-level structure.
    pub fn accepts(self, value: &serde_json::Value) -> bool {
        match self {
            Shape::Object => value.is_object(),
            Shape::Array => value.is_array(),
            Shape::Either => value.is_object() || value.is_array(),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Shape::Object => "a JSON object",
            Shape::Array => "a JSON array",
            Shape::Either => "a JSON object or array",
        }
    }
}

/// Result of extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// The region opened a structure that never closed
    pub truncated: bool,
}

/// Tracks whether a scan position is inside a double-quoted string.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct StringState {
    pub in_string: bool,
    escaped: bool,
}

impl StringState {
    pub fn advance(&mut self, c: char) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == '"' {
                self.in_string = false;
            }
        } else if c == '"' {
            self.in_string = true;
        }
    }

    pub fn pending_escape(&self) -> bool {
        self.escaped
    }
}

const MAX_CANDIDATES: usize = 32;

/// Extract a JSON object from `text`.
pub fn extract(text: &str) -> Extraction {
    extract_shape(text, Shape::Object)
}

/// Extract a structure of the given shape from `text`.
///
/// Only openers that can begin JSON (a `{` followed by a key, `}` or a
/// comment, for example) are candidates. Candidates are tried left to
/// right and the first balanced one that parses as-is wins. When none
/// parse, the longest candidate is returned so that repair works on the
/// real payload. Text without any opener comes back trimmed and unchanged.
///
/// A candidate that never closes is usually a payload cut off by a token
/// limit. It can also be a stray opener in prose whose quotes swallowed
/// the real payload, as in `the key "open {" matters. {"a": 1}`. Openers
/// that the cut-off scan read as string content are therefore tried as
/// well, and a balanced candidate among them supersedes the cut-off one.
pub fn extract_shape(text: &str, shape: Shape) -> Extraction {
    let body = strip_fences(text);
    let mut fallback: Option<Extraction> = None;
    let mut implausible: Option<Extraction> = None;
    let mut search_from = 0;

    for _ in 0..MAX_CANDIDATES {
        let Some(start) = next_opener(body, search_from, shape) else {
            break;
        };
        let span = scan(body, start, shape);

        if !plausible_start(body, start) {
            if implausible.is_none() {
                implausible = Some(span.extraction(body, start));
            }
            search_from = start + 1;
            continue;
        }

        let candidate = span.extraction(body, start);
        if !candidate.truncated && parses(&candidate.text) {
            return candidate;
        }

        let next = match span.end {
            Some(end) => {
                keep_longest(&mut fallback, candidate);
                end + 1
            }
            None => match quoted_payload(body, &span.quoted_openers, shape) {
                Some(QuotedPayload::Parsed(found)) => return found,
                Some(QuotedPayload::Unparsed(found, end)) => {
                    keep_longest(&mut fallback, found);
                    end + 1
                }
                None => {
                    keep_longest(&mut fallback, candidate);
                    break;
                }
            },
        };
        if next >= body.len() {
            break;
        }
        search_from = next;
    }

    fallback.or(implausible).unwrap_or_else(|| Extraction {
        text: body.to_string(),
        truncated: false,
    })
}

fn parses(text: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(text).is_ok()
}

fn keep_longest(best: &mut Option<Extraction>, candidate: Extraction) {
    if best
        .as_ref()
        .map_or(true, |b| candidate.text.len() > b.text.len())
    {
        *best = Some(candidate);
    }
}

fn next_opener(body: &str, from: usize, shape: Shape) -> Option<usize> {
    body[from..]
        .char_indices()
        .find(|(_, c)| shape.opens(*c))
        .map(|(i, _)| from + i)
}

/// Whether the opener at `start` is followed by something JSON allows there.
fn plausible_start(body: &str, start: usize) -> bool {
    let mut rest = body[start..].chars();
    let opener = rest.next();
    let Some(next) = rest.find(|c| !c.is_whitespace()) else {
        return true;
    };
    match opener {
        Some('{') => matches!(next, '"' | '\'' | '}' | '/'),
        Some('[') => {
            matches!(next, '{' | '[' | ']' | '"' | '\'' | '-' | '/' | 't' | 'f' | 'n')
                || next.is_ascii_digit()
        }
        _ => false,
    }
}

enum QuotedPayload {
    Parsed(Extraction),
    /// Balanced but not yet valid; carries the closing index
    Unparsed(Extraction, usize),
}

/// First balanced candidate among openers a cut-off scan saw inside strings.
fn quoted_payload(body: &str, openers: &[usize], shape: Shape) -> Option<QuotedPayload> {
    openers
        .iter()
        .copied()
        .filter(|&at| plausible_start(body, at))
        .find_map(|at| {
            let end = scan(body, at, shape).end?;
            let found = Extraction {
                text: body[at..=end].to_string(),
                truncated: false,
            };
            Some(if parses(&found.text) {
                QuotedPayload::Parsed(found)
            } else {
                QuotedPayload::Unparsed(found, end)
            })
        })
}

struct Span {
    /// Byte index of the closing character
    end: Option<usize>,
    /// Openers met inside string literals, only collected while unclosed
    quoted_openers: Vec<usize>,
}

impl Span {
    fn extraction(&self, body: &str, start: usize) -> Extraction {
        match self.end {
            Some(end) => Extraction {
                text: body[start..=end].to_string(),
                truncated: false,
            },
            None => Extraction {
                text: body[start..].to_string(),
                truncated: true,
            },
        }
    }
}

fn scan(text: &str, start: usize, shape: Shape) -> Span {
    let mut depth = 0usize;
    let mut state = StringState::default();
    let mut quoted_openers = Vec::new();

    for (offset, c) in text[start..].char_indices() {
        let was_in_string = state.in_string;
        state.advance(c);
        if was_in_string || state.in_string {
            if was_in_string && state.in_string && shape.opens(c) {
                quoted_openers.push(start + offset);
            }
            continue;
        }
        match c {
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Span {
                        end: Some(start + offset),
                        quoted_openers: Vec::new(),
                    };
                }
            }
            _ => {}
        }
    }
    Span {
        end: None,
        quoted_openers,
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag.
pub fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    let inner = inner.trim_end();
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
