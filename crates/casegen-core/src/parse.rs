//! Bounded extract -> parse -> repair loop.
//!
//! ```text
//! Parsing --ok--> Succeeded
//!    |
//!   err, attempts left --> Repairing --> Parsing
//!    |
//!   err, none left --> Exhausted
//! ```
//!
//! The first attempt parses the extracted text verbatim; every later
//! attempt parses the repaired form of the previous attempt's input.

use serde::Serialize;
use serde_json::Value;

use crate::extract::{extract_shape, Shape};
use crate::repair::repair_shape;

pub const DEFAULT_PARSE_ATTEMPTS: u32 = 3;

/// Characters of context captured either side of an error position.
const CONTEXT_RADIUS: usize = 150;
/// Characters of raw input kept in a failure preview.
const PREVIEW_CHARS: usize = 500;

/// How an attempt's input was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTransform {
    Extracted,
    Repaired,
}

/// Position and surroundings of a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseErrorDetail {
    pub message: String,
    /// 1-based; 0 when the error has no position
    pub line: usize,
    pub column: usize,
    /// Byte offset into the attempt's input
    pub offset: usize,
    pub context: String,
}

impl ParseErrorDetail {
    fn from_serde(err: &serde_json::Error, input: &str) -> Self {
        let offset = offset_of(input, err.line(), err.column());
        Self {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
            offset,
            context: context_around(input, offset),
        }
    }

    fn unpositioned(message: String, input: &str) -> Self {
        Self {
            message,
            line: 0,
            column: 0,
            offset: 0,
            context: context_around(input, 0),
        }
    }
}

/// One step of the parse loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseAttempt {
    pub attempt: u32,
    pub transform: ParseTransform,
    pub input: String,
    pub error: Option<ParseErrorDetail>,
}

/// A structure recovered from raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseSuccess {
    pub value: Value,
    pub attempts: Vec<ParseAttempt>,
}

impl ParseSuccess {
    /// True when the value needed at least one repair pass.
    pub fn repaired(&self) -> bool {
        self.attempts.len() > 1
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "structural parse failed after {attempts} attempt(s): {} (line {}, column {})",
    detail.message, detail.line, detail.column
)]
pub struct ParseFailure {
    pub attempts: u32,
    /// Error from the final attempt
    pub detail: ParseErrorDetail,
    /// Start of the raw input
    pub preview: String,
    pub history: Vec<ParseAttempt>,
}

impl ParseFailure {
    /// Parsed fine, but the structure did not fit the expected schema.
    pub fn schema_mismatch(message: impl Into<String>, raw: &str, attempts: u32) -> Self {
        Self {
            attempts,
            detail: ParseErrorDetail::unpositioned(message.into(), raw),
            preview: preview(raw),
            history: Vec::new(),
        }
    }
}

/// Recovers a structure of a given shape in a bounded number of attempts.
#[derive(Debug, Clone, Copy)]
pub struct StructuralParser {
    max_attempts: u32,
    shape: Shape,
}

impl Default for StructuralParser {
    fn default() -> Self {
        Self::new(DEFAULT_PARSE_ATTEMPTS)
    }
}

impl StructuralParser {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            shape: Shape::Object,
        }
    }

    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.shape = shape;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn parse(&self, raw: &str) -> Result<ParseSuccess, ParseFailure> {
        let mut input = extract_shape(raw, self.shape).text;
        let mut transform = ParseTransform::Extracted;
        let mut history = Vec::new();

        loop {
            let attempt = history.len() as u32 + 1;
            let error = match serde_json::from_str::<Value>(&input) {
                Ok(value) if self.shape.accepts(&value) => {
                    history.push(ParseAttempt {
                        attempt,
                        transform,
                        input,
                        error: None,
                    });
                    return Ok(ParseSuccess {
                        value,
                        attempts: history,
                    });
                }
                Ok(_) => ParseErrorDetail::unpositioned(
                    format!("expected {}", self.shape.describe()),
                    &input,
                ),
                Err(err) => ParseErrorDetail::from_serde(&err, &input),
            };

            let next = (attempt < self.max_attempts).then(|| repair_shape(&input, self.shape));
            history.push(ParseAttempt {
                attempt,
                transform,
                input,
                error: Some(error.clone()),
            });

            match next {
                Some(repaired) => {
                    input = repaired;
                    transform = ParseTransform::Repaired;
                }
                None => {
                    return Err(ParseFailure {
                        attempts: attempt,
                        detail: error,
                        preview: preview(raw),
                        history,
                    })
                }
            }
        }
    }
}

/// Byte offset for a 1-based line/column pair, snapped to a char boundary.
fn offset_of(input: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = input
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    floor_boundary(input, line_start + column.saturating_sub(1))
}

fn floor_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    idx = idx.min(s.len());
    while !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn context_around(input: &str, offset: usize) -> String {
    let start = floor_boundary(input, offset.saturating_sub(CONTEXT_RADIUS));
    let end = ceil_boundary(input, offset + CONTEXT_RADIUS);
    input[start..end].to_string()
}

fn preview(raw: &str) -> String {
    raw.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_json_needs_one_attempt() {
        let ok = StructuralParser::default()
            .parse("```json\n{\"a\": 1}\n```")
            .unwrap();
        assert_eq!(ok.value, json!({"a": 1}));
        assert_eq!(ok.attempts.len(), 1);
        assert!(!ok.repaired());
        assert_eq!(ok.attempts[0].transform, ParseTransform::Extracted);
    }

    #[test]
    fn trailing_comma_repaired_on_second_attempt() {
        let ok = StructuralParser::default()
            .parse("Here is your data: ```json\n{\"a\":1,}\n```")
            .unwrap();
        assert_eq!(ok.value, json!({"a": 1}));
        assert!(ok.repaired());
        assert_eq!(ok.attempts.len(), 2);
        assert_eq!(ok.attempts[1].transform, ParseTransform::Repaired);
    }

    #[test]
    fn unrepairable_input_fails_within_bound() {
        let garbage = "{\"a\": @@@ ### !!!";
        for max in 1..=4 {
            let failure = StructuralParser::new(max).parse(garbage).unwrap_err();
            assert_eq!(failure.attempts, max);
            assert_eq!(failure.history.len() as u32, max);
            assert!(failure.detail.line >= 1);
            assert!(!failure.detail.context.is_empty());
            assert!(failure.preview.starts_with("{\"a\""));
        }
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let failure = StructuralParser::new(0).parse("nope").unwrap_err();
        assert_eq!(failure.attempts, 1);
    }

    #[test]
    fn wrong_shape_is_a_failure() {
        let failure = StructuralParser::new(2).parse("42").unwrap_err();
        assert!(failure.detail.message.contains("JSON object"));

        let ok = StructuralParser::new(1)
            .with_shape(Shape::Array)
            .parse("[1, 2]")
            .unwrap();
        assert_eq!(ok.value, json!([1, 2]));
    }

    #[test]
    fn error_offset_points_at_problem() {
        let input = "{\n  \"a\": 1\n  \"b\": 2\n}";
        let failure = StructuralParser::new(1).parse(input).unwrap_err();
        assert_eq!(failure.detail.line, 3);
        let line_three = input.find("  \"b\"").unwrap();
        assert!(failure.detail.offset >= line_three);
        assert!(input[failure.detail.offset..].contains("\"b\""));
    }

    #[test]
    fn context_is_bounded() {
        let long = format!("{{\"a\": \"{}\" oops {}", "x".repeat(1000), "y".repeat(1000));
        let failure = StructuralParser::new(1).parse(&long).unwrap_err();
        assert!(failure.detail.context.len() <= 2 * CONTEXT_RADIUS + 4);
        assert_eq!(failure.preview.chars().count(), PREVIEW_CHARS);
    }
}
