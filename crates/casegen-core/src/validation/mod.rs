//! Quality validation for case drafts and generated assets.
//!
//! Validators never fail: they report every violated rule as a
//! human-readable message that can be fed back to the generator verbatim.

mod asset;
mod case;
pub mod thresholds;

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::ContentType;

pub use asset::{interpret_asset, validate_asset};
pub use case::validate_case;
pub use thresholds::{AssetThresholds, CaseThresholds};

/// What a validation result refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content_type", rename_all = "snake_case")]
pub enum ValidationTarget {
    Case,
    Asset(ContentType),
}

/// Outcome of validating one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub target: ValidationTarget,
    /// True iff `violations` is empty
    pub valid: bool,
    pub violations: Vec<String>,
    /// Normalized content that was validated
    pub cleaned: String,
}

impl ValidationResult {
    fn new(target: ValidationTarget, violations: Vec<String>, cleaned: String) -> Self {
        Self {
            target,
            valid: violations.is_empty(),
            violations,
            cleaned,
        }
    }
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\[\s*placeholder[^\]]*\]|\bplaceholder\b|lorem ipsum")
            .expect("valid placeholder pattern")
    })
}

/// Violation for unfinished placeholder text, if any.
pub(crate) fn placeholder_violation(text: &str) -> Option<String> {
    placeholder_pattern()
        .find(text)
        .map(|m| format!("Content contains placeholder text: \"{}\"", m.as_str()))
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
