//! Case draft checks.

use super::{placeholder_violation, word_count, CaseThresholds, ValidationResult, ValidationTarget};
use crate::domain::CaseDraft;

/// Validate a draft against case thresholds, collecting every violation.
pub fn validate_case(draft: &CaseDraft, t: &CaseThresholds) -> ValidationResult {
    let mut violations = Vec::new();

    if draft.title.trim().is_empty() {
        violations.push("Case title is missing".to_string());
    }

    let words = word_count(&draft.description);
    if words < t.min_description_words {
        violations.push(format!(
            "Description too short: found {words} words, need at least {}",
            t.min_description_words
        ));
    }

    let stages = draft.stages.len();
    if stages < t.min_stages {
        violations.push(format!(
            "Too few stages: found {stages}, need at least {}",
            t.min_stages
        ));
    } else if stages > t.max_stages {
        violations.push(format!(
            "Too many stages: found {stages}, need at most {}",
            t.max_stages
        ));
    }

    let criteria = &draft.rubric.criteria;
    if criteria.len() < t.min_rubric_criteria {
        violations.push(format!(
            "Too few rubric criteria: found {}, need at least {}",
            criteria.len(),
            t.min_rubric_criteria
        ));
    }
    for (idx, criterion) in criteria.iter().enumerate() {
        let missing = criterion.missing_levels(&t.required_levels);
        if !missing.is_empty() {
            let name = if criterion.name.trim().is_empty() {
                format!("#{}", idx + 1)
            } else {
                criterion.name.clone()
            };
            violations.push(format!(
                "Rubric criterion '{name}' is missing performance levels: {}",
                missing.join(", ")
            ));
        }
    }

    if draft.datasets.len() < t.min_datasets {
        violations.push(format!(
            "Too few datasets: found {}, need at least {}",
            draft.datasets.len(),
            t.min_datasets
        ));
    }

    if draft.files.len() < t.min_files {
        violations.push(format!(
            "Too few files: found {}, need at least {}",
            draft.files.len(),
            t.min_files
        ));
    }

    let cleaned = serde_json::to_string_pretty(draft).unwrap_or_default();
    if let Some(v) = placeholder_violation(&cleaned) {
        violations.push(v);
    }

    ValidationResult::new(ValidationTarget::Case, violations, cleaned)
}
