//! Error taxonomy for a generation run and its wire representation.

use case_store::StoreError;
use serde::{Deserialize, Serialize};

use super::output::Phase;
use crate::generator::GeneratorError;
use crate::parse::ParseFailure;

/// Terminal failures of a generation run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{phase} phase: {failure}")]
    StructuralParse {
        phase: Phase,
        #[source]
        failure: ParseFailure,
    },

    #[error("{phase} phase: generator failed after {attempts} attempt(s): {source}")]
    Generator {
        phase: Phase,
        attempts: u32,
        #[source]
        source: GeneratorError,
    },

    #[error("case failed validation after repair: {}", violations.join("; "))]
    CaseValidation { violations: Vec<String> },

    #[error(transparent)]
    Persistence(#[from] StoreError),

    #[error("{phase} phase: run ceiling of {ceiling_ms} ms exceeded after {elapsed_ms} ms")]
    DeadlineExceeded {
        phase: Phase,
        elapsed_ms: u64,
        ceiling_ms: u64,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::StructuralParse { .. } => "structural_parse_failure",
            PipelineError::Generator { .. } => "generator_failure",
            PipelineError::CaseValidation { .. } => "case_validation_failed",
            PipelineError::Persistence(err) => err.code(),
            PipelineError::DeadlineExceeded { .. } => "deadline_exceeded",
            PipelineError::Config(_) => "config_error",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            raw_preview: None,
            error_offset: None,
            context: None,
            violations: Vec::new(),
        };
        match self {
            PipelineError::StructuralParse { failure, .. } => {
                response.raw_preview = Some(failure.preview.clone());
                response.error_offset = Some(failure.detail.offset);
                response.context = Some(failure.detail.context.clone());
            }
            PipelineError::CaseValidation { violations } => {
                response.violations = violations.clone();
            }
            _ => {}
        }
        response
    }
}

/// Structured error returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl From<&PipelineError> for ErrorResponse {
    fn from(err: &PipelineError) -> Self {
        err.to_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::StructuralParser;

    #[test]
    fn codes_are_stable() {
        let dup = PipelineError::from(StoreError::Duplicate {
            blueprint_id: "bp".into(),
        });
        assert_eq!(dup.code(), "duplicate_case");

        let missing = PipelineError::from(StoreError::MissingRelation {
            relation: "case_files".into(),
        });
        assert_eq!(missing.code(), "missing_relation");

        let deadline = PipelineError::DeadlineExceeded {
            phase: Phase::Asset,
            elapsed_ms: 10,
            ceiling_ms: 5,
        };
        assert_eq!(deadline.code(), "deadline_exceeded");
    }

    #[test]
    fn parse_failure_response_carries_context() {
        let failure = StructuralParser::new(1)
            .parse("{\"a\": 1 \"b\": 2}")
            .unwrap_err();
        let err = PipelineError::StructuralParse {
            phase: Phase::Primary,
            failure,
        };

        let response = err.to_response();
        assert_eq!(response.code, "structural_parse_failure");
        assert!(response.raw_preview.is_some());
        assert!(response.error_offset.is_some());
        assert!(response.context.unwrap().contains("\"b\""));
    }

    #[test]
    fn validation_response_lists_violations() {
        let err = PipelineError::CaseValidation {
            violations: vec!["Too few stages: found 2, need at least 6".into()],
        };
        let json = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(json["code"], "case_validation_failed");
        assert_eq!(json["violations"][0], "Too few stages: found 2, need at least 6");
        assert!(json.get("raw_preview").is_none());
    }
}
