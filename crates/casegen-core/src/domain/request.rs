//! Pipeline entry input.

use serde::{Deserialize, Serialize};

use super::error::PipelineError;

/// Provider/model selection forwarded to the text generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub provider: String,
    pub model: String,
    /// Target length of the case description, in words
    pub target_word_count: u32,
    pub track_usage: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            target_word_count: 1500,
            track_usage: true,
        }
    }
}

/// Caller overrides applied on top of generated values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub difficulty: Option<String>,
    pub duration_minutes: Option<u32>,
}

/// Immutable request for one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub arena_id: String,
    pub competency_id: String,
    /// Duplicate-detection identifier; derived from `title` when absent
    pub blueprint_id: Option<String>,
    pub title: Option<String>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub options: GenerationOptions,
    #[serde(default)]
    pub overrides: Overrides,
}

impl GenerationRequest {
    pub fn new(arena_id: impl Into<String>, competency_id: impl Into<String>) -> Self {
        Self {
            arena_id: arena_id.into(),
            competency_id: competency_id.into(),
            blueprint_id: None,
            title: None,
            created_by: None,
            options: GenerationOptions::default(),
            overrides: Overrides::default(),
        }
    }

    pub fn with_blueprint(mut self, blueprint_id: impl Into<String>) -> Self {
        self.blueprint_id = Some(blueprint_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by = Some(user_id.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Reject requests the pipeline cannot act on.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.arena_id.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "arena_id must not be empty".to_string(),
            ));
        }
        if self.competency_id.trim().is_empty() {
            return Err(PipelineError::InvalidRequest(
                "competency_id must not be empty".to_string(),
            ));
        }
        let has_blueprint = self
            .blueprint_id
            .as_deref()
            .is_some_and(|b| !b.trim().is_empty());
        let has_title = self.title.as_deref().is_some_and(|t| !t.trim().is_empty());
        if !has_blueprint && !has_title {
            return Err(PipelineError::InvalidRequest(
                "either blueprint_id or title is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Identifier used for duplicate-submission protection.
    pub fn dedupe_key(&self) -> String {
        match self.blueprint_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("title:{}", slugify(self.title.as_deref().unwrap_or_default())),
        }
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_prefers_blueprint() {
        let req = GenerationRequest::new("a", "c")
            .with_blueprint("bp-42")
            .with_title("Ignored");
        assert_eq!(req.dedupe_key(), "bp-42");
    }

    #[test]
    fn dedupe_key_falls_back_to_title_slug() {
        let req = GenerationRequest::new("a", "c").with_title("  Rescue at Acme, Inc.!  ");
        assert_eq!(req.dedupe_key(), "title:rescue-at-acme-inc");
    }

    #[test]
    fn validate_requires_identifier() {
        let err = GenerationRequest::new("a", "c").validate().unwrap_err();
        assert_eq!(err.code(), "invalid_request");

        assert!(GenerationRequest::new("a", "c")
            .with_title("T")
            .validate()
            .is_ok());
        assert!(GenerationRequest::new(" ", "c")
            .with_blueprint("b")
            .validate()
            .is_err());
    }
}
