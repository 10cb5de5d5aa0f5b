//! Prompt construction.
//!
//! Templates use `{{name}}` variables. Unknown variables are left as-is so a
//! typo shows up in the prompt rather than silently vanishing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{CaseDraft, CaseFileDraft, ContentType, GenerationRequest};
use crate::validation::{AssetThresholds, CaseThresholds};

/// Builds the prompts for each generator phase.
pub trait PromptBook: Send + Sync {
    fn system_prompt(&self, request: &GenerationRequest) -> String;

    fn outline_prompt(&self, request: &GenerationRequest) -> String;

    fn case_prompt(&self, request: &GenerationRequest, outline: &Value) -> String;

    fn asset_prompt(
        &self,
        request: &GenerationRequest,
        draft: &CaseDraft,
        file: &CaseFileDraft,
        content_type: ContentType,
    ) -> String;
}

/// Raw template text for every phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub system: String,
    pub outline: String,
    pub case: String,
    pub asset: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            system: "You are an expert instructional designer who writes realistic, data-rich \
                     business case studies for professional training. Follow the requested output \
                     format exactly and never leave sections unfinished."
                .to_string(),
            outline: "Plan a business case study for the {{arena}} arena that exercises the \
                      {{competency}} competency.\nWorking title: {{title}}\n\n\
                      Respond with a JSON object with keys \"title\", \"premise\", \"stages\" \
                      (an array of stage titles) and \"files\" (an array of objects with \
                      \"file_name\" and \"type\")."
                .to_string(),
            case: "Write the full case study described by this outline:\n{{outline}}\n\n\
                   Respond with one JSON object with these keys:\n\
                   - \"title\"\n\
                   - \"description\": about {{word_count}} words of narrative\n\
                   - \"difficulty\" and \"duration_minutes\"\n\
                   - \"stages\": {{min_stages}} to {{max_stages}} objects with \"title\" and \
                   \"description\"\n\
                   - \"rubric\": {\"criteria\": [...]} with at least {{min_criteria}} criteria, each \
                   with \"name\" and \"levels\" describing these levels of work: {{levels}}\n\
                   - \"datasets\": at least {{min_datasets}} objects with \"name\" and \"description\"\n\
                   - \"files\": at least {{min_files}} objects with \"file_id\", \"file_name\", \"type\" and \
                   \"content\" (leave \"content\" empty for files that will be written separately)"
                .to_string(),
            asset: "Write the complete contents of the file \"{{file_name}}\" ({{file_type}}) for \
                    the case study \"{{case_title}}\".\n\nCase summary:\n{{case_description}}\n\n\
                    Format requirements: {{format_hint}}\n\nReturn only the file contents."
                .to_string(),
        }
    }
}

/// [`PromptBook`] backed by string templates.
#[derive(Debug, Clone, Default)]
pub struct TemplatePromptBook {
    templates: PromptTemplates,
    thresholds: AssetThresholds,
    case_thresholds: CaseThresholds,
}

impl TemplatePromptBook {
    pub fn new(templates: PromptTemplates, thresholds: AssetThresholds) -> Self {
        Self {
            templates,
            thresholds,
            case_thresholds: CaseThresholds::default(),
        }
    }

    /// Case-level minimums quoted in the case prompt.
    pub fn with_case_thresholds(mut self, case_thresholds: CaseThresholds) -> Self {
        self.case_thresholds = case_thresholds;
        self
    }

    fn format_hint(&self, content_type: ContentType) -> String {
        let t = &self.thresholds;
        match content_type {
            ContentType::Presentation => format!(
                "Marp markdown. Start with a front matter block containing 'marp: true' between \
                 '---' lines, then at least {} slides separated by '---' lines.",
                t.min_slides
            ),
            ContentType::Tabular => format!(
                "CSV with a header row and at least {} data rows.",
                t.min_table_lines.saturating_sub(1)
            ),
            ContentType::ProfileList => format!(
                "A JSON array of {} to {} profile objects.",
                t.min_profiles, t.max_profiles
            ),
            ContentType::MarketDataset => format!(
                "A JSON array of at least {} data records.",
                t.min_market_rows
            ),
            ContentType::OrgChart => format!(
                "A JSON object with a \"nodes\" array; each node has \"name\", \"title\" and an \
                 optional \"reports\" array of nested nodes. At least {} nodes in total.",
                t.min_org_nodes
            ),
            ContentType::Prose => format!(
                "Markdown with at least {} headings and at least {} words.",
                t.min_prose_headings, t.min_prose_words
            ),
            ContentType::Generic => "Plain text appropriate to the file type.".to_string(),
        }
    }
}

/// Replace every `{{key}}` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

impl PromptBook for TemplatePromptBook {
    fn system_prompt(&self, _request: &GenerationRequest) -> String {
        self.templates.system.clone()
    }

    fn outline_prompt(&self, request: &GenerationRequest) -> String {
        let title = request.title.as_deref().unwrap_or("(choose one)");
        render(
            &self.templates.outline,
            &[
                ("arena", request.arena_id.as_str()),
                ("competency", request.competency_id.as_str()),
                ("title", title),
            ],
        )
    }

    fn case_prompt(&self, request: &GenerationRequest, outline: &Value) -> String {
        let outline = serde_json::to_string_pretty(outline).unwrap_or_default();
        let word_count = request.options.target_word_count.to_string();
        let c = &self.case_thresholds;
        let min_stages = c.min_stages.to_string();
        let max_stages = c.max_stages.to_string();
        let min_criteria = c.min_rubric_criteria.to_string();
        let min_datasets = c.min_datasets.to_string();
        let min_files = c.min_files.to_string();
        let levels = c.required_levels.join(", ");
        render(
            &self.templates.case,
            &[
                ("arena", request.arena_id.as_str()),
                ("competency", request.competency_id.as_str()),
                ("title", request.title.as_deref().unwrap_or_default()),
                ("outline", outline.as_str()),
                ("word_count", word_count.as_str()),
                ("min_stages", min_stages.as_str()),
                ("max_stages", max_stages.as_str()),
                ("min_criteria", min_criteria.as_str()),
                ("min_datasets", min_datasets.as_str()),
                ("min_files", min_files.as_str()),
                ("levels", levels.as_str()),
            ],
        )
    }

    fn asset_prompt(
        &self,
        request: &GenerationRequest,
        draft: &CaseDraft,
        file: &CaseFileDraft,
        content_type: ContentType,
    ) -> String {
        let hint = self.format_hint(content_type);
        render(
            &self.templates.asset,
            &[
                ("arena", request.arena_id.as_str()),
                ("competency", request.competency_id.as_str()),
                ("file_name", file.file_name.as_str()),
                ("file_type", file.file_type.as_str()),
                ("case_title", draft.title.as_str()),
                ("case_description", draft.description.as_str()),
                ("format_hint", hint.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn render_replaces_known_and_keeps_unknown() {
        let out = render("{{a}} and {{b}} and {{a}}", &[("a", "x")]);
        assert_eq!(out, "x and {{b}} and x");
    }

    #[test]
    fn outline_prompt_mentions_request() {
        let book = TemplatePromptBook::default();
        let request = GenerationRequest::new("finance", "valuation").with_title("Northwind");
        let prompt = book.outline_prompt(&request);
        assert!(prompt.contains("finance"));
        assert!(prompt.contains("valuation"));
        assert!(prompt.contains("Northwind"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn case_prompt_embeds_outline_and_word_count() {
        let book = TemplatePromptBook::default();
        let request = GenerationRequest::new("a", "c").with_blueprint("bp");
        let prompt = book.case_prompt(&request, &json!({ "premise": "A merger" }));
        assert!(prompt.contains("A merger"));
        assert!(prompt.contains("about 1500 words"));
        assert!(prompt.contains("6 to 8 objects"));
        assert!(prompt.contains("exemplary, proficient, developing, beginning"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn case_prompt_follows_configured_case_thresholds() {
        let book = TemplatePromptBook::default().with_case_thresholds(CaseThresholds {
            min_stages: 3,
            max_stages: 4,
            min_rubric_criteria: 5,
            min_datasets: 2,
            min_files: 1,
            ..CaseThresholds::default()
        });
        let request = GenerationRequest::new("a", "c").with_blueprint("bp");
        let prompt = book.case_prompt(&request, &json!({}));
        assert!(prompt.contains("3 to 4 objects"));
        assert!(prompt.contains("at least 5 criteria"));
        assert!(prompt.contains("at least 2 objects"));
        assert!(prompt.contains("at least 1 objects"));
        assert!(!prompt.contains("6 to 8"));
    }

    #[test]
    fn asset_prompt_uses_thresholds() {
        let thresholds = AssetThresholds {
            min_slides: 20,
            ..AssetThresholds::default()
        };
        let book = TemplatePromptBook::new(PromptTemplates::default(), thresholds);
        let draft = CaseDraft {
            title: "Northwind".into(),
            ..Default::default()
        };
        let file = CaseFileDraft {
            file_id: "f1".into(),
            file_name: "deck.md".into(),
            file_type: "presentation".into(),
            content: String::new(),
        };
        let prompt = book.asset_prompt(
            &GenerationRequest::new("a", "c"),
            &draft,
            &file,
            ContentType::Presentation,
        );
        assert!(prompt.contains("deck.md"));
        assert!(prompt.contains("at least 20 slides"));
        assert!(prompt.contains("\"Northwind\""));
    }
}
