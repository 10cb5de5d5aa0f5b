//! Configurable quality thresholds.

use serde::{Deserialize, Serialize};

/// Minimums for each asset content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetThresholds {
    pub min_slides: usize,
    /// Non-blank lines including the header
    pub min_table_lines: usize,
    pub min_profiles: usize,
    pub max_profiles: usize,
    pub min_market_rows: usize,
    pub min_org_nodes: usize,
    pub min_prose_words: usize,
    pub min_prose_headings: usize,
}

impl Default for AssetThresholds {
    fn default() -> Self {
        Self {
            min_slides: 12,
            min_table_lines: 17,
            min_profiles: 5,
            max_profiles: 7,
            min_market_rows: 24,
            min_org_nodes: 12,
            min_prose_words: 900,
            min_prose_headings: 5,
        }
    }
}

/// Minimums for a case draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseThresholds {
    pub min_description_words: usize,
    pub min_stages: usize,
    pub max_stages: usize,
    pub min_rubric_criteria: usize,
    /// Every rubric criterion must describe each of these levels
    pub required_levels: Vec<String>,
    pub min_datasets: usize,
    pub min_files: usize,
}

impl Default for CaseThresholds {
    fn default() -> Self {
        Self {
            min_description_words: 250,
            min_stages: 6,
            max_stages: 8,
            min_rubric_criteria: 8,
            required_levels: ["exemplary", "proficient", "developing", "beginning"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_datasets: 3,
            min_files: 3,
        }
    }
}
