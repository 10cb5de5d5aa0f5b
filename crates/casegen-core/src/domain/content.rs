//! Content types for generated assets.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of content a case file holds, derived from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Presentation,
    Tabular,
    ProfileList,
    MarketDataset,
    OrgChart,
    Prose,
    Generic,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Presentation,
        ContentType::Tabular,
        ContentType::ProfileList,
        ContentType::MarketDataset,
        ContentType::OrgChart,
        ContentType::Prose,
        ContentType::Generic,
    ];

    /// Map a free-form declared type (and file name as a tiebreaker) to a
    /// content type. Unknown types are `Generic`.
    pub fn classify(declared_type: &str, file_name: &str) -> Self {
        let declared = declared_type.trim().to_lowercase();
        if let Ok(exact) = declared.parse() {
            return exact;
        }

        let has = |words: &[&str]| words.iter().any(|w| declared.contains(w));
        if has(&["presentation", "slide", "deck", "pitch"]) {
            return ContentType::Presentation;
        }
        if has(&["org chart", "org_chart", "orgchart", "organization", "organisation", "hierarchy"]) {
            return ContentType::OrgChart;
        }
        if has(&["profile", "persona", "stakeholder", "bio"]) {
            return ContentType::ProfileList;
        }
        if has(&["market", "dataset", "data set", "time series", "timeseries"]) {
            return ContentType::MarketDataset;
        }
        if has(&["spreadsheet", "financial", "csv", "table", "ledger", "budget", "statement"]) {
            return ContentType::Tabular;
        }
        if has(&[
            "report", "memo", "press", "legal", "contract", "brief", "document", "policy",
            "letter", "email", "article", "transcript", "minutes",
        ]) {
            return ContentType::Prose;
        }

        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" | "tsv" => ContentType::Tabular,
            "md" | "markdown" | "txt" => ContentType::Prose,
            _ => ContentType::Generic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Presentation => "presentation",
            ContentType::Tabular => "tabular",
            ContentType::ProfileList => "profile_list",
            ContentType::MarketDataset => "market_dataset",
            ContentType::OrgChart => "org_chart",
            ContentType::Prose => "prose",
            ContentType::Generic => "generic",
        }
    }

    /// Whether content of this type must be structured JSON.
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            ContentType::ProfileList | ContentType::MarketDataset | ContentType::OrgChart
        )
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        ContentType::ALL
            .into_iter()
            .find(|ct| ct.as_str() == normalized)
            .ok_or_else(|| format!("unknown content type: {s}"))
    }
}

/// Slide deck split on `---` delimiter lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDeck {
    pub front_matter: Option<String>,
    pub slides: Vec<String>,
}

impl SlideDeck {
    pub fn parse(text: &str) -> Self {
        let lines: Vec<&str> = text.lines().collect();
        let mut body_start = 0;
        let mut front_matter = None;

        if lines.first().map(|l| l.trim()) == Some("---") {
            if let Some(close) = lines.iter().skip(1).position(|l| l.trim() == "---") {
                let close = close + 1;
                front_matter = Some(lines[1..close].join("\n"));
                body_start = close + 1;
            }
        }

        let mut slides = vec![String::new()];
        for line in &lines[body_start.min(lines.len())..] {
            if line.trim() == "---" {
                slides.push(String::new());
            } else if let Some(current) = slides.last_mut() {
                current.push_str(line);
                current.push('\n');
            }
        }

        Self {
            front_matter,
            slides,
        }
    }

    /// Front matter with at least one `key: value` line.
    pub fn has_recognized_front_matter(&self) -> bool {
        self.front_matter.as_deref().is_some_and(|fm| {
            fm.lines().any(|line| {
                line.split_once(':')
                    .is_some_and(|(key, _)| !key.trim().is_empty() && !key.contains(' '))
            })
        })
    }
}

/// Interpreted asset content, one variant per content type.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetContent {
    Presentation(SlideDeck),
    /// Non-blank lines, header first
    Tabular(Vec<String>),
    ProfileList(Vec<Value>),
    MarketDataset(Vec<Value>),
    OrgChart(serde_json::Map<String, Value>),
    Prose(String),
    Generic(String),
}
