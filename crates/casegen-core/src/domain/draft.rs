//! Typed view of a generated case.
//!
//! Generators are inconsistent about optional fields, aliases, and number
//! encodings, so deserialization here is deliberately forgiving: missing or
//! `null` fields default, numeric fields accept strings like `"90 minutes"`,
//! list entries that do not fit are dropped, stages may be bare titles, and
//! rubric levels may arrive as a map or as a list of `{level, description}`.
//! Anything left incomplete surfaces later as a validation violation rather
//! than a structural failure.

use std::collections::BTreeMap;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::request::Overrides;

/// A generated case study before persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseDraft {
    #[serde(deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub difficulty: Option<String>,
    #[serde(alias = "duration", deserialize_with = "lenient::opt_u32")]
    pub duration_minutes: Option<u32>,
    #[serde(deserialize_with = "lenient::list")]
    pub stages: Vec<Stage>,
    pub rubric: Rubric,
    #[serde(deserialize_with = "lenient::list")]
    pub datasets: Vec<Dataset>,
    #[serde(deserialize_with = "lenient::list")]
    pub files: Vec<CaseFileDraft>,
}

impl CaseDraft {
    /// Interpret an already-parsed structure as a draft.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Replace generated values with caller-supplied ones.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(difficulty) = &overrides.difficulty {
            self.difficulty = Some(difficulty.clone());
        }
        if let Some(minutes) = overrides.duration_minutes {
            self.duration_minutes = Some(minutes);
        }
    }

    /// Give every file a stable identifier, keeping the ones the generator chose.
    pub fn normalize_file_ids(&mut self) {
        let mut seen = std::collections::HashSet::new();
        for (idx, file) in self.files.iter_mut().enumerate() {
            let trimmed = file.file_id.trim();
            if trimmed.is_empty() || seen.contains(trimmed) {
                file.file_id = format!("file-{}", idx + 1);
            } else if trimmed.len() != file.file_id.len() {
                file.file_id = trimmed.to_string();
            }
            seen.insert(file.file_id.clone());
        }
    }

    /// Files whose content still has to be generated.
    pub fn pending_files(&self) -> impl Iterator<Item = (usize, &CaseFileDraft)> {
        self.files
            .iter()
            .enumerate()
            .filter(|(_, f)| f.content.trim().is_empty())
    }
}

/// One stage of the case. A bare string is read as the stage title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StageRepr")]
pub struct Stage {
    pub title: String,
    pub description: String,
    pub duration_minutes: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StageRepr {
    Title(String),
    Full(StageFields),
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct StageFields {
    #[serde(alias = "name", deserialize_with = "lenient::text")]
    title: String,
    #[serde(deserialize_with = "lenient::text")]
    description: String,
    #[serde(alias = "duration", deserialize_with = "lenient::opt_u32")]
    duration_minutes: Option<u32>,
}

impl From<StageRepr> for Stage {
    fn from(repr: StageRepr) -> Self {
        match repr {
            StageRepr::Title(title) => Stage {
                title,
                ..Stage::default()
            },
            StageRepr::Full(f) => Stage {
                title: f.title,
                description: f.description,
                duration_minutes: f.duration_minutes,
            },
        }
    }
}

/// Grading rubric. Accepts either `{"criteria": [...]}` or a bare list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RubricRepr")]
pub struct Rubric {
    pub criteria: Vec<RubricCriterion>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RubricRepr {
    List(Vec<RubricCriterion>),
    Wrapped {
        #[serde(default)]
        criteria: Vec<RubricCriterion>,
    },
    Other(IgnoredAny),
}

impl From<RubricRepr> for Rubric {
    fn from(repr: RubricRepr) -> Self {
        match repr {
            RubricRepr::List(criteria) | RubricRepr::Wrapped { criteria } => Rubric { criteria },
            RubricRepr::Other(_) => Rubric::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricCriterion {
    #[serde(alias = "criterion", alias = "title", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub weight: Option<f64>,
    /// Performance level name (lowercase) to descriptor
    #[serde(deserialize_with = "lenient::levels")]
    pub levels: BTreeMap<String, String>,
}

impl RubricCriterion {
    /// Required levels absent from this criterion, in the order given.
    pub fn missing_levels<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|level| {
                self.levels
                    .get(&level.to_lowercase())
                    .map_or(true, |d| d.trim().is_empty())
            })
            .map(String::as_str)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    #[serde(alias = "title", deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(alias = "fileId", deserialize_with = "lenient::opt_string")]
    pub file_id: Option<String>,
}

/// A file attached to the case. Empty `content` means "generate me".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseFileDraft {
    #[serde(alias = "fileId", alias = "id", deserialize_with = "lenient::text")]
    pub file_id: String,
    #[serde(alias = "fileName", alias = "name", deserialize_with = "lenient::text")]
    pub file_name: String,
    #[serde(alias = "type", alias = "fileType", deserialize_with = "lenient::text")]
    pub file_type: String,
    #[serde(deserialize_with = "lenient::text")]
    pub content: String,
}

mod lenient {
    use super::*;
    use serde::de::DeserializeOwned;

    /// `null` or a non-list becomes empty; entries that do not fit are dropped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f.round() as u32)
            }),
            Value::String(s) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        })
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        })
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Content occasionally arrives as structured JSON; keep it as text.
    /// `null` is empty.
    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => String::new(),
            Value::String(s) => s,
            other => serde_json::to_string_pretty(&other).unwrap_or_default(),
        })
    }

    pub fn levels<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, String>, D::Error> {
        let mut out = BTreeMap::new();
        match Value::deserialize(d)? {
            Value::Object(map) => {
                for (level, descriptor) in map {
                    out.insert(level.trim().to_lowercase(), describe(&descriptor));
                }
            }
            Value::Array(items) => {
                for item in items {
                    let Some(obj) = item.as_object() else { continue };
                    let level = ["level", "name", "label"]
                        .iter()
                        .find_map(|k| obj.get(*k).and_then(Value::as_str));
                    let Some(level) = level else { continue };
                    let descriptor = ["description", "descriptor", "criteria", "text"]
                        .iter()
                        .find_map(|k| obj.get(*k))
                        .map(describe)
                        .unwrap_or_default();
                    out.insert(level.trim().to_lowercase(), descriptor);
                }
            }
            _ => {}
        }
        Ok(out)
    }

    fn describe(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}
