//! Record definitions for the case tables
//!
//! Tables:
//! - cases: one row per successful generation run
//! - case_files: declared assets belonging to a case
//! - arenas / competencies / users: reference data checked before insert

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;

/// Case record handed to the persistence boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCase {
    /// Caller-supplied duplicate-detection identifier
    pub blueprint_id: String,
    pub arena_id: String,
    pub competency_id: String,
    /// User attribution; cleared if the user no longer exists
    pub created_by: Option<String>,
    pub title: String,
    pub description: String,
    pub difficulty: Option<String>,
    pub duration_minutes: Option<u32>,
    /// Full assembled case document
    pub content: serde_json::Value,
    /// Outstanding violations when persisted flagged for review
    pub violations: Vec<String>,
}

/// File record handed to the persistence boundary alongside its case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCaseFile {
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    /// Empty until the asset sub-pipeline populates it
    pub content: String,
}

impl NewCaseFile {
    pub fn new(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            file_type: file_type.into(),
            content: content.into(),
        }
    }
}

/// Durable case record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCase {
    pub case_id: String,
    pub blueprint_id: String,
    pub arena_id: String,
    pub competency_id: String,
    pub created_by: Option<String>,
    pub title: String,
    pub description: String,
    pub difficulty: Option<String>,
    pub duration_minutes: Option<u32>,
    pub content: serde_json::Value,
    #[serde(default)]
    pub violations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PersistedCase {
    pub(crate) fn from_new(case_id: String, case: NewCase, created_at: DateTime<Utc>) -> Self {
        Self {
            case_id,
            blueprint_id: case.blueprint_id,
            arena_id: case.arena_id,
            competency_id: case.competency_id,
            created_by: case.created_by,
            title: case.title,
            description: case.description,
            difficulty: case.difficulty,
            duration_minutes: case.duration_minutes,
            content: case.content,
            violations: case.violations,
            created_at,
        }
    }

    /// Whether the case was persisted with outstanding violations.
    pub fn is_flagged(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Durable file record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedCaseFile {
    pub case_id: String,
    /// Declaration order within the case
    pub position: u32,
    pub file_id: String,
    pub file_name: String,
    pub file_type: String,
    pub content: String,
    pub digest: Option<ContentDigest>,
    #[serde(default)]
    pub violations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedCaseFile {
    pub(crate) fn from_new(
        case_id: &str,
        position: u32,
        file: NewCaseFile,
        now: DateTime<Utc>,
    ) -> Self {
        let digest = (!file.content.is_empty())
            .then(|| ContentDigest::from_bytes(file.content.as_bytes()));
        Self {
            case_id: case_id.to_string(),
            position,
            file_id: file.file_id,
            file_name: file.file_name,
            file_type: file.file_type,
            content: file.content,
            digest,
            violations: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Arena reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaRecord {
    pub arena_id: String,
    pub name: String,
}

/// Competency reference record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyRecord {
    pub competency_id: String,
    pub arena_id: String,
    pub name: String,
}

/// User reference record, used only for attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub display_name: String,
}
