//! In-memory fakes for the storage traits (testing only)
//!
//! `MemoryCaseStore` stages every `create_case_with_files` call against a
//! copy of its tables and swaps the copy in only when every step succeeded,
//! so injected faults leave no partial state behind.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::digest::ContentDigest;
use crate::error::StoreError;
use crate::records::*;
use crate::traits::{CaseStore, MirrorStore, StoreResult};

/// Failure injected into the next `create_case_with_files` calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fail after the case row is staged but before any file row is.
    AfterCaseInsert,
    /// Behave as if a table were never migrated.
    MissingRelation(String),
}

#[derive(Debug, Default, Clone)]
struct Tables {
    cases: Vec<PersistedCase>,
    files: Vec<PersistedCaseFile>,
    arenas: HashMap<String, ArenaRecord>,
    competencies: HashMap<String, CompetencyRecord>,
    users: HashMap<String, UserRecord>,
}

// ---------------------------------------------------------------------------
// MemoryCaseStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    tables: Mutex<Tables>,
    fault: Mutex<Option<Fault>>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one arena and one competency already registered.
    pub fn seeded(arena_id: &str, competency_id: &str) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.lock().unwrap();
            tables.arenas.insert(
                arena_id.to_string(),
                ArenaRecord {
                    arena_id: arena_id.to_string(),
                    name: arena_id.to_string(),
                },
            );
            tables.competencies.insert(
                competency_id.to_string(),
                CompetencyRecord {
                    competency_id: competency_id.to_string(),
                    arena_id: arena_id.to_string(),
                    name: competency_id.to_string(),
                },
            );
        }
        store
    }

    pub fn inject_fault(&self, fault: Fault) {
        *self.fault.lock().unwrap() = Some(fault);
    }

    pub fn clear_fault(&self) {
        *self.fault.lock().unwrap() = None;
    }

    pub fn case_count(&self) -> usize {
        self.tables.lock().unwrap().cases.len()
    }

    pub fn file_count(&self) -> usize {
        self.tables.lock().unwrap().files.len()
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn create_case_with_files(
        &self,
        mut case: NewCase,
        files: Vec<NewCaseFile>,
    ) -> StoreResult<(PersistedCase, Vec<PersistedCaseFile>)> {
        let fault = self.fault.lock().unwrap().clone();
        if let Some(Fault::MissingRelation(relation)) = fault {
            return Err(StoreError::MissingRelation { relation });
        }

        let mut tables = self.tables.lock().unwrap();
        let mut tx = tables.clone();

        if tx.cases.iter().any(|c| c.blueprint_id == case.blueprint_id) {
            return Err(StoreError::Duplicate {
                blueprint_id: case.blueprint_id,
            });
        }
        if !tx.arenas.contains_key(&case.arena_id) {
            return Err(StoreError::ReferentialIntegrity(format!(
                "arena `{}` does not exist",
                case.arena_id
            )));
        }
        if !tx.competencies.contains_key(&case.competency_id) {
            return Err(StoreError::ReferentialIntegrity(format!(
                "competency `{}` does not exist",
                case.competency_id
            )));
        }
        if let Some(user) = &case.created_by {
            if !tx.users.contains_key(user) {
                case.created_by = None;
            }
        }

        let now = Utc::now();
        let case_id = uuid::Uuid::new_v4().to_string();
        let persisted = PersistedCase::from_new(case_id.clone(), case, now);
        tx.cases.push(persisted.clone());

        if fault == Some(Fault::AfterCaseInsert) {
            return Err(StoreError::Transaction(
                "injected fault after case insert; transaction rolled back".to_string(),
            ));
        }

        let mut persisted_files = Vec::with_capacity(files.len());
        for (position, file) in files.into_iter().enumerate() {
            if persisted_files
                .iter()
                .any(|f: &PersistedCaseFile| f.file_id == file.file_id)
            {
                return Err(StoreError::Transaction(format!(
                    "file `{}` declared twice for case {}",
                    file.file_id, case_id
                )));
            }
            let record = PersistedCaseFile::from_new(&case_id, position as u32, file, now);
            tx.files.push(record.clone());
            persisted_files.push(record);
        }

        *tables = tx;
        Ok((persisted, persisted_files))
    }

    async fn update_file_content(
        &self,
        case_id: &str,
        file_id: &str,
        content: &str,
        violations: &[String],
    ) -> StoreResult<PersistedCaseFile> {
        let mut tables = self.tables.lock().unwrap();
        let file = tables
            .files
            .iter_mut()
            .find(|f| f.case_id == case_id && f.file_id == file_id)
            .ok_or_else(|| StoreError::NotFound(format!("file {file_id} of case {case_id}")))?;
        file.content = content.to_string();
        file.digest = Some(ContentDigest::from_bytes(content.as_bytes()));
        file.violations = violations.to_vec();
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn get_case(&self, case_id: &str) -> StoreResult<Option<PersistedCase>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.cases.iter().find(|c| c.case_id == case_id).cloned())
    }

    async fn list_case_files(&self, case_id: &str) -> StoreResult<Vec<PersistedCaseFile>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .files
            .iter()
            .filter(|f| f.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn find_by_blueprint(&self, blueprint_id: &str) -> StoreResult<Vec<PersistedCase>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .cases
            .iter()
            .filter(|c| c.blueprint_id == blueprint_id)
            .cloned()
            .collect())
    }

    async fn register_arena(&self, arena: ArenaRecord) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.arenas.insert(arena.arena_id.clone(), arena);
        Ok(())
    }

    async fn register_competency(&self, competency: CompetencyRecord) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.arenas.contains_key(&competency.arena_id) {
            return Err(StoreError::ReferentialIntegrity(format!(
                "arena `{}` does not exist",
                competency.arena_id
            )));
        }
        tables
            .competencies
            .insert(competency.competency_id.clone(), competency);
        Ok(())
    }

    async fn register_user(&self, user: UserRecord) -> StoreResult<()> {
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(user.user_id.clone(), user);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mirror fakes
// ---------------------------------------------------------------------------

/// Mirror that keeps every write keyed by `(case_id, file_id)`.
#[derive(Debug, Default)]
pub struct MemoryMirrorStore {
    writes: Mutex<HashMap<(String, String), String>>,
}

impl MemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, case_id: &str, file_id: &str) -> Option<String> {
        self.writes
            .lock()
            .unwrap()
            .get(&(case_id.to_string(), file_id.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn mirror(
        &self,
        case_id: &str,
        file_id: &str,
        _file_name: &str,
        content: &str,
    ) -> StoreResult<()> {
        self.writes.lock().unwrap().insert(
            (case_id.to_string(), file_id.to_string()),
            content.to_string(),
        );
        Ok(())
    }
}

/// Mirror whose every write fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMirrorStore;

#[async_trait]
impl MirrorStore for FailingMirrorStore {
    async fn mirror(&self, _: &str, file_id: &str, _: &str, _: &str) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other(format!(
            "mirror unavailable for {file_id}"
        ))))
    }
}
