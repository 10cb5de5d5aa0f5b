//! Storage trait definitions for generated cases
//!
//! - `CaseStore`: the atomic persistence boundary (case + files together
//!   or not at all) plus reference-data upserts
//! - `MirrorStore`: best-effort secondary copy of final asset content
//!
//! Both traits are async and backend-agnostic. In-memory fakes live in the
//! `fakes` module.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::records::{
    ArenaRecord, CompetencyRecord, NewCase, NewCaseFile, PersistedCase, PersistedCaseFile,
    UserRecord,
};

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Atomic case persistence.
///
/// Guarantees:
/// - `create_case_with_files` commits the case and every file record in one
///   transaction; on any failure neither is observable.
/// - The duplicate check on `blueprint_id` runs inside that transaction and
///   fails with `StoreError::Duplicate`.
/// - Missing arena/competency fails with `StoreError::ReferentialIntegrity`;
///   a missing `created_by` user is cleared rather than rejected.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Create a case and its file records atomically.
    async fn create_case_with_files(
        &self,
        case: NewCase,
        files: Vec<NewCaseFile>,
    ) -> StoreResult<(PersistedCase, Vec<PersistedCaseFile>)>;

    /// Replace a file's content and violations. Fails with `NotFound` if the
    /// file was never declared for the case.
    async fn update_file_content(
        &self,
        case_id: &str,
        file_id: &str,
        content: &str,
        violations: &[String],
    ) -> StoreResult<PersistedCaseFile>;

    async fn get_case(&self, case_id: &str) -> StoreResult<Option<PersistedCase>>;

    /// Files of a case in declaration order.
    async fn list_case_files(&self, case_id: &str) -> StoreResult<Vec<PersistedCaseFile>>;

    async fn find_by_blueprint(&self, blueprint_id: &str) -> StoreResult<Vec<PersistedCase>>;

    async fn register_arena(&self, arena: ArenaRecord) -> StoreResult<()>;

    async fn register_competency(&self, competency: CompetencyRecord) -> StoreResult<()>;

    async fn register_user(&self, user: UserRecord) -> StoreResult<()>;
}

/// Secondary copy of final asset content, keyed by case and file.
///
/// Failures are never fatal to a generation run; callers log and continue.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn mirror(
        &self,
        case_id: &str,
        file_id: &str,
        file_name: &str,
        content: &str,
    ) -> StoreResult<()>;
}

/// Mirror that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

#[async_trait]
impl MirrorStore for NoopMirror {
    async fn mirror(&self, _: &str, _: &str, _: &str, _: &str) -> StoreResult<()> {
        Ok(())
    }
}
