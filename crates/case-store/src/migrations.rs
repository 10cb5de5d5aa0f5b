//! SurrealDB schema initialization for the case tables
//!
//! Safe to call on every connection: every definition uses `IF NOT EXISTS`.

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::traits::StoreResult;

/// Tables written by the persistence boundary.
pub const TABLES: &[&str] = &["cases", "case_files", "arenas", "competencies", "users"];

/// Initialize all case tables.
///
/// ```text
/// TABLE cases {
///   case_id:       STRING (unique)
///   blueprint_id:  STRING (unique, duplicate-submission guard)
///   arena_id / competency_id / created_by?
///   title, description, difficulty?, duration_minutes?
///   content:       OBJECT (assembled case document)
///   violations:    ARRAY<STRING> (non-empty when flagged for review)
///   created_at:    DATETIME
/// }
/// TABLE case_files {
///   case_id + file_id (unique together), position, file_name, file_type,
///   content, digest?, violations, created_at, updated_at
/// }
/// ```
pub async fn init_schema(db: &Surreal<Any>) -> StoreResult<()> {
    info!("Initializing case-store schema");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS cases SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_case_id ON TABLE cases COLUMNS case_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_case_blueprint ON TABLE cases COLUMNS blueprint_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_case_arena ON TABLE cases COLUMNS arena_id;

        DEFINE TABLE IF NOT EXISTS case_files SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_case_file ON TABLE case_files COLUMNS case_id, file_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS arenas SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_arena_id ON TABLE arenas COLUMNS arena_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS competencies SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_competency_id ON TABLE competencies COLUMNS competency_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS users SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_user_id ON TABLE users COLUMNS user_id UNIQUE;
    "#;

    db.query(sql)
        .await
        .map_err(|e| StoreError::SchemaSetup(e.to_string()))?
        .check()
        .map_err(|e| StoreError::SchemaSetup(e.to_string()))?;

    debug!(tables = ?TABLES, "case-store schema ready");
    Ok(())
}
