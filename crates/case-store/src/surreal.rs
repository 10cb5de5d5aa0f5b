//! SurrealDB-backed `CaseStore`
//!
//! The case row, its duplicate check, the arena/competency checks, the
//! clearing of a stale `created_by` and every file row are issued as one
//! `BEGIN ... COMMIT` block, so a failure at any statement cancels the
//! whole unit.
//!
//! Supports in-memory, local (surrealkv) and cloud (WebSocket) connections.

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument, warn};

use crate::digest::ContentDigest;
use crate::error::StoreError;
use crate::migrations;
use crate::records::{
    ArenaRecord, CompetencyRecord, NewCase, NewCaseFile, PersistedCase, PersistedCaseFile,
    UserRecord,
};
use crate::traits::{CaseStore, StoreResult};

const DUPLICATE_MARKER: &str = "casegen:duplicate_case";
const MISSING_ARENA_MARKER: &str = "casegen:missing_arena";
const MISSING_COMPETENCY_MARKER: &str = "casegen:missing_competency";
const NOT_EXECUTED: &str = "not executed due to a failed transaction";

const CREATE_CASE_TX: &str = r#"
    BEGIN TRANSACTION;
    IF array::len((SELECT case_id FROM cases WHERE blueprint_id = $blueprint_id)) > 0 {
        THROW "casegen:duplicate_case";
    };
    IF array::len((SELECT arena_id FROM arenas WHERE arena_id = $arena_id)) = 0 {
        THROW "casegen:missing_arena";
    };
    IF array::len((SELECT competency_id FROM competencies WHERE competency_id = $competency_id)) = 0 {
        THROW "casegen:missing_competency";
    };
    CREATE cases CONTENT $case;
    IF $created_by != NONE AND array::len((SELECT user_id FROM users WHERE user_id = $created_by)) = 0 {
        UPDATE cases SET created_by = NONE WHERE case_id = $case_id;
    };
    FOR $file IN $files {
        CREATE case_files CONTENT $file;
    };
    COMMIT TRANSACTION;
"#;

/// Configuration for a SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "casegen")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: "casegen".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Reads `SURREALDB_ENDPOINT`, `SURREALDB_USERNAME`, `SURREALDB_PASSWORD`
    /// (required) and `SURREALDB_NAMESPACE`, `SURREALDB_DATABASE`,
    /// `SURREALDB_ROOT` (optional).
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;

        Ok(Self {
            endpoint,
            username,
            password,
            namespace: std::env::var("SURREALDB_NAMESPACE")
                .unwrap_or_else(|_| "casegen".to_string()),
            database: std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| "main".to_string()),
            is_root: std::env::var("SURREALDB_ROOT")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

/// SurrealDB implementation of [`CaseStore`].
#[derive(Clone)]
pub struct SurrealCaseStore {
    db: Surreal<Any>,
}

impl SurrealCaseStore {
    /// In-memory instance (`mem://`) with schema initialized.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect("mem://").await
    }

    /// Connect to any SurrealDB URL (`mem://`, `surrealkv://path`, `ws://...`)
    /// without authentication.
    #[instrument]
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns("casegen")
            .use_db("main")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealCaseStore connected ({})", url);
        Ok(Self { db })
    }

    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace))]
    pub async fn setup_cloud(config: CloudConfig) -> StoreResult<Self> {
        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StoreError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StoreError::Connection(format!("Root authentication failed: {e}")))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StoreError::Connection(format!("Database authentication failed: {e}")))?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealCaseStore connected (cloud)");
        Ok(Self { db })
    }

    /// Connect using environment variables.
    ///
    /// Cloud config if `SURREALDB_ENDPOINT` is set, else `SURREALDB_URL`,
    /// else local persistence under `.casegen/db`.
    pub async fn from_env() -> StoreResult<Self> {
        if let Ok(config) = CloudConfig::from_env() {
            return Self::setup_cloud(config).await;
        }
        if let Ok(url) = std::env::var("SURREALDB_URL") {
            return Self::connect(&url).await;
        }

        let path = ".casegen/db";
        std::fs::create_dir_all(path).map_err(|e| {
            StoreError::Connection(format!("Failed to create database directory {path}: {e}"))
        })?;
        Self::connect(&format!("surrealkv://{path}")).await
    }

    async fn arena_exists(&self, arena_id: &str) -> StoreResult<bool> {
        #[derive(Deserialize)]
        struct Row {
            #[allow(dead_code)]
            arena_id: String,
        }

        let mut result = self
            .db
            .query("SELECT arena_id FROM arenas WHERE arena_id = $arena_id")
            .bind(("arena_id", arena_id.to_string()))
            .await
            .map_err(|e| classify_message(&e.to_string()))?;
        let rows: Vec<Row> = result.take(0)?;
        Ok(!rows.is_empty())
    }

    /// Explain a cancelled transaction whose statements only reported
    /// "not executed" by re-reading the rows it guards.
    async fn diagnose_failed_create(&self, case: &PersistedCase, message: String) -> StoreError {
        match self.find_by_blueprint(&case.blueprint_id).await {
            Ok(existing) if !existing.is_empty() => StoreError::Duplicate {
                blueprint_id: case.blueprint_id.clone(),
            },
            _ => StoreError::Transaction(message),
        }
    }
}

fn missing_relation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)(?:table|relation)\s+['"`]?([A-Za-z0-9_]+)['"`]?\s+does not exist"#)
            .expect("valid missing-relation pattern")
    })
}

/// Map a backend error message to a typed [`StoreError`].
pub(crate) fn classify_message(message: &str) -> StoreError {
    if let Some(caps) = missing_relation_pattern().captures(message) {
        return StoreError::MissingRelation {
            relation: caps[1].to_string(),
        };
    }
    StoreError::Query(message.to_string())
}

fn classify_create_failure(message: &str, case: &PersistedCase) -> StoreError {
    if message.contains(DUPLICATE_MARKER) || message.contains("idx_case_blueprint") {
        return StoreError::Duplicate {
            blueprint_id: case.blueprint_id.clone(),
        };
    }
    if message.contains(MISSING_ARENA_MARKER) {
        return StoreError::ReferentialIntegrity(format!(
            "arena `{}` does not exist",
            case.arena_id
        ));
    }
    if message.contains(MISSING_COMPETENCY_MARKER) {
        return StoreError::ReferentialIntegrity(format!(
            "competency `{}` does not exist",
            case.competency_id
        ));
    }
    match classify_message(message) {
        StoreError::Query(msg) => StoreError::Transaction(msg),
        other => other,
    }
}

/// Pick the statement error that caused a transaction to cancel.
fn root_cause(errors: HashMap<usize, surrealdb::Error>) -> Option<String> {
    let mut ordered: Vec<(usize, String)> = errors
        .into_iter()
        .map(|(idx, err)| (idx, err.to_string()))
        .collect();
    ordered.sort_by_key(|(idx, _)| *idx);

    let first = ordered.first().map(|(_, msg)| msg.clone());
    ordered
        .into_iter()
        .map(|(_, msg)| msg)
        .find(|msg| !msg.contains(NOT_EXECUTED))
        .or(first)
}

#[async_trait]
impl CaseStore for SurrealCaseStore {
    #[instrument(skip(self, case, files), fields(blueprint_id = %case.blueprint_id, files = files.len()))]
    async fn create_case_with_files(
        &self,
        case: NewCase,
        files: Vec<NewCaseFile>,
    ) -> StoreResult<(PersistedCase, Vec<PersistedCaseFile>)> {
        let now = Utc::now();
        let case_id = uuid::Uuid::new_v4().to_string();
        let mut persisted = PersistedCase::from_new(case_id.clone(), case, now);
        let persisted_files: Vec<PersistedCaseFile> = files
            .into_iter()
            .enumerate()
            .map(|(position, file)| PersistedCaseFile::from_new(&case_id, position as u32, file, now))
            .collect();

        debug!(case_id = %case_id, "creating case with files in one transaction");

        let mut response = self
            .db
            .query(CREATE_CASE_TX)
            .bind(("blueprint_id", persisted.blueprint_id.clone()))
            .bind(("arena_id", persisted.arena_id.clone()))
            .bind(("competency_id", persisted.competency_id.clone()))
            .bind(("created_by", persisted.created_by.clone()))
            .bind(("case_id", case_id.clone()))
            .bind(("case", persisted.clone()))
            .bind(("files", persisted_files.clone()))
            .await
            .map_err(|e| classify_create_failure(&e.to_string(), &persisted))?;

        if let Some(message) = root_cause(response.take_errors()) {
            let err = classify_create_failure(&message, &persisted);
            return Err(match err {
                StoreError::Transaction(msg) if msg.contains(NOT_EXECUTED) => {
                    self.diagnose_failed_create(&persisted, msg).await
                }
                other => other,
            });
        }

        if let Some(user) = persisted.created_by.clone() {
            let committed = self.get_case(&case_id).await?;
            if committed.map_or(true, |c| c.created_by.is_none()) {
                warn!(user_id = %user, "attributed user no longer exists; cleared created_by");
                persisted.created_by = None;
            }
        }

        info!(
            case_id = %case_id,
            files = persisted_files.len(),
            "case committed"
        );
        Ok((persisted, persisted_files))
    }

    #[instrument(skip(self, content, violations))]
    async fn update_file_content(
        &self,
        case_id: &str,
        file_id: &str,
        content: &str,
        violations: &[String],
    ) -> StoreResult<PersistedCaseFile> {
        let digest = ContentDigest::from_bytes(content.as_bytes());

        let mut result = self
            .db
            .query(
                "UPDATE case_files SET content = $content, digest = $digest, \
                 violations = $violations, updated_at = $now \
                 WHERE case_id = $case_id AND file_id = $file_id RETURN AFTER",
            )
            .bind(("content", content.to_string()))
            .bind(("digest", digest))
            .bind(("violations", violations.to_vec()))
            .bind(("now", Utc::now()))
            .bind(("case_id", case_id.to_string()))
            .bind(("file_id", file_id.to_string()))
            .await
            .map_err(|e| classify_message(&e.to_string()))?;

        let updated: Vec<PersistedCaseFile> = result.take(0)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("file {file_id} of case {case_id}")))
    }

    #[instrument(skip(self))]
    async fn get_case(&self, case_id: &str) -> StoreResult<Option<PersistedCase>> {
        let mut result = self
            .db
            .query("SELECT * FROM cases WHERE case_id = $case_id")
            .bind(("case_id", case_id.to_string()))
            .await
            .map_err(|e| classify_message(&e.to_string()))?;

        let cases: Vec<PersistedCase> = result.take(0)?;
        Ok(cases.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list_case_files(&self, case_id: &str) -> StoreResult<Vec<PersistedCaseFile>> {
        let mut result = self
            .db
            .query("SELECT * FROM case_files WHERE case_id = $case_id ORDER BY position")
            .bind(("case_id", case_id.to_string()))
            .await
            .map_err(|e| classify_message(&e.to_string()))?;

        Ok(result.take(0)?)
    }

    #[instrument(skip(self))]
    async fn find_by_blueprint(&self, blueprint_id: &str) -> StoreResult<Vec<PersistedCase>> {
        let mut result = self
            .db
            .query("SELECT * FROM cases WHERE blueprint_id = $blueprint_id")
            .bind(("blueprint_id", blueprint_id.to_string()))
            .await
            .map_err(|e| classify_message(&e.to_string()))?;

        Ok(result.take(0)?)
    }

    async fn register_arena(&self, arena: ArenaRecord) -> StoreResult<()> {
        self.db
            .query("UPSERT type::thing('arenas', $arena_id) CONTENT $arena")
            .bind(("arena_id", arena.arena_id.clone()))
            .bind(("arena", arena))
            .await
            .map_err(|e| classify_message(&e.to_string()))?
            .check()?;
        Ok(())
    }

    async fn register_competency(&self, competency: CompetencyRecord) -> StoreResult<()> {
        if !self.arena_exists(&competency.arena_id).await? {
            return Err(StoreError::ReferentialIntegrity(format!(
                "arena `{}` does not exist",
                competency.arena_id
            )));
        }
        self.db
            .query("UPSERT type::thing('competencies', $competency_id) CONTENT $competency")
            .bind(("competency_id", competency.competency_id.clone()))
            .bind(("competency", competency))
            .await
            .map_err(|e| classify_message(&e.to_string()))?
            .check()?;
        Ok(())
    }

    async fn register_user(&self, user: UserRecord) -> StoreResult<()> {
        self.db
            .query("UPSERT type::thing('users', $user_id) CONTENT $user")
            .bind(("user_id", user.user_id.clone()))
            .bind(("user", user))
            .await
            .map_err(|e| classify_message(&e.to_string()))?
            .check()?;
        Ok(())
    }
}
