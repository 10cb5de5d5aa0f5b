//! Contract tests for `CaseStore`.
//!
//! Every check runs against the in-memory fake and the SurrealDB
//! implementation (`mem://`). Any conforming backend must pass these.

use case_store::fakes::{Fault, MemoryCaseStore};
use case_store::{
    ArenaRecord, CaseStore, CompetencyRecord, ContentDigest, NewCase, NewCaseFile, StoreError,
    SurrealCaseStore, UserRecord,
};

fn new_case(blueprint_id: &str) -> NewCase {
    NewCase {
        blueprint_id: blueprint_id.to_string(),
        arena_id: "finance".to_string(),
        competency_id: "valuation".to_string(),
        created_by: None,
        title: "Acquiring Northwind".to_string(),
        description: "A mid-market acquisition under time pressure.".to_string(),
        difficulty: Some("advanced".to_string()),
        duration_minutes: Some(90),
        content: serde_json::json!({ "title": "Acquiring Northwind" }),
        violations: vec![],
    }
}

fn files() -> Vec<NewCaseFile> {
    vec![
        NewCaseFile::new("f1", "deck.md", "presentation", ""),
        NewCaseFile::new("f2", "financials.csv", "spreadsheet", ""),
        NewCaseFile::new("f3", "memo.md", "memo", "# Memo\nalready written"),
    ]
}

async fn seed(store: &dyn CaseStore) {
    store
        .register_arena(ArenaRecord {
            arena_id: "finance".to_string(),
            name: "Finance".to_string(),
        })
        .await
        .unwrap();
    store
        .register_competency(CompetencyRecord {
            competency_id: "valuation".to_string(),
            arena_id: "finance".to_string(),
            name: "Valuation".to_string(),
        })
        .await
        .unwrap();
}

async fn surreal() -> SurrealCaseStore {
    let store = SurrealCaseStore::in_memory().await.unwrap();
    seed(&store).await;
    store
}

async fn memory() -> MemoryCaseStore {
    let store = MemoryCaseStore::new();
    seed(&store).await;
    store
}

// ---------------------------------------------------------------------------
// Shared contracts
// ---------------------------------------------------------------------------

async fn contract_create_persists_case_and_files(store: &dyn CaseStore) {
    let (case, created) = store
        .create_case_with_files(new_case("bp-create"), files())
        .await
        .unwrap();

    assert_eq!(case.blueprint_id, "bp-create");
    assert_eq!(created.len(), 3);
    assert!(created.iter().all(|f| f.case_id == case.case_id));

    let loaded = store.get_case(&case.case_id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Acquiring Northwind");
    assert_eq!(loaded.duration_minutes, Some(90));
    assert!(!loaded.is_flagged());

    let listed = store.list_case_files(&case.case_id).await.unwrap();
    let ids: Vec<_> = listed.iter().map(|f| f.file_id.as_str()).collect();
    assert_eq!(ids, vec!["f1", "f2", "f3"]);
    assert!(listed[0].digest.is_none());
    assert_eq!(
        listed[2].digest,
        Some(ContentDigest::from_bytes(b"# Memo\nalready written"))
    );
}

async fn contract_duplicate_blueprint_rejected(store: &dyn CaseStore) {
    store
        .create_case_with_files(new_case("bp-dup"), files())
        .await
        .unwrap();

    let err = store
        .create_case_with_files(new_case("bp-dup"), files())
        .await
        .unwrap_err();

    assert!(
        matches!(err, StoreError::Duplicate { ref blueprint_id } if blueprint_id == "bp-dup"),
        "expected duplicate error, got {err:?}"
    );
    assert_eq!(err.code(), "duplicate_case");
    assert_eq!(store.find_by_blueprint("bp-dup").await.unwrap().len(), 1);
}

async fn contract_missing_arena_is_referential_error(store: &dyn CaseStore) {
    let mut case = new_case("bp-orphan");
    case.arena_id = "nowhere".to_string();

    let err = store.create_case_with_files(case, files()).await.unwrap_err();
    assert!(matches!(err, StoreError::ReferentialIntegrity(ref msg) if msg.contains("nowhere")));
    assert!(store.find_by_blueprint("bp-orphan").await.unwrap().is_empty());
}

async fn contract_unknown_user_attribution_is_cleared(store: &dyn CaseStore) {
    store
        .register_user(UserRecord {
            user_id: "u-known".to_string(),
            display_name: "Known".to_string(),
        })
        .await
        .unwrap();

    let mut known = new_case("bp-known-user");
    known.created_by = Some("u-known".to_string());
    let (case, _) = store.create_case_with_files(known, vec![]).await.unwrap();
    assert_eq!(case.created_by.as_deref(), Some("u-known"));

    let mut gone = new_case("bp-gone-user");
    gone.created_by = Some("u-deleted".to_string());
    let (case, _) = store.create_case_with_files(gone, vec![]).await.unwrap();
    assert_eq!(case.created_by, None);
    let stored = store.get_case(&case.case_id).await.unwrap().unwrap();
    assert_eq!(stored.created_by, None);

    let known_stored = store
        .find_by_blueprint("bp-known-user")
        .await
        .unwrap()
        .remove(0);
    assert_eq!(known_stored.created_by.as_deref(), Some("u-known"));
}

async fn contract_duplicate_file_ids_roll_back_case(store: &dyn CaseStore) {
    let bad_files = vec![
        NewCaseFile::new("same", "a.md", "memo", ""),
        NewCaseFile::new("same", "b.md", "memo", ""),
    ];

    let result = store
        .create_case_with_files(new_case("bp-rollback"), bad_files)
        .await;

    assert!(result.is_err(), "duplicate file ids must fail the transaction");
    assert!(
        store.find_by_blueprint("bp-rollback").await.unwrap().is_empty(),
        "no orphaned case may survive a failed file insert"
    );
}

async fn contract_update_file_content(store: &dyn CaseStore) {
    let (case, _) = store
        .create_case_with_files(new_case("bp-update"), files())
        .await
        .unwrap();

    let violations = vec!["Document too short: found 10 words, need at least 900".to_string()];
    let updated = store
        .update_file_content(&case.case_id, "f1", "---\nmarp: true\n---\n# Hi", &violations)
        .await
        .unwrap();

    assert_eq!(updated.content, "---\nmarp: true\n---\n# Hi");
    assert_eq!(updated.violations, violations);
    assert!(updated.digest.is_some());

    let err = store
        .update_file_content(&case.case_id, "nope", "x", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Memory fake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_create_persists_case_and_files() {
    contract_create_persists_case_and_files(&memory().await).await;
}

#[tokio::test]
async fn memory_duplicate_blueprint_rejected() {
    contract_duplicate_blueprint_rejected(&memory().await).await;
}

#[tokio::test]
async fn memory_missing_arena_is_referential_error() {
    contract_missing_arena_is_referential_error(&memory().await).await;
}

#[tokio::test]
async fn memory_unknown_user_attribution_is_cleared() {
    contract_unknown_user_attribution_is_cleared(&memory().await).await;
}

#[tokio::test]
async fn memory_duplicate_file_ids_roll_back_case() {
    contract_duplicate_file_ids_roll_back_case(&memory().await).await;
}

#[tokio::test]
async fn memory_update_file_content() {
    contract_update_file_content(&memory().await).await;
}

#[tokio::test]
async fn memory_fault_after_case_insert_leaves_nothing() {
    let store = memory().await;
    store.inject_fault(Fault::AfterCaseInsert);

    let err = store
        .create_case_with_files(new_case("bp-fault"), files())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Transaction(_)));
    assert_eq!(store.case_count(), 0);
    assert_eq!(store.file_count(), 0);

    store.clear_fault();
    store
        .create_case_with_files(new_case("bp-fault"), files())
        .await
        .unwrap();
    assert_eq!(store.case_count(), 1);
    assert_eq!(store.file_count(), 3);
}

#[tokio::test]
async fn memory_missing_relation_fault_is_typed() {
    let store = memory().await;
    store.inject_fault(Fault::MissingRelation("case_files".to_string()));

    let err = store
        .create_case_with_files(new_case("bp-schema"), files())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "missing_relation");
    assert_eq!(store.case_count(), 0);
}

// ---------------------------------------------------------------------------
// SurrealDB
// ---------------------------------------------------------------------------

#[tokio::test]
async fn surreal_create_persists_case_and_files() {
    contract_create_persists_case_and_files(&surreal().await).await;
}

#[tokio::test]
async fn surreal_duplicate_blueprint_rejected() {
    contract_duplicate_blueprint_rejected(&surreal().await).await;
}

#[tokio::test]
async fn surreal_missing_arena_is_referential_error() {
    contract_missing_arena_is_referential_error(&surreal().await).await;
}

#[tokio::test]
async fn surreal_unknown_user_attribution_is_cleared() {
    contract_unknown_user_attribution_is_cleared(&surreal().await).await;
}

#[tokio::test]
async fn surreal_duplicate_file_ids_roll_back_case() {
    contract_duplicate_file_ids_roll_back_case(&surreal().await).await;
}

#[tokio::test]
async fn surreal_update_file_content() {
    contract_update_file_content(&surreal().await).await;
}

#[tokio::test]
async fn surreal_competency_requires_arena() {
    let store = SurrealCaseStore::in_memory().await.unwrap();
    let err = store
        .register_competency(CompetencyRecord {
            competency_id: "c".to_string(),
            arena_id: "missing".to_string(),
            name: "C".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ReferentialIntegrity(_)));
}
