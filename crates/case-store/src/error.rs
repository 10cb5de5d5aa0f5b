//! Error types for case-store

use thiserror::Error;

/// Errors that can occur at the persistence boundary.
///
/// `Duplicate`, `MissingRelation` and `ReferentialIntegrity` usually need
/// operator action (data cleanup, schema migration) and are surfaced to the
/// caller verbatim instead of being retried.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A case with the same caller-supplied blueprint identifier exists
    #[error("duplicate case: blueprint `{blueprint_id}` already has a persisted case")]
    Duplicate { blueprint_id: String },

    /// A table/relation the boundary writes to is not defined
    #[error("missing relation `{relation}`: run the case-store schema migration before generating")]
    MissingRelation { relation: String },

    /// A referenced parent record (arena, competency, case) does not exist
    #[error("referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    /// Requested record not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Transaction failed and was rolled back
    #[error("Transaction failed: {0}")]
    Transaction(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Filesystem error (mirror store)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Stable machine-readable code for this failure.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Duplicate { .. } => "duplicate_case",
            StoreError::MissingRelation { .. } => "missing_relation",
            StoreError::ReferentialIntegrity(_) => "referential_integrity",
            StoreError::NotFound(_) => "not_found",
            _ => "persistence_failure",
        }
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_distinguish_operator_errors() {
        let dup = StoreError::Duplicate {
            blueprint_id: "bp-1".to_string(),
        };
        assert_eq!(dup.code(), "duplicate_case");
        assert!(dup.to_string().contains("bp-1"));

        let missing = StoreError::MissingRelation {
            relation: "cases".to_string(),
        };
        assert_eq!(missing.code(), "missing_relation");
        assert!(missing.to_string().contains("migration"));

        let backend = StoreError::Query("boom".to_string());
        assert_eq!(backend.code(), "persistence_failure");
    }
}
