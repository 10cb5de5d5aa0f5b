//! Case-Store: atomic persistence for generated cases
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: all-or-nothing commit of a case and its declared files, duplicate
//! submission protection, and reference-data integrity.
//!
//! ## Key Components
//!
//! - `CaseStore`: the persistence boundary trait
//! - `SurrealCaseStore`: SurrealDB implementation (one transaction per case)
//! - `MirrorStore` / `FsMirrorStore`: best-effort secondary copy of assets
//! - `fakes`: in-memory doubles with fault injection

mod digest;
mod error;
pub mod fakes;
pub mod migrations;
mod mirror;
mod records;
mod surreal;
pub mod traits;

pub use digest::ContentDigest;
pub use error::StoreError;
pub use mirror::FsMirrorStore;
pub use records::{
    ArenaRecord, CompetencyRecord, NewCase, NewCaseFile, PersistedCase, PersistedCaseFile,
    UserRecord,
};
pub use surreal::{CloudConfig, SurrealCaseStore};
pub use traits::{CaseStore, MirrorStore, NoopMirror, StoreResult};
