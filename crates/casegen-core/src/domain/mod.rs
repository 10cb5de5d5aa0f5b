//! Domain types for the case generation pipeline.

pub mod content;
pub mod draft;
pub mod error;
pub mod output;
pub mod request;

pub use content::{AssetContent, ContentType, SlideDeck};
pub use draft::{CaseDraft, CaseFileDraft, Dataset, Rubric, RubricCriterion, Stage};
pub use error::{ErrorResponse, PipelineError};
pub use output::{Phase, RawGenerationOutput};
pub use request::{GenerationOptions, GenerationRequest, Overrides};
