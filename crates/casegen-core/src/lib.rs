//! Casegen core: turns a generation request into a validated, persisted case.
//!
//! ## Layers
//!
//! - Text recovery: [`extract`], [`repair`] and the bounded [`parse`] loop
//!   recover structured data from unreliable generator output.
//! - Quality: [`validation`] checks drafts and assets against configurable
//!   thresholds; [`repair_prompt`] feeds violations back to the generator.
//! - Orchestration: [`GenerationOrchestrator`] runs outline, case,
//!   validation, repair, persistence and per-file asset generation with
//!   retries ([`backoff`]), per-call timeouts and an optional run ceiling.
//! - Seams: [`TextGenerator`], [`PromptBook`], [`PipelineObserver`], plus
//!   `case_store::CaseStore` / `MirrorStore` for persistence.

pub mod backoff;
pub mod config;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod generator;
pub mod obs;
pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod repair;
pub mod repair_prompt;
pub mod telemetry;
pub mod validation;

pub use backoff::RetryPolicy;
pub use config::{ExhaustionPolicy, PipelineConfig};
pub use domain::{
    AssetContent, CaseDraft, CaseFileDraft, ContentType, ErrorResponse, GenerationOptions,
    GenerationRequest, Overrides, Phase, PipelineError, RawGenerationOutput,
};
pub use extract::{extract, extract_shape, Extraction, Shape};
pub use generator::{
    GenerateOptions, GeneratorError, HttpGenerator, HttpGeneratorConfig, TextGenerator,
};
pub use obs::{PipelineEvent, PipelineObserver, RecordingObserver, TracingObserver};
pub use orchestrator::{AssetResult, GenerationOrchestrator, GenerationReport};
pub use parse::{ParseAttempt, ParseFailure, ParseSuccess, StructuralParser};
pub use prompts::{PromptBook, PromptTemplates, TemplatePromptBook};
pub use repair::repair;
pub use repair_prompt::{synthesize_repair_prompt, RepairSubject};
pub use telemetry::{init_tracing, LogFormat};
pub use validation::{
    validate_asset, validate_case, AssetThresholds, CaseThresholds, ValidationResult,
    ValidationTarget,
};
