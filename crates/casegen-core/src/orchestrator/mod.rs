//! End-to-end generation run.
//!
//! ```text
//! Outlining -> Generating -> Validating -> [Repairing -> Validating]
//!           -> Persisting -> Assets -> Completed
//! ```
//!
//! Any phase can end the run with a [`PipelineError`]. Once the case is
//! persisted the run always completes: asset problems are reported per file
//! in [`GenerationReport::assets`] instead of failing the run.

mod assets;

use std::sync::Arc;
use std::time::Duration;

use case_store::{CaseStore, MirrorStore, NewCase, NewCaseFile, NoopMirror};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};

use crate::config::{ExhaustionPolicy, PipelineConfig};
use crate::domain::{CaseDraft, GenerationRequest, Phase, PipelineError, RawGenerationOutput};
use crate::generator::{GenerateOptions, GeneratorError, TextGenerator};
use crate::obs::{PipelineEvent, PipelineObserver, TracingObserver};
use crate::parse::{ParseFailure, ParseSuccess, StructuralParser};
use crate::prompts::{PromptBook, TemplatePromptBook};
use crate::repair_prompt::{needs_expansion, synthesize_repair_prompt, RepairSubject};
use crate::validation::{validate_case, ValidationResult, ValidationTarget};

pub use assets::AssetResult;

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub case_id: String,
    pub blueprint_id: String,
    /// Final draft, with generated asset content filled in
    pub draft: CaseDraft,
    pub case_validation: ValidationResult,
    pub case_repaired: bool,
    /// Persisted despite failing validation after repair
    pub flagged: bool,
    pub assets: Vec<AssetResult>,
    pub generator_calls: u32,
    /// Worst-case wall time for a run with this many files
    pub latency_bound_ms: u64,
}

impl GenerationReport {
    pub fn failed_assets(&self) -> impl Iterator<Item = &AssetResult> {
        self.assets.iter().filter(|a| !a.success)
    }
}

/// Per-run mutable state.
struct RunContext {
    started: Instant,
    calls: u32,
    system: String,
    options: GenerateOptions,
}

/// Drives one request through outline, case generation, validation,
/// repair, persistence and asset generation.
pub struct GenerationOrchestrator {
    generator: Arc<dyn TextGenerator>,
    store: Arc<dyn CaseStore>,
    mirror: Arc<dyn MirrorStore>,
    prompts: Arc<dyn PromptBook>,
    observer: Arc<dyn PipelineObserver>,
    config: PipelineConfig,
}

impl GenerationOrchestrator {
    pub fn new(generator: Arc<dyn TextGenerator>, store: Arc<dyn CaseStore>) -> Self {
        let config = PipelineConfig::default();
        Self {
            generator,
            store,
            mirror: Arc::new(NoopMirror),
            prompts: Arc::new(
                TemplatePromptBook::new(config.prompts.clone(), config.asset_thresholds.clone())
                    .with_case_thresholds(config.case_thresholds.clone()),
            ),
            observer: Arc::new(TracingObserver),
            config,
        }
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn MirrorStore>) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_prompts(mut self, prompts: Arc<dyn PromptBook>) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the configuration. Template prompts are rebuilt from it;
    /// call [`with_prompts`](Self::with_prompts) afterwards to override.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.prompts = Arc::new(
            TemplatePromptBook::new(config.prompts.clone(), config.asset_thresholds.clone())
                .with_case_thresholds(config.case_thresholds.clone()),
        );
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full pipeline for one request.
    pub async fn run(&self, request: GenerationRequest) -> Result<GenerationReport, PipelineError> {
        let dedupe_key = request.dedupe_key();
        let span = tracing::info_span!("casegen.run", dedupe_key = %dedupe_key);

        async move {
            self.emit(PipelineEvent::RunStarted {
                dedupe_key: dedupe_key.clone(),
            });
            let mut ctx = RunContext {
                started: Instant::now(),
                calls: 0,
                system: self.prompts.system_prompt(&request),
                options: GenerateOptions::from(&request.options),
            };

            let result = match request.validate() {
                Ok(()) => self.execute(&request, &mut ctx).await,
                Err(err) => Err(err),
            };

            self.emit(PipelineEvent::RunFinished {
                success: result.is_ok(),
                generator_calls: ctx.calls,
                duration_ms: ctx.started.elapsed().as_millis() as u64,
                error_code: result.as_ref().err().map(|e| e.code().to_string()),
            });
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &GenerationRequest,
        ctx: &mut RunContext,
    ) -> Result<GenerationReport, PipelineError> {
        // Outlining
        self.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Outline,
        });
        let outline_prompt = self.prompts.outline_prompt(request);
        let outline = self
            .call_until_accepted(ctx, Phase::Outline, &outline_prompt, |text| {
                self.parse_structure(Phase::Outline, text).map(|ok| ok.value)
            })
            .await?;

        // Generating
        self.emit(PipelineEvent::PhaseStarted {
            phase: Phase::Primary,
        });
        let case_prompt = self.prompts.case_prompt(request, &outline);
        let mut draft = self
            .call_until_accepted(ctx, Phase::Primary, &case_prompt, |text| {
                self.parse_draft(Phase::Primary, text)
            })
            .await?;
        draft.apply_overrides(&request.overrides);

        // Validating, with at most one repair round-trip
        let thresholds = &self.config.case_thresholds;
        let mut validation = validate_case(&draft, thresholds);
        let mut case_repaired = false;
        if !validation.valid {
            self.emit(PipelineEvent::ValidationFailed {
                target: ValidationTarget::Case,
                violations: validation.violations.clone(),
            });
            self.emit(PipelineEvent::RepairRequested {
                target: ValidationTarget::Case,
                expansion: needs_expansion(&validation.violations),
            });
            self.emit(PipelineEvent::PhaseStarted {
                phase: Phase::Repair,
            });
            let repair_prompt = synthesize_repair_prompt(
                &case_prompt,
                &validation.violations,
                &RepairSubject::WholeCase,
            );
            draft = self
                .call_until_accepted(ctx, Phase::Repair, &repair_prompt, |text| {
                    self.parse_draft(Phase::Repair, text)
                })
                .await?;
            draft.apply_overrides(&request.overrides);
            case_repaired = true;
            validation = validate_case(&draft, thresholds);
        }

        let flagged = if validation.valid {
            false
        } else {
            self.emit(PipelineEvent::ValidationFailed {
                target: ValidationTarget::Case,
                violations: validation.violations.clone(),
            });
            match self.config.on_case_repair_exhausted {
                ExhaustionPolicy::Fail => {
                    return Err(PipelineError::CaseValidation {
                        violations: validation.violations,
                    })
                }
                ExhaustionPolicy::PersistFlagged => {
                    warn!(
                        violation_count = validation.violations.len(),
                        "Persisting case that still fails validation"
                    );
                    true
                }
            }
        };

        // Persisting
        draft.normalize_file_ids();
        let latency_bound = self
            .config
            .retry
            .worst_case_latency(draft.files.len(), self.config.call_timeout());
        if let Some(ceiling) = self.config.run_ceiling() {
            if ceiling < latency_bound {
                debug!(
                    ceiling_ms = ceiling.as_millis() as u64,
                    latency_bound_ms = saturating_millis(latency_bound),
                    "Run ceiling is tighter than the worst-case latency"
                );
            }
        }
        let case_violations = if flagged {
            validation.violations.clone()
        } else {
            Vec::new()
        };
        let new_case = self.new_case(request, &draft, case_violations)?;
        let new_files = draft
            .files
            .iter()
            .map(|f| NewCaseFile::new(&f.file_id, &f.file_name, &f.file_type, &f.content))
            .collect();
        let (case, files) = self.store.create_case_with_files(new_case, new_files).await?;
        self.emit(PipelineEvent::CasePersisted {
            case_id: case.case_id.clone(),
            file_count: files.len(),
            flagged,
        });

        // Assets
        let assets = self
            .generate_assets(ctx, request, &case.case_id, &mut draft)
            .await;

        Ok(GenerationReport {
            case_id: case.case_id,
            blueprint_id: case.blueprint_id,
            draft,
            case_validation: validation,
            case_repaired,
            flagged,
            assets,
            generator_calls: ctx.calls,
            latency_bound_ms: saturating_millis(latency_bound),
        })
    }

    fn new_case(
        &self,
        request: &GenerationRequest,
        draft: &CaseDraft,
        violations: Vec<String>,
    ) -> Result<NewCase, PipelineError> {
        let content = serde_json::to_value(draft)
            .map_err(|e| PipelineError::Persistence(e.into()))?;
        Ok(NewCase {
            blueprint_id: request.dedupe_key(),
            arena_id: request.arena_id.clone(),
            competency_id: request.competency_id.clone(),
            created_by: request.created_by.clone(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            difficulty: draft.difficulty.clone(),
            duration_minutes: draft.duration_minutes,
            content,
            violations,
        })
    }

    // -----------------------------------------------------------------------
    // Generator calls
    // -----------------------------------------------------------------------

    /// Call the generator until `accept` takes the output or attempts run
    /// out. Generator failures and rejected output both consume an attempt
    /// and are followed by an exponential backoff delay.
    async fn call_until_accepted<T>(
        &self,
        ctx: &mut RunContext,
        phase: Phase,
        prompt: &str,
        mut accept: impl FnMut(&str) -> Result<T, ParseFailure> + Send,
    ) -> Result<T, PipelineError> {
        let policy = &self.config.retry;
        let mut last_error = None;

        for attempt in 1..=policy.attempts() {
            if attempt > 1 {
                let delay = policy.delay_for(attempt - 1);
                self.emit(PipelineEvent::BackoffScheduled {
                    phase,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                });
                tokio::time::sleep(delay).await;
            }
            self.check_deadline(ctx, phase)?;

            let raw = match self.call_generator(ctx, phase, attempt, prompt).await {
                Ok(raw) => raw,
                Err(source) => {
                    last_error = Some(PipelineError::Generator {
                        phase,
                        attempts: attempt,
                        source,
                    });
                    continue;
                }
            };

            match accept(&raw.text) {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    self.emit(PipelineEvent::ParseFailed {
                        phase,
                        attempts: failure.attempts,
                        message: failure.detail.message.clone(),
                    });
                    last_error = Some(PipelineError::StructuralParse { phase, failure });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PipelineError::Config("retry policy allows no attempts".to_string())
        }))
    }

    async fn call_generator(
        &self,
        ctx: &mut RunContext,
        phase: Phase,
        attempt: u32,
        prompt: &str,
    ) -> Result<RawGenerationOutput, GeneratorError> {
        ctx.calls += 1;
        self.emit(PipelineEvent::GeneratorCalled { phase, attempt });

        let limit = self.call_limit(ctx);
        let outcome = tokio::time::timeout(
            limit,
            self.generator.generate(prompt, &ctx.system, &ctx.options),
        )
        .await
        .unwrap_or(Err(GeneratorError::Timeout(limit.as_millis() as u64)));

        match outcome {
            Ok(text) => Ok(RawGenerationOutput {
                phase,
                attempt,
                text,
            }),
            Err(err) => {
                self.emit(PipelineEvent::GeneratorFailed {
                    phase,
                    attempt,
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Per-call timeout, shortened so a call never outlives the run ceiling.
    fn call_limit(&self, ctx: &RunContext) -> Duration {
        let per_call = self.config.call_timeout();
        match self.config.run_ceiling() {
            Some(ceiling) => per_call.min(ceiling.saturating_sub(ctx.started.elapsed())),
            None => per_call,
        }
    }

    fn check_deadline(&self, ctx: &RunContext, phase: Phase) -> Result<(), PipelineError> {
        let Some(ceiling) = self.config.run_ceiling() else {
            return Ok(());
        };
        let elapsed = ctx.started.elapsed();
        if elapsed >= ceiling {
            return Err(PipelineError::DeadlineExceeded {
                phase,
                elapsed_ms: elapsed.as_millis() as u64,
                ceiling_ms: ceiling.as_millis() as u64,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    fn parse_structure(&self, phase: Phase, text: &str) -> Result<ParseSuccess, ParseFailure> {
        let ok = StructuralParser::new(self.config.parse_attempts).parse(text)?;
        if ok.repaired() {
            self.emit(PipelineEvent::ParseRepaired {
                phase,
                attempts: ok.attempts.len() as u32,
            });
        }
        Ok(ok)
    }

    fn parse_draft(&self, phase: Phase, text: &str) -> Result<CaseDraft, ParseFailure> {
        let ok = self.parse_structure(phase, text)?;
        let attempts = ok.attempts.len() as u32;
        CaseDraft::from_value(ok.value).map_err(|e| {
            ParseFailure::schema_mismatch(
                format!("response does not match the case schema: {e}"),
                text,
                attempts,
            )
        })
    }

    fn emit(&self, event: PipelineEvent) {
        self.observer.on_event(&event);
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
