//! Structured observability for generation runs.
//!
//! The orchestrator reports every lifecycle step as a [`PipelineEvent`]
//! to a [`PipelineObserver`]. [`TracingObserver`] turns events into
//! `tracing` records (`event = "..."` field, `info!` for progress,
//! `warn!` for degradations); [`RecordingObserver`] keeps them in memory
//! for assertions.
//!
//! Log verbosity follows `RUST_LOG`; see [`crate::telemetry`] for JSON output.

use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{ContentType, Phase};
use crate::validation::ValidationTarget;

/// A lifecycle step of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    RunStarted {
        dedupe_key: String,
    },
    PhaseStarted {
        phase: Phase,
    },
    GeneratorCalled {
        phase: Phase,
        attempt: u32,
    },
    GeneratorFailed {
        phase: Phase,
        attempt: u32,
        error: String,
    },
    BackoffScheduled {
        phase: Phase,
        attempt: u32,
        delay_ms: u64,
    },
    ParseRepaired {
        phase: Phase,
        attempts: u32,
    },
    ParseFailed {
        phase: Phase,
        attempts: u32,
        message: String,
    },
    ValidationFailed {
        target: ValidationTarget,
        violations: Vec<String>,
    },
    RepairRequested {
        target: ValidationTarget,
        expansion: bool,
    },
    CasePersisted {
        case_id: String,
        file_count: usize,
        flagged: bool,
    },
    AssetStarted {
        file_id: String,
        content_type: ContentType,
    },
    AssetCompleted {
        file_id: String,
        success: bool,
        repaired: bool,
        content_length: usize,
    },
    MirrorFailed {
        file_id: String,
        error: String,
    },
    RunFinished {
        success: bool,
        generator_calls: u32,
        duration_ms: u64,
        error_code: Option<String>,
    },
}

/// Receives pipeline events. Implementations must not block.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Emits every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::RunStarted { dedupe_key } => {
                info!(event = "run.started", dedupe_key = %dedupe_key);
            }
            PipelineEvent::PhaseStarted { phase } => {
                info!(event = "phase.started", phase = %phase);
            }
            PipelineEvent::GeneratorCalled { phase, attempt } => {
                info!(event = "generator.called", phase = %phase, attempt = attempt);
            }
            PipelineEvent::GeneratorFailed {
                phase,
                attempt,
                error,
            } => {
                warn!(event = "generator.failed", phase = %phase, attempt = attempt, error = %error);
            }
            PipelineEvent::BackoffScheduled {
                phase,
                attempt,
                delay_ms,
            } => {
                info!(event = "generator.backoff", phase = %phase, attempt = attempt, delay_ms = delay_ms);
            }
            PipelineEvent::ParseRepaired { phase, attempts } => {
                info!(event = "parse.repaired", phase = %phase, attempts = attempts);
            }
            PipelineEvent::ParseFailed {
                phase,
                attempts,
                message,
            } => {
                warn!(event = "parse.failed", phase = %phase, attempts = attempts, message = %message);
            }
            PipelineEvent::ValidationFailed { target, violations } => {
                warn!(
                    event = "validation.failed",
                    target = ?target,
                    violation_count = violations.len(),
                    violations = ?violations,
                );
            }
            PipelineEvent::RepairRequested { target, expansion } => {
                info!(event = "repair.requested", target = ?target, expansion = expansion);
            }
            PipelineEvent::CasePersisted {
                case_id,
                file_count,
                flagged,
            } => {
                info!(event = "case.persisted", case_id = %case_id, file_count = file_count, flagged = flagged);
            }
            PipelineEvent::AssetStarted {
                file_id,
                content_type,
            } => {
                info!(event = "asset.started", file_id = %file_id, content_type = %content_type);
            }
            PipelineEvent::AssetCompleted {
                file_id,
                success,
                repaired,
                content_length,
            } => {
                info!(
                    event = "asset.completed",
                    file_id = %file_id,
                    success = success,
                    repaired = repaired,
                    content_length = content_length,
                );
            }
            PipelineEvent::MirrorFailed { file_id, error } => {
                warn!(event = "mirror.failed", file_id = %file_id, error = %error);
            }
            PipelineEvent::RunFinished {
                success,
                generator_calls,
                duration_ms,
                error_code,
            } => {
                info!(
                    event = "run.finished",
                    success = success,
                    generator_calls = generator_calls,
                    duration_ms = duration_ms,
                    error_code = error_code.as_deref().unwrap_or(""),
                );
            }
        }
    }
}

/// Keeps every event for later inspection.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn count(&self, predicate: impl Fn(&PipelineEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event.clone());
    }
}
