//! Per-file asset generation after the case is persisted.
//!
//! Each pending file gets one generation call and, if it fails validation,
//! one repair call. Whatever the final content is, it is written to the
//! store with its violations; a failing file never fails the run.

use serde::Serialize;

use super::{GenerationOrchestrator, RunContext};
use crate::domain::{CaseDraft, CaseFileDraft, ContentType, GenerationRequest, Phase, PipelineError};
use crate::obs::PipelineEvent;
use crate::repair_prompt::{needs_expansion, synthesize_repair_prompt, RepairSubject};
use crate::validation::{validate_asset, ValidationTarget};

/// Outcome for one generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetResult {
    pub file_id: String,
    pub file_name: String,
    pub content_type: ContentType,
    /// Valid content was persisted
    pub success: bool,
    pub repaired: bool,
    pub violations: Vec<String>,
    pub content_length: usize,
    pub error: Option<String>,
}

impl AssetResult {
    fn pending(file: &CaseFileDraft, content_type: ContentType) -> Self {
        Self {
            file_id: file.file_id.clone(),
            file_name: file.file_name.clone(),
            content_type,
            success: false,
            repaired: false,
            violations: Vec::new(),
            content_length: 0,
            error: None,
        }
    }
}

impl GenerationOrchestrator {
    /// Generate every file with empty content, strictly in declaration order.
    pub(super) async fn generate_assets(
        &self,
        ctx: &mut RunContext,
        request: &GenerationRequest,
        case_id: &str,
        draft: &mut CaseDraft,
    ) -> Vec<AssetResult> {
        let pending: Vec<usize> = draft.pending_files().map(|(idx, _)| idx).collect();
        let mut results = Vec::with_capacity(pending.len());

        for idx in pending {
            let file = draft.files[idx].clone();
            let (result, content) = self
                .generate_asset(ctx, request, case_id, draft, &file)
                .await;
            if let Some(content) = content {
                draft.files[idx].content = content;
            }
            self.emit(PipelineEvent::AssetCompleted {
                file_id: result.file_id.clone(),
                success: result.success,
                repaired: result.repaired,
                content_length: result.content_length,
            });
            results.push(result);
        }
        results
    }

    async fn generate_asset(
        &self,
        ctx: &mut RunContext,
        request: &GenerationRequest,
        case_id: &str,
        draft: &CaseDraft,
        file: &CaseFileDraft,
    ) -> (AssetResult, Option<String>) {
        let content_type = ContentType::classify(&file.file_type, &file.file_name);
        let mut result = AssetResult::pending(file, content_type);
        self.emit(PipelineEvent::AssetStarted {
            file_id: file.file_id.clone(),
            content_type,
        });

        let thresholds = &self.config.asset_thresholds;
        let prompt = self
            .prompts
            .asset_prompt(request, draft, file, content_type);

        let first = match self.generate_text(ctx, &prompt).await {
            Ok(text) => text,
            Err(err) => {
                result.error = Some(err.to_string());
                return (result, None);
            }
        };

        let mut validation = validate_asset(content_type, &first, thresholds);
        if !validation.valid {
            let target = ValidationTarget::Asset(content_type);
            self.emit(PipelineEvent::ValidationFailed {
                target,
                violations: validation.violations.clone(),
            });
            self.emit(PipelineEvent::RepairRequested {
                target,
                expansion: needs_expansion(&validation.violations),
            });

            let subject = RepairSubject::Asset {
                file_name: file.file_name.clone(),
                content_type,
            };
            let repair_prompt = synthesize_repair_prompt(&prompt, &validation.violations, &subject);
            match self.generate_text(ctx, &repair_prompt).await {
                Ok(second) => {
                    validation = validate_asset(content_type, &second, thresholds);
                    result.repaired = true;
                }
                Err(err) => result.error = Some(format!("repair call failed: {err}")),
            }
        }

        result.violations = validation.violations.clone();
        result.content_length = validation.cleaned.len();

        if let Err(err) = self
            .store
            .update_file_content(case_id, &file.file_id, &validation.cleaned, &validation.violations)
            .await
        {
            result.error = Some(format!("failed to persist content: {err}"));
            return (result, None);
        }
        result.success = validation.valid;

        if let Err(err) = self
            .mirror
            .mirror(case_id, &file.file_id, &file.file_name, &validation.cleaned)
            .await
        {
            self.emit(PipelineEvent::MirrorFailed {
                file_id: file.file_id.clone(),
                error: err.to_string(),
            });
        }

        (result, Some(validation.cleaned))
    }

    async fn generate_text(
        &self,
        ctx: &mut RunContext,
        prompt: &str,
    ) -> Result<String, PipelineError> {
        self.call_until_accepted(ctx, Phase::Asset, prompt, |text| Ok(text.to_string()))
            .await
    }
}
