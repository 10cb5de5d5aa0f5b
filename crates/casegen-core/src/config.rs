//! Pipeline configuration, loadable from TOML.
//!
//! ```toml
//! parse_attempts = 3
//! call_timeout_ms = 120000
//! run_ceiling_ms = 900000
//! on_case_repair_exhausted = "persist_flagged"
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 1000
//! max_delay_ms = 8000
//!
//! [asset_thresholds]
//! min_slides = 12
//! ```
//!
//! Every field is optional; omitted fields keep their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::RetryPolicy;
use crate::domain::PipelineError;
use crate::parse::DEFAULT_PARSE_ATTEMPTS;
use crate::prompts::PromptTemplates;
use crate::validation::{AssetThresholds, CaseThresholds};

/// What to do when the case still fails validation after its one repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Abort the run with `case_validation_failed`
    #[default]
    Fail,
    /// Persist anyway, recording the violations on the case
    PersistFlagged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub parse_attempts: u32,
    pub call_timeout_ms: u64,
    /// Wall-clock limit for a whole run; unlimited when absent
    pub run_ceiling_ms: Option<u64>,
    pub case_thresholds: CaseThresholds,
    pub asset_thresholds: AssetThresholds,
    pub on_case_repair_exhausted: ExhaustionPolicy,
    pub prompts: PromptTemplates,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            parse_attempts: DEFAULT_PARSE_ATTEMPTS,
            call_timeout_ms: 120_000,
            run_ceiling_ms: None,
            case_thresholds: CaseThresholds::default(),
            asset_thresholds: AssetThresholds::default(),
            on_case_repair_exhausted: ExhaustionPolicy::default(),
            prompts: PromptTemplates::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, PipelineError> {
        let config: Self =
            toml::from_str(source).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn run_ceiling(&self) -> Option<Duration> {
        self.run_ceiling_ms.map(Duration::from_millis)
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.call_timeout_ms == 0 {
            return Err(PipelineError::Config(
                "call_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(PipelineError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        let t = &self.asset_thresholds;
        if t.min_profiles > t.max_profiles {
            return Err(PipelineError::Config(
                "asset_thresholds.min_profiles must not exceed max_profiles".to_string(),
            ));
        }
        let c = &self.case_thresholds;
        if c.min_stages > c.max_stages {
            return Err(PipelineError::Config(
                "case_thresholds.min_stages must not exceed max_stages".to_string(),
            ));
        }
        Ok(())
    }
}
