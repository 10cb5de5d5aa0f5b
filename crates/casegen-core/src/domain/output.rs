//! Pipeline phases and the raw text each generator call returns.

use serde::{Deserialize, Serialize};

/// Phase of the generation pipeline that issued a generator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Outline,
    Primary,
    Repair,
    Asset,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Outline => "outline",
            Phase::Primary => "primary",
            Phase::Repair => "repair",
            Phase::Asset => "asset",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verbatim text from one generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGenerationOutput {
    pub phase: Phase,
    pub attempt: u32,
    pub text: String,
}
