//! Turns validation violations into a corrective prompt.

use std::fmt::{self, Write};

use crate::domain::ContentType;

/// Violation phrases that mean "write more", not "write differently".
pub const EXPANSION_KEYWORDS: &[&str] = &["too short", "too few", "need at least", "insufficient"];

/// What the repair prompt asks the generator to regenerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairSubject {
    WholeCase,
    Asset {
        file_name: String,
        content_type: ContentType,
    },
}

impl fmt::Display for RepairSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairSubject::WholeCase => f.write_str("the case study"),
            RepairSubject::Asset {
                file_name,
                content_type,
            } => write!(f, "the file \"{file_name}\" ({content_type})"),
        }
    }
}

/// True when any violation asks for more content.
pub fn needs_expansion(violations: &[String]) -> bool {
    violations.iter().any(|v| {
        let lower = v.to_lowercase();
        EXPANSION_KEYWORDS.iter().any(|k| lower.contains(k))
    })
}

/// Build a prompt asking for a complete regeneration that fixes `violations`.
///
/// The original prompt is kept in full, followed by a delimited section
/// listing every violation verbatim and the repair instructions. When any
/// violation is about missing volume, an explicit expansion instruction is
/// placed ahead of everything else.
pub fn synthesize_repair_prompt(
    original_prompt: &str,
    violations: &[String],
    subject: &RepairSubject,
) -> String {
    let mut out = String::with_capacity(original_prompt.len() + 512);

    if needs_expansion(violations) {
        let _ = writeln!(
            out,
            "IMPORTANT: your previous version of {subject} was too short or incomplete. \
             This revision must ADD substantial new material to reach every minimum listed \
             below. Reformatting or reorganizing the existing text is not enough.\n"
        );
    }

    out.push_str(original_prompt.trim_end());
    out.push_str("\n\n=== VALIDATION FAILED ===\n");
    let _ = writeln!(
        out,
        "Your previous version of {subject} failed {} quality check(s):",
        violations.len()
    );
    for (idx, violation) in violations.iter().enumerate() {
        let _ = writeln!(out, "{}. {violation}", idx + 1);
    }
    out.push_str("=== END VALIDATION FAILURES ===\n\n");

    let _ = write!(
        out,
        "Repair instructions:\n\
         - Regenerate {subject} in full. Do not return a diff, a summary of changes, or a fragment.\n\
         - Fix every failed check listed above.\n\
         - Keep everything that already met the requirements.\n\
         - Do not use unfinished or filler text.\n\
         - Return only the requested output with no commentary."
    );
    out
}
