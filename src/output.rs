//! Conversion results and statistics.

use crate::pipeline::extract::{Extraction, StructureKind};
use crate::pipeline::transform::TransformOutcome;
use crate::prompts::InstructionKind;
use serde::{Deserialize, Serialize};

/// The final document plus everything known about how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final Markdown.
    pub markdown: String,
    /// First-pass results, in section order.
    pub sections: Vec<SectionResult>,
    /// Refinement-pass results, in section order; empty when the pass did not run.
    pub refinement: Vec<SectionResult>,
    pub stats: ConversionStats,
}

/// One transformed section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionResult {
    /// Zero-based position of the section within its pass.
    pub index: usize,
    pub kind: InstructionKind,
    pub markdown: String,
    /// Model calls made; 0 when served from cache.
    pub attempts: u32,
    pub cached: bool,
    pub duration_ms: u64,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl SectionResult {
    pub(crate) fn from_outcome(index: usize, kind: InstructionKind, outcome: TransformOutcome) -> Self {
        Self {
            index,
            kind,
            markdown: outcome.content,
            attempts: outcome.attempts,
            cached: outcome.cached,
            duration_ms: outcome.duration_ms,
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
        }
    }
}

/// How many spans of each kind the extractor found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureCounts {
    pub code_blocks: usize,
    pub headers: usize,
    pub list_items: usize,
}

impl From<&Extraction> for StructureCounts {
    fn from(ex: &Extraction) -> Self {
        Self {
            code_blocks: ex.count(StructureKind::Code),
            headers: ex.count(StructureKind::Header),
            list_items: ex.count(StructureKind::ListItem),
        }
    }
}

/// Aggregate numbers for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub input_chars: usize,
    pub output_chars: usize,
    /// Sections in the first pass.
    pub total_sections: usize,
    /// Sections in the refinement pass (0 if it did not run).
    pub refined_sections: usize,
    pub refined: bool,
    /// Sections of either pass served from cache.
    pub cached_sections: usize,
    /// Model calls across both passes.
    pub total_attempts: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub structures: StructureCounts,
    /// Placeholder tokens that could not be matched back to a span.
    pub unresolved_placeholders: usize,
    pub total_duration_ms: u64,
    pub convert_duration_ms: u64,
    pub refine_duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn add_pass(&mut self, results: &[SectionResult]) {
        for r in results {
            if r.cached {
                self.cached_sections += 1;
            }
            self.total_attempts += r.attempts as u64;
            self.total_input_tokens += r.input_tokens as u64;
            self.total_output_tokens += r.output_tokens as u64;
        }
    }
}
