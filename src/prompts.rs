//! Instructions sent to the LLM for each kind of transformation.
//!
//! Every prompt lives here so changing the model's behaviour means editing
//! exactly one place, and so tests can inspect prompts without a live model.
//!
//! The external capability receives a single instruction text with the
//! subject embedded inline; [`instruction_text`] builds it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which instruction the external model is asked to follow.
///
/// `Convert` and `Refine` drive the two passes of the conversion pipeline.
/// The suggestion kinds are thin uses of the same capability from
/// [`crate::assist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// First pass: unstructured text → Markdown.
    Convert,
    /// Second pass over oversized output: polish existing Markdown.
    Refine,
    /// Propose document titles.
    SuggestTitles,
    /// Propose improvements as a JSON array of strings.
    SuggestImprovements,
}

impl InstructionKind {
    /// Stable tag used in cache fingerprints and logs.
    pub fn tag(self) -> &'static str {
        match self {
            InstructionKind::Convert => "convert",
            InstructionKind::Refine => "refine",
            InstructionKind::SuggestTitles => "suggest_titles",
            InstructionKind::SuggestImprovements => "suggest_improvements",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstructionKind::Convert => "Conversion",
            InstructionKind::Refine => "Refinement",
            InstructionKind::SuggestTitles => "Title suggestion",
            InstructionKind::SuggestImprovements => "Improvement suggestion",
        };
        f.write_str(label)
    }
}

/// Instructions for the first pass.
pub const CONVERT_INSTRUCTIONS: &str = r#"Instructions:
1. Analyze the content and create an appropriate structure with logical headers.
2. Use Markdown syntax for formatting, including headers, lists, code blocks, and emphasis.
3. Ensure consistent and professional formatting throughout.
4. Include relevant links if mentioned in the original text.
5. Highlight key concepts or terms where appropriate.
6. Organize the content for clarity and readability.
7. Maintain the original information and context.
8. Keep fenced code blocks exactly as they appear, byte for byte.
9. Do not add any introductory or concluding remarks about the conversion process.
10. The output should be pure Markdown, ready for direct use. Do NOT wrap it in ```markdown fences."#;

/// Instructions for the refinement pass.
pub const REFINE_INSTRUCTIONS: &str = r#"Refinement instructions:
1. Ensure a logical and flowing structure.
2. Improve transitions between sections.
3. Highlight key terms or concepts using appropriate Markdown syntax.
4. Verify and correct formatting of all links and code blocks.
5. Enhance explanations where necessary, maintaining brevity.
6. Ensure a consistent and professional tone.
7. Correct any grammatical or spelling errors.
8. Preserve the original context and core information.
9. Optimize the Markdown structure for readability and clarity.
10. Do not add any comments about the refinement process.
11. The output should be pure, refined Markdown content."#;

/// Number of leading chars of a document shown to the title prompt.
pub const TITLE_CONTEXT_CHARS: usize = 1000;

/// Build the full instruction text for `kind` with `subject` embedded.
///
/// `custom` replaces the built-in instruction block of the `Convert` kind;
/// it is ignored for the other kinds.
pub fn instruction_text(kind: InstructionKind, subject: &str, custom: Option<&str>) -> String {
    match kind {
        InstructionKind::Convert => format!(
            "Convert the following unstructured text into well-structured, professional documentation using Markdown format:\n\n{}\n\n{}",
            subject,
            custom.unwrap_or(CONVERT_INSTRUCTIONS)
        ),
        InstructionKind::Refine => format!(
            "Refine and improve the following Markdown content:\n\n{}\n\n{}",
            subject, REFINE_INSTRUCTIONS
        ),
        InstructionKind::SuggestTitles => format!(
            "Given the following Markdown content, suggest 5 concise and descriptive titles for the document. \
The titles should be clear, professional, and reflect the main topic or purpose of the content. \
Provide only the titles, separated by newlines.\n\nContent:\n{}\n\nTitles:",
            subject
        ),
        InstructionKind::SuggestImprovements => format!(
            "Given the following markdown content, provide 3-5 suggestions for improving or enhancing the document. \
Focus on structure, content, and clarity. Present each suggestion as a concise, actionable item.\n\n\
Markdown content:\n{}\n\n\
Provide your suggestions as a JSON array of strings, with each suggestion as a separate string element.",
            subject
        ),
    }
}
