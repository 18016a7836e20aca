//! Section splitting: partition text into budget-bounded sections.
//!
//! Sections are built from whole paragraphs (text between blank lines) so
//! the model always sees complete thoughts. Only a paragraph that is itself
//! larger than half the budget is cut into fixed-size windows; there is no
//! better boundary available at that granularity.
//!
//! Splitting is a pure function of the text and the budget. Sizes are
//! counted in chars, never bytes, so windows always fall on char boundaries.

use serde::{Deserialize, Serialize};

/// Paragraph separator; also the separator used to rejoin sections.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Fixed token estimate per char. An approximation, not a tokenizer.
pub const TOKENS_PER_CHAR: f64 = 0.25;

/// Size limit for one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionBudget {
    /// At most this many chars per section.
    Chars(usize),
    /// At most this many estimated tokens per section.
    Tokens(usize),
}

impl Default for SectionBudget {
    fn default() -> Self {
        SectionBudget::Tokens(8000)
    }
}

impl SectionBudget {
    /// The budget in its own unit.
    pub fn limit(&self) -> usize {
        match self {
            SectionBudget::Chars(n) | SectionBudget::Tokens(n) => *n,
        }
    }

    /// Size of `text` in this budget's unit.
    pub fn measure(&self, text: &str) -> usize {
        self.measure_chars(text.chars().count())
    }

    /// Size of a text of `chars` chars in this budget's unit.
    pub fn measure_chars(&self, chars: usize) -> usize {
        match self {
            SectionBudget::Chars(_) => chars,
            SectionBudget::Tokens(_) => tokens_for_chars(chars),
        }
    }

    /// Paragraphs measuring more than this are force-split.
    pub fn force_split_limit(&self) -> usize {
        (self.limit() / 2).max(1)
    }

    /// Window length in chars for a force-split; each window measures at
    /// most [`Self::force_split_limit`].
    fn window_chars(&self) -> usize {
        let half = self.force_split_limit();
        match self {
            SectionBudget::Chars(_) => half,
            SectionBudget::Tokens(_) => ((half as f64) / TOKENS_PER_CHAR).floor().max(1.0) as usize,
        }
    }
}

/// Estimated token count: `ceil(chars × 0.25)`.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_chars(text.chars().count())
}

fn tokens_for_chars(chars: usize) -> usize {
    (chars as f64 * TOKENS_PER_CHAR).ceil() as usize
}

/// Split `text` into ordered sections that each fit `budget`.
///
/// Joining the result with [`PARAGRAPH_BREAK`] gives back the input exactly,
/// unless a paragraph had to be force-split (the windows are then separated
/// by paragraph breaks of their own). Empty input yields no sections.
pub fn split_into_sections(text: &str, budget: SectionBudget) -> Vec<String> {
    let limit = budget.limit();
    let separator_chars = PARAGRAPH_BREAK.chars().count();
    let mut sections = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut has_content = false;

    for paragraph in paragraphs(text, budget) {
        let paragraph_chars = paragraph.chars().count();
        if !has_content {
            current.push_str(&paragraph);
            current_chars = paragraph_chars;
            has_content = true;
            continue;
        }

        let joined_chars = current_chars + separator_chars + paragraph_chars;
        if budget.measure_chars(joined_chars) <= limit {
            current.push_str(PARAGRAPH_BREAK);
            current.push_str(&paragraph);
            current_chars = joined_chars;
        } else {
            push_section(&mut sections, std::mem::take(&mut current));
            current.push_str(&paragraph);
            current_chars = paragraph_chars;
        }
    }

    push_section(&mut sections, current);
    sections
}

fn push_section(sections: &mut Vec<String>, section: String) {
    if !section.is_empty() {
        sections.push(section);
    }
}

/// Paragraphs of `text`, with oversized ones already cut into windows.
fn paragraphs(text: &str, budget: SectionBudget) -> Vec<String> {
    let force_limit = budget.force_split_limit();
    let mut out = Vec::new();
    for paragraph in text.split(PARAGRAPH_BREAK) {
        if budget.measure(paragraph) > force_limit {
            out.extend(force_split(paragraph, budget.window_chars()));
        } else {
            out.push(paragraph.to_string());
        }
    }
    out
}

/// Cut `text` into consecutive windows of at most `window` chars.
pub fn force_split(text: &str, window: usize) -> Vec<String> {
    let window = window.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(window)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
