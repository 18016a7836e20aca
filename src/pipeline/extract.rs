//! Structure extraction: swap structurally significant spans for tokens.
//!
//! Fenced code blocks, ATX headers and list-item lines are pulled out of the
//! text and replaced with numbered placeholder tokens such as
//! `{{CODE_BLOCK:0}}` or `{{LIST_ITEM:3}}`. The number is the span's index
//! in [`Extraction::spans`], so reinsertion is an exact lookup and never
//! depends on the span's text.
//!
//! ## Extraction order
//!
//! Token-shaped text already present in the input is taken out first as a
//! [`StructureKind::Literal`] span and comes back verbatim, so only tokens
//! made by extraction ever resolve to structure. Code blocks come next so
//! that a `#` or `-` *inside* a fence is never taken for a header or list
//! item; headers go before list items. The
//! order also guarantees that a span can only contain tokens of spans
//! extracted before it, which is what makes nested reinsertion terminate.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub(crate) static RE_CODE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());

static RE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}[ \t].*$").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-*+][ \t].*$").unwrap());

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(LITERAL|CODE_BLOCK|HEADER|LIST_ITEM):(\d+)\}\}").unwrap());

/// Kind of structurally significant span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Placeholder-shaped text that was already in the input.
    Literal,
    Code,
    Header,
    ListItem,
}

impl StructureKind {
    /// Tag used inside the placeholder token.
    pub fn tag(self) -> &'static str {
        match self {
            StructureKind::Literal => "LITERAL",
            StructureKind::Code => "CODE_BLOCK",
            StructureKind::Header => "HEADER",
            StructureKind::ListItem => "LIST_ITEM",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "LITERAL" => Some(StructureKind::Literal),
            "CODE_BLOCK" => Some(StructureKind::Code),
            "HEADER" => Some(StructureKind::Header),
            "LIST_ITEM" => Some(StructureKind::ListItem),
            _ => None,
        }
    }

    /// Placeholder token for the span at `index`.
    pub fn placeholder(self, index: usize) -> String {
        format!("{{{{{}:{}}}}}", self.tag(), index)
    }
}

/// An extracted span and what kind of structure it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSpan {
    pub kind: StructureKind,
    pub content: String,
}

/// Result of [`extract_structures`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// The input with every span replaced by its placeholder token.
    pub text: String,
    /// Extracted spans; a token's number indexes into this list.
    pub spans: Vec<StructuredSpan>,
}

impl Extraction {
    /// Number of extracted spans of `kind`.
    pub fn count(&self, kind: StructureKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }
}

/// Result of [`reinsert_structures`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reinsertion {
    pub text: String,
    /// Placeholder tokens left verbatim because no span matched them.
    pub mismatches: Vec<String>,
}

/// Replace literal tokens, code blocks, headers, then list items with
/// placeholders.
pub fn extract_structures(text: &str) -> Extraction {
    let mut spans = Vec::new();
    let s = extract_kind(text, &RE_PLACEHOLDER, StructureKind::Literal, &mut spans);
    let s = extract_kind(&s, &RE_CODE_BLOCK, StructureKind::Code, &mut spans);
    let s = extract_kind(&s, &RE_HEADER, StructureKind::Header, &mut spans);
    let s = extract_kind(&s, &RE_LIST_ITEM, StructureKind::ListItem, &mut spans);
    Extraction { text: s, spans }
}

fn extract_kind(
    text: &str,
    re: &Regex,
    kind: StructureKind,
    spans: &mut Vec<StructuredSpan>,
) -> String {
    re.replace_all(text, |caps: &Captures<'_>| {
        let index = spans.len();
        spans.push(StructuredSpan {
            kind,
            content: caps[0].to_string(),
        });
        kind.placeholder(index)
    })
    .into_owned()
}

/// Put every span back in place of its placeholder token.
///
/// A token whose number is out of range, or whose kind does not match the
/// span at that index, is an extraction mismatch: it stays in the text
/// verbatim and is reported, never treated as an error.
pub fn reinsert_structures(text: &str, spans: &[StructuredSpan]) -> Reinsertion {
    let mut mismatches = Vec::new();
    let text = expand(text, spans, spans.len(), &mut mismatches);
    for token in &mismatches {
        warn!("No structured span matches placeholder {}; leaving it in place", token);
    }
    Reinsertion { text, mismatches }
}

/// Expand tokens referring to spans below `limit`, recursing into span
/// content (a header can hold a code-block token, for instance).
fn expand(
    text: &str,
    spans: &[StructuredSpan],
    limit: usize,
    mismatches: &mut Vec<String>,
) -> String {
    RE_PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let kind = StructureKind::from_tag(&caps[1]);
            let resolved = caps[2]
                .parse::<usize>()
                .ok()
                .filter(|&i| i < limit)
                .and_then(|i| spans.get(i).map(|span| (i, span)))
                .filter(|(_, span)| Some(span.kind) == kind);

            match resolved {
                Some((_, span)) if span.kind == StructureKind::Literal => span.content.clone(),
                Some((i, span)) => expand(&span.content, spans, i, mismatches),
                None => {
                    mismatches.push(caps[0].to_string());
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}
