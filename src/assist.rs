//! Title and improvement suggestions for an already-converted document.
//!
//! Both are single model calls through the same [`TransformClient`] the
//! pipeline uses, so they share its cache, retries and timeout.

use crate::cancel::CancelToken;
use crate::error::Text2MdError;
use crate::pipeline::transform::TransformClient;
use crate::prompts::{InstructionKind, TITLE_CONTEXT_CHARS};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Most titles returned by [`suggest_titles`].
pub const MAX_TITLES: usize = 5;

static RE_LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+[.)]|[-*+•])\s+").unwrap());

static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*|\s*```").unwrap());

/// Ask for up to [`MAX_TITLES`] titles based on the start of `markdown`.
pub async fn suggest_titles(
    client: &TransformClient,
    markdown: &str,
) -> Result<Vec<String>, Text2MdError> {
    let context = leading_chars(require_text(markdown)?, TITLE_CONTEXT_CHARS);
    let outcome = client
        .transform(context, InstructionKind::SuggestTitles, 0, &CancelToken::new())
        .await?;
    let titles = parse_titles(&outcome.content);
    debug!("{} title suggestion(s)", titles.len());
    Ok(titles)
}

/// Ask for improvement suggestions for `markdown`.
///
/// The model must answer with a JSON array of strings, optionally fenced;
/// anything else is [`Text2MdError::InvalidModelResponse`].
pub async fn suggest_improvements(
    client: &TransformClient,
    markdown: &str,
) -> Result<Vec<String>, Text2MdError> {
    let markdown = require_text(markdown)?;
    let outcome = client
        .transform(
            markdown,
            InstructionKind::SuggestImprovements,
            0,
            &CancelToken::new(),
        )
        .await?;
    parse_suggestions(&outcome.content)
}

fn require_text(markdown: &str) -> Result<&str, Text2MdError> {
    if markdown.trim().is_empty() {
        return Err(Text2MdError::InvalidInput {
            reason: "markdown is empty".into(),
        });
    }
    Ok(markdown)
}

fn leading_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// One title per non-empty line, list markers and quotes stripped.
pub fn parse_titles(raw: &str) -> Vec<String> {
    raw.lines()
        .map(|line| {
            let line = RE_LIST_MARKER.replace(line.trim(), "");
            line.trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
                .trim()
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .take(MAX_TITLES)
        .collect()
}

/// Parse a JSON array of strings, ignoring ```` ```json ```` fences.
pub fn parse_suggestions(raw: &str) -> Result<Vec<String>, Text2MdError> {
    let cleaned = RE_JSON_FENCE.replace_all(raw, "");
    serde_json::from_str::<Vec<String>>(cleaned.trim()).map_err(|e| {
        Text2MdError::InvalidModelResponse {
            detail: format!("expected a JSON array of strings: {e}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Completion, TransformCapability};
    use crate::error::CapabilityError;
    use crate::pipeline::cache::NoCache;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct Fixed {
        answer: &'static str,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TransformCapability for Fixed {
        async fn complete(&self, instruction_text: &str) -> Result<Completion, CapabilityError> {
            self.seen.lock().unwrap().push(instruction_text.to_string());
            Ok(Completion::text(self.answer))
        }
    }

    fn client(answer: &'static str) -> (TransformClient, Arc<Fixed>) {
        let cap = Arc::new(Fixed {
            answer,
            seen: Mutex::new(Vec::new()),
        });
        (TransformClient::new(cap.clone(), Arc::new(NoCache)), cap)
    }

    #[test]
    fn titles_strip_markers_and_quotes() {
        let titles = parse_titles("1. \"First\"\n\n2) Second\n- **Third**\nFourth\n5. Fifth\n6. Sixth");
        assert_eq!(titles, vec!["First", "Second", "Third", "Fourth", "Fifth"]);
    }

    #[test]
    fn suggestions_accept_fenced_json() {
        let parsed = parse_suggestions("```json\n[\"Add intro\", \"Split long section\"]\n```").unwrap();
        assert_eq!(parsed, vec!["Add intro", "Split long section"]);
    }

    #[test]
    fn suggestions_reject_non_string_arrays() {
        let err = parse_suggestions("[1, 2]").unwrap_err();
        assert!(matches!(err, Text2MdError::InvalidModelResponse { .. }));
        assert!(parse_suggestions("not json").is_err());
    }

    #[tokio::test]
    async fn titles_use_only_leading_context() {
        let (client, cap) = client("A title");
        let markdown = format!("# Head\n{}", "x".repeat(5000));
        let titles = suggest_titles(&client, &markdown).await.unwrap();
        assert_eq!(titles, vec!["A title"]);

        let prompt = cap.seen.lock().unwrap()[0].clone();
        assert!(prompt.contains("# Head"));
        assert!(!prompt.contains(&"x".repeat(TITLE_CONTEXT_CHARS)));
    }

    #[tokio::test]
    async fn improvements_round_trip() {
        let (client, _) = client("[\"Use more headers\"]");
        let suggestions = suggest_improvements(&client, "# Doc\n\nbody").await.unwrap();
        assert_eq!(suggestions, vec!["Use more headers"]);
    }

    #[tokio::test]
    async fn empty_markdown_is_invalid_input() {
        let (client, cap) = client("unused");
        let err = suggest_titles(&client, "  ").await.unwrap_err();
        assert!(matches!(err, Text2MdError::InvalidInput { .. }));
        assert!(cap.seen.lock().unwrap().is_empty());
    }
}
