//! Eager (full-document) conversion entry points.
//!
//! [`Converter`] owns a resolved capability and a section cache and runs the
//! whole pipeline for one text at a time:
//!
//! ```text
//! validate ─▶ extract + reinsert ─▶ split ─▶ Convert ×N ─▶ join ─▶ normalize
//!                                                                   │
//!                                     (len > threshold) split ─▶ Refine ×N ─▶ join
//! ```
//!
//! Any section failure aborts the conversion: there is no partially
//! converted document. Use [`crate::stream::convert_stream`] to see
//! first-pass sections as they complete.

use crate::cancel::CancelToken;
use crate::capability::resolve_capability;
use crate::config::ConversionConfig;
use crate::error::Text2MdError;
use crate::output::{ConversionOutput, ConversionStats, SectionResult, StructureCounts};
use crate::pipeline::cache::{SectionCache, TtlCache};
use crate::pipeline::extract::{extract_structures, reinsert_structures};
use crate::pipeline::input;
use crate::pipeline::normalize::normalize_markdown;
use crate::pipeline::split::{split_into_sections, SectionBudget, PARAGRAPH_BREAK};
use crate::pipeline::transform::TransformClient;
use crate::progress::ProgressCallback;
use crate::prompts::InstructionKind;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Runs conversions against one capability and one cache.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Converter {
    config: ConversionConfig,
    client: TransformClient,
}

impl Converter {
    /// Resolve the capability and build the cache described by `config`.
    pub fn new(config: ConversionConfig) -> Result<Self, Text2MdError> {
        let capability = resolve_capability(&config)?;
        let cache: Arc<dyn SectionCache> = match config.cache {
            Some(ref cache) => Arc::clone(cache),
            None => Arc::new(TtlCache::new(
                Duration::from_secs(config.cache_ttl_secs),
                config.cache_capacity,
            )),
        };
        let client = TransformClient::new(capability, cache)
            .max_attempts(config.max_attempts)
            .retry_backoff_ms(config.retry_backoff_ms)
            .api_timeout_secs(config.api_timeout_secs)
            .fingerprint_prefix_chars(config.fingerprint_prefix_chars)
            .custom_instruction(config.custom_instruction.clone());
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// The transformation client, for callers that need single calls
    /// (see [`crate::assist`]).
    pub fn client(&self) -> &TransformClient {
        &self.client
    }

    /// Convert `raw` text to Markdown.
    pub async fn convert(&self, raw: &str) -> Result<ConversionOutput, Text2MdError> {
        self.convert_with_cancel(raw, &CancelToken::new()).await
    }

    /// Convert `raw`, giving up with [`Text2MdError::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn convert_with_cancel(
        &self,
        raw: &str,
        cancel: &CancelToken,
    ) -> Result<ConversionOutput, Text2MdError> {
        let total_start = Instant::now();
        let prepared = prepare(raw, self.config.section_budget)?;
        if cancel.is_cancelled() {
            return Err(Text2MdError::Cancelled);
        }

        let mut stats = ConversionStats {
            input_chars: raw.chars().count(),
            total_sections: prepared.sections.len(),
            structures: prepared.structures,
            unresolved_placeholders: prepared.unresolved_placeholders,
            ..Default::default()
        };
        info!(
            "Starting conversion: {} chars in {} section(s)",
            stats.input_chars, stats.total_sections
        );

        // ── Pass 1: convert ──────────────────────────────────────────────
        let convert_start = Instant::now();
        let sections = self
            .run_pass(prepared.sections, InstructionKind::Convert, cancel)
            .await?;
        stats.convert_duration_ms = convert_start.elapsed().as_millis() as u64;
        stats.add_pass(&sections);

        let normalized = normalize_markdown(&join_sections(&sections));

        // ── Pass 2: refine, only for long output ─────────────────────────
        let normalized_chars = normalized.chars().count();
        let (markdown, refinement) = if self.config.enable_refinement
            && normalized_chars > self.config.refine_threshold_chars
        {
            info!(
                "Output is {} chars (> {}); refining",
                normalized_chars, self.config.refine_threshold_chars
            );
            let refine_start = Instant::now();
            let pieces = split_into_sections(&normalized, self.config.section_budget);
            let refined = self
                .run_pass(pieces, InstructionKind::Refine, cancel)
                .await?;
            stats.refine_duration_ms = refine_start.elapsed().as_millis() as u64;
            stats.refined = true;
            stats.refined_sections = refined.len();
            stats.add_pass(&refined);
            (join_sections(&refined), refined)
        } else {
            (normalized, Vec::new())
        };

        stats.output_chars = markdown.chars().count();
        stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Conversion complete: {} -> {} chars, {} model call(s), {}ms",
            stats.input_chars, stats.output_chars, stats.total_attempts, stats.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_complete(markdown.len(), stats.refined);
        }

        Ok(ConversionOutput {
            markdown,
            sections,
            refinement,
            stats,
        })
    }

    /// Transform every section with `kind`, at most `concurrency` at a time,
    /// and return the results in section order.
    async fn run_pass(
        &self,
        sections: Vec<String>,
        kind: InstructionKind,
        cancel: &CancelToken,
    ) -> Result<Vec<SectionResult>, Text2MdError> {
        let total = sections.len();
        info!("{} pass: {} section(s)", kind, total);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_pass_start(kind, total);
        }

        let mut pending = stream::iter(sections.into_iter().enumerate().map(|(index, section)| {
            let client = self.client.clone();
            let cancel = cancel.clone();
            let progress = self.config.progress_callback.clone();
            async move {
                transform_section(&client, &section, kind, index, total, &cancel, progress).await
            }
        }))
        .buffer_unordered(self.config.concurrency);

        let mut slots: Vec<Option<SectionResult>> = vec![None; total];
        while let Some(result) = pending.next().await {
            // The first failure drops `pending`, and with it every in-flight call.
            let section = result?;
            let index = section.index;
            slots[index] = Some(section);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| Text2MdError::Internal(format!("section {i} produced no result")))
            })
            .collect()
    }
}

async fn transform_section(
    client: &TransformClient,
    section: &str,
    kind: InstructionKind,
    index: usize,
    total: usize,
    cancel: &CancelToken,
    progress: Option<ProgressCallback>,
) -> Result<SectionResult, Text2MdError> {
    if let Some(ref cb) = progress {
        cb.on_section_start(kind, index, total);
    }
    match client.transform(section, kind, index, cancel).await {
        Ok(outcome) => {
            let result = SectionResult::from_outcome(index, kind, outcome);
            debug!(
                "Section {}/{}: {} done ({} chars, cached: {})",
                index + 1,
                total,
                kind,
                result.markdown.len(),
                result.cached
            );
            if let Some(ref cb) = progress {
                cb.on_section_complete(kind, index, total, result.markdown.len());
            }
            Ok(result)
        }
        Err(e) => {
            if let Some(ref cb) = progress {
                cb.on_section_error(kind, index, total, &e.to_string());
            }
            Err(e.into())
        }
    }
}

/// Validated, structure-checked and split input.
pub(crate) struct Prepared {
    pub sections: Vec<String>,
    pub structures: StructureCounts,
    pub unresolved_placeholders: usize,
}

/// Validate `raw`, run extraction and reinsertion over the full text, then
/// split it into sections.
pub(crate) fn prepare(raw: &str, budget: SectionBudget) -> Result<Prepared, Text2MdError> {
    if raw.trim().is_empty() {
        return Err(Text2MdError::InvalidInput {
            reason: "text is empty".into(),
        });
    }

    let extraction = extract_structures(raw);
    let structures = StructureCounts::from(&extraction);
    let reinserted = reinsert_structures(&extraction.text, &extraction.spans);
    debug!(
        "Extracted {} structured span(s), {} unresolved",
        extraction.spans.len(),
        reinserted.mismatches.len()
    );

    Ok(Prepared {
        sections: split_into_sections(&reinserted.text, budget),
        structures,
        unresolved_placeholders: reinserted.mismatches.len(),
    })
}

/// Join section Markdown in order with a paragraph break.
pub(crate) fn join_sections(sections: &[SectionResult]) -> String {
    sections
        .iter()
        .map(|s| s.markdown.as_str())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_BREAK)
}

/// Convert raw text to Markdown with a fresh [`Converter`].
pub async fn convert_text(
    text: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2MdError> {
    Converter::new(config.clone())?.convert(text).await
}

/// Convert a text file, URL or `-` (stdin) to Markdown.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// - File not found / permission denied / download failure
/// - Blank or non-UTF-8 input
/// - Any section failing after every attempt
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2MdError> {
    let input_str = input_str.as_ref();
    info!("Reading input: {}", input_str);
    let text = input::read_input(input_str, config.download_timeout_secs).await?;
    convert_text(&text, config).await
}

/// Convert an input and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Text2MdError> {
    let output = convert(input_str, config).await?;
    write_markdown(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Write `markdown` to `path` atomically, creating parent directories.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<(), Text2MdError> {
    let write_err = |e: std::io::Error| Text2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Text2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Text2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_is_rejected() {
        for raw in ["", "   ", "\n\n\t"] {
            let err = prepare(raw, SectionBudget::default()).err().unwrap();
            assert!(matches!(err, Text2MdError::InvalidInput { .. }));
        }
    }

    #[test]
    fn prepare_counts_structures_and_keeps_text() {
        let raw = "# Title\n\nSome text.\n\n- item one\n- item two";
        let prepared = prepare(raw, SectionBudget::default()).unwrap();
        assert_eq!(prepared.sections, vec![raw.to_string()]);
        assert_eq!(prepared.structures.headers, 1);
        assert_eq!(prepared.structures.list_items, 2);
        assert_eq!(prepared.unresolved_placeholders, 0);
    }

    #[test]
    fn literal_placeholder_in_input_is_kept() {
        let input = "# Title\n\nThe syntax {{HEADER:0}} is used by our template engine.";
        let prepared = prepare(input, SectionBudget::default()).unwrap();
        assert_eq!(prepared.unresolved_placeholders, 0);
        assert_eq!(prepared.sections, vec![input.to_string()]);
        assert_eq!(prepared.structures.headers, 1);
    }

    #[tokio::test]
    async fn write_markdown_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.md");
        write_markdown(&path, "# Hi\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Hi\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
