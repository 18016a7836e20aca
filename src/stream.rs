//! Streaming conversion API: emit sections as they complete.
//!
//! Unlike the eager [`crate::convert::convert`], which returns only after
//! every section (and the optional refinement pass) finishes,
//! [`convert_stream`] yields first-pass [`SectionResult`]s as each one
//! completes. Sections arrive in completion order; every item carries its
//! index, and [`assemble_sections`] puts them back in document order.
//!
//! The stream never runs the refinement pass. A failed section is yielded
//! as an `Err` item; the remaining sections keep going, and the caller
//! decides whether to stop polling.

use crate::cancel::CancelToken;
use crate::config::ConversionConfig;
use crate::convert::{join_sections, prepare, Converter};
use crate::error::{SectionError, Text2MdError};
use crate::output::SectionResult;
use crate::pipeline::input;
use crate::pipeline::normalize::normalize_markdown;
use crate::prompts::InstructionKind;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of section results.
pub type SectionStream = Pin<Box<dyn Stream<Item = Result<SectionResult, SectionError>> + Send>>;

impl Converter {
    /// Stream the first pass over `raw`, at most `concurrency` sections in
    /// flight. Cancelling `cancel` turns every unfinished section into
    /// [`SectionError::Cancelled`].
    pub fn stream_text(&self, raw: &str, cancel: CancelToken) -> Result<SectionStream, Text2MdError> {
        let prepared = prepare(raw, self.config().section_budget)?;
        info!(
            "Starting streaming conversion: {} section(s)",
            prepared.sections.len()
        );

        let client = self.client().clone();
        let s = stream::iter(prepared.sections.into_iter().enumerate().map(
            move |(index, section)| {
                let client = client.clone();
                let cancel = cancel.clone();
                async move {
                    client
                        .transform(&section, InstructionKind::Convert, index, &cancel)
                        .await
                        .map(|outcome| {
                            SectionResult::from_outcome(index, InstructionKind::Convert, outcome)
                        })
                }
            },
        ))
        .buffer_unordered(self.config().concurrency);

        Ok(Box::pin(s))
    }
}

/// Convert a text file, URL or `-` (stdin), streaming sections as they are ready.
///
/// # Returns
/// - `Ok(SectionStream)`: a stream of `Result<SectionResult, SectionError>`
/// - `Err(Text2MdError)`: fatal error before any section ran (bad input,
///   provider not configured, …)
///
/// # Example
/// ```rust,no_run
/// use edgequake_text2md::{assemble_sections, convert_stream, ConversionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::default();
/// let mut stream = convert_stream("notes.txt", &config).await?;
/// let mut done = Vec::new();
/// while let Some(section) = stream.next().await {
///     let section = section?;
///     eprintln!("section {} ready", section.index);
///     done.push(section);
/// }
/// println!("{}", assemble_sections(done));
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<SectionStream, Text2MdError> {
    let text = input::read_input(input_str.as_ref(), config.download_timeout_secs).await?;
    Converter::new(config.clone())?.stream_text(&text, CancelToken::new())
}

/// Put streamed sections back in document order, join them and normalize.
///
/// Produces the same text as the eager first pass.
pub fn assemble_sections(mut sections: Vec<SectionResult>) -> String {
    sections.sort_by_key(|s| s.index);
    normalize_markdown(&join_sections(&sections))
}
