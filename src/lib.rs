//! # edgequake-text2md
//!
//! Turn unstructured plain text into well-structured Markdown using LLMs.
//!
//! ## Why this crate?
//!
//! Notes, transcripts and copy-pasted documents carry structure that a model
//! can recover (headers, lists, emphasis) but a naive "send the whole file"
//! approach breaks down on long inputs and mangles code. This crate protects
//! code blocks, headers and list items before the model sees the text, splits
//! the rest into budget-sized sections, transforms them concurrently with
//! retries, a per-call timeout and a result cache, then reassembles and
//! normalises the result. Long documents get a second, refining pass.
//!
//! ## Pipeline Overview
//!
//! ```text
//! text
//!  │
//!  ├─ 1. Input     local file, URL or stdin
//!  ├─ 2. Extract   protect code / headers / list items behind placeholders
//!  ├─ 3. Split     paragraph-aware sections under a token or char budget
//!  ├─ 4. Convert   concurrent model calls (cache, retry, timeout, cancel)
//!  ├─ 5. Join      reassemble in document order, normalise
//!  ├─ 6. Refine    optional second pass for long documents
//!  └─ 7. Output    Markdown + per-section stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_text2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ConversionConfig::default();
//!     let output = convert("notes.txt", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} sections, refined: {}",
//!         output.stats.total_sections,
//!         output.stats.refined);
//!     Ok(())
//! }
//! ```
//!
//! Any backend can stand in for the LLM by implementing
//! [`TransformCapability`] and passing it through
//! [`ConversionConfigBuilder::capability`].
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | via cli | HTTP service ([`server::router`], axum) |
//! | `cli`    | on      | The `text2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable defaults when using only the library:
//! ```toml
//! edgequake-text2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assist;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assist::{suggest_improvements, suggest_titles};
pub use cancel::CancelToken;
pub use capability::{Completion, LlmCapability, TransformCapability};
pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, convert_text, convert_to_file, write_markdown, Converter};
pub use error::{CapabilityError, SectionError, Text2MdError};
pub use output::{ConversionOutput, ConversionStats, SectionResult, StructureCounts};
pub use pipeline::cache::{NoCache, SectionCache, TtlCache};
pub use pipeline::split::SectionBudget;
pub use pipeline::transform::TransformClient;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::InstructionKind;
pub use stream::{assemble_sections, convert_stream, SectionStream};
