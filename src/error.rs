//! Error types for the edgequake-text2md library.
//!
//! Three layers of failure, from innermost to outermost:
//!
//! * [`CapabilityError`]: one call to the external model failed (provider
//!   error, timeout, empty response). Always retried by
//!   [`crate::pipeline::transform::TransformClient`].
//!
//! * [`SectionError`]: one section could not be transformed after all
//!   attempts, or was cancelled. Yielded item-by-item by
//!   [`crate::stream::convert_stream`].
//!
//! * [`Text2MdError`]: **Fatal**: the conversion as a whole failed. Any
//!   section failure aborts the entire document; there is no partially
//!   converted output.
//!
//! A placeholder that cannot be matched back to its structured span is not
//! an error at all: it is reported in
//! [`crate::pipeline::extract::Reinsertion::mismatches`] and logged.

use crate::prompts::InstructionKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-text2md library.
#[derive(Debug, Error)]
pub enum Text2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input text is missing, blank, or not valid UTF-8.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// A section could not be transformed after every attempt.
    #[error("{kind} failed for section {section} after {attempts} attempt(s): {detail}")]
    TransformationFailed {
        kind: InstructionKind,
        section: usize,
        attempts: u32,
        detail: String,
    },

    /// The conversion was cancelled before it completed.
    #[error("Conversion cancelled")]
    Cancelled,

    /// The model answered, but not in the shape the caller asked for.
    #[error("Unexpected response from the model: {detail}")]
    InvalidModelResponse { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure scoped to a single section.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// Every attempt failed; `detail` is the last underlying error.
    #[error("Section {section}: {kind} failed after {attempts} attempt(s): {detail}")]
    TransformFailed {
        section: usize,
        kind: InstructionKind,
        attempts: u32,
        detail: String,
    },

    /// The cancel signal fired while the section was pending or in flight.
    #[error("Section {section}: cancelled")]
    Cancelled { section: usize },
}

impl SectionError {
    /// Zero-based index of the section this error belongs to.
    pub fn section(&self) -> usize {
        match self {
            SectionError::TransformFailed { section, .. } => *section,
            SectionError::Cancelled { section } => *section,
        }
    }
}

impl From<SectionError> for Text2MdError {
    fn from(e: SectionError) -> Self {
        match e {
            SectionError::TransformFailed {
                section,
                kind,
                attempts,
                detail,
            } => Text2MdError::TransformationFailed {
                kind,
                section,
                attempts,
                detail,
            },
            SectionError::Cancelled { .. } => Text2MdError::Cancelled,
        }
    }
}

/// A single failed call to the external transformation capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The provider returned an error (network, rate limit, bad request…).
    #[error("provider error: {0}")]
    Provider(String),

    /// The call did not complete within the per-call timeout.
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with no content.
    #[error("empty response")]
    EmptyResponse,
}
