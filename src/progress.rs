//! Progress-callback trait for per-section conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline transforms each section. Callers can forward them
//! to a channel, a WebSocket or a terminal progress bar; the library does
//! not care.
//!
//! # Example
//!
//! ```rust
//! use edgequake_text2md::{ConversionProgressCallback, ConversionConfig, InstructionKind};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, kind: InstructionKind, index: usize, total: usize, len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{kind} {}/{} done ({} bytes)", index + 1, total, len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::prompts::InstructionKind;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each section.
///
/// Sections run concurrently, so the per-section methods may be called from
/// different threads at once. All methods default to no-ops.
///
/// Section indices are zero-based; `kind` says which pass (conversion or
/// refinement) the event belongs to.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once per pass, before any section of that pass is sent.
    fn on_pass_start(&self, kind: InstructionKind, total_sections: usize) {
        let _ = (kind, total_sections);
    }

    /// Called just before a section is handed to the model.
    fn on_section_start(&self, kind: InstructionKind, index: usize, total: usize) {
        let _ = (kind, index, total);
    }

    /// Called when a section is transformed.
    ///
    /// `markdown_len` is the byte length of the produced Markdown.
    fn on_section_complete(
        &self,
        kind: InstructionKind,
        index: usize,
        total: usize,
        markdown_len: usize,
    ) {
        let _ = (kind, index, total, markdown_len);
    }

    /// Called when a section fails after every attempt, or is cancelled.
    fn on_section_error(&self, kind: InstructionKind, index: usize, total: usize, error: &str) {
        let _ = (kind, index, total, error);
    }

    /// Called once when the final Markdown is ready.
    fn on_conversion_complete(&self, markdown_len: usize, refined: bool) {
        let _ = (markdown_len, refined);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        passes: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_pass_start(&self, _kind: InstructionKind, _total: usize) {
            self.passes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_start(&self, _kind: InstructionKind, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _kind: InstructionKind, _i: usize, _t: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_error(&self, _kind: InstructionKind, _i: usize, _t: usize, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_pass_start(InstructionKind::Convert, 3);
        cb.on_section_start(InstructionKind::Convert, 0, 3);
        cb.on_section_complete(InstructionKind::Convert, 0, 3, 42);
        cb.on_section_error(InstructionKind::Refine, 1, 3, "boom");
        cb.on_conversion_complete(100, false);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_pass_start(InstructionKind::Convert, 2);
        tracker.on_section_start(InstructionKind::Convert, 0, 2);
        tracker.on_section_complete(InstructionKind::Convert, 0, 2, 10);
        tracker.on_section_start(InstructionKind::Convert, 1, 2);
        tracker.on_section_error(InstructionKind::Convert, 1, 2, "timeout");

        assert_eq!(tracker.passes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
