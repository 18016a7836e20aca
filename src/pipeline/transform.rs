//! Transformation client: one section through the external capability.
//!
//! Wraps a [`TransformCapability`] with caching, a per-call timeout,
//! retries with exponential backoff, and cancellation.
//!
//! ## Retry Strategy
//!
//! Every failure is retried the same way: provider errors, timeouts and
//! empty responses alike. After failed attempt `n` (1-based) that is not the
//! last, the client waits `retry_backoff_ms * 2^(n-1)`; with the default
//! 1000 ms base and 3 attempts that is 1 s then 2 s. A single wait never
//! exceeds [`MAX_BACKOFF_MS`]. There is no wait after the final attempt.

use crate::cancel::CancelToken;
use crate::capability::{Completion, TransformCapability};
use crate::error::{CapabilityError, SectionError};
use crate::pipeline::cache::{fingerprint, SectionCache};
use crate::pipeline::normalize::clean_model_output;
use crate::prompts::{instruction_text, InstructionKind};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// What one successful [`TransformClient::transform`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    /// Sanitized model output.
    pub content: String,
    /// Attempts made; 0 when served from cache.
    pub attempts: u32,
    pub cached: bool,
    pub duration_ms: u64,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Calls the capability for one section at a time. Cheap to clone.
#[derive(Clone)]
pub struct TransformClient {
    capability: Arc<dyn TransformCapability>,
    cache: Arc<dyn SectionCache>,
    max_attempts: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
    fingerprint_prefix_chars: usize,
    custom_instruction: Option<String>,
}

impl TransformClient {
    pub fn new(capability: Arc<dyn TransformCapability>, cache: Arc<dyn SectionCache>) -> Self {
        Self {
            capability,
            cache,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 120,
            fingerprint_prefix_chars: 1024,
            custom_instruction: None,
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.api_timeout_secs = secs;
        self
    }

    pub fn fingerprint_prefix_chars(mut self, n: usize) -> Self {
        self.fingerprint_prefix_chars = n;
        self
    }

    pub fn custom_instruction(mut self, instruction: Option<String>) -> Self {
        self.custom_instruction = instruction;
        self
    }

    /// Transform `section` with `kind`. `index` only labels logs and errors.
    ///
    /// The result is cached only on success. The suggestion kinds bypass
    /// [`clean_model_output`] so their raw shape reaches the parser.
    pub async fn transform(
        &self,
        section: &str,
        kind: InstructionKind,
        index: usize,
        cancel: &CancelToken,
    ) -> Result<TransformOutcome, SectionError> {
        let start = Instant::now();

        if cancel.is_cancelled() {
            return Err(SectionError::Cancelled { section: index });
        }

        let key = fingerprint(kind, section, self.fingerprint_prefix_chars);
        if let Some(content) = self.cache.get(&key) {
            debug!("Section {}: {} served from cache", index, kind);
            return Ok(TransformOutcome {
                content,
                attempts: 0,
                cached: true,
                duration_ms: start.elapsed().as_millis() as u64,
                input_tokens: 0,
                output_tokens: 0,
            });
        }

        let prompt = instruction_text(kind, section, self.custom_instruction.as_deref());
        let call_timeout = Duration::from_secs(self.api_timeout_secs);
        let mut last_err = CapabilityError::EmptyResponse;

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(SectionError::Cancelled { section: index });
            }

            let call = timeout(call_timeout, self.capability.complete(&prompt));
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SectionError::Cancelled { section: index }),
                r = call => r.unwrap_or(Err(CapabilityError::Timeout { secs: self.api_timeout_secs })),
            };

            match result.and_then(|c| self.sanitize(kind, c)) {
                Ok((content, input_tokens, output_tokens)) => {
                    debug!(
                        "Section {}: {} ok on attempt {} ({} in / {} out tokens)",
                        index, kind, attempt, input_tokens, output_tokens
                    );
                    self.cache.insert(key, content.clone());
                    return Ok(TransformOutcome {
                        content,
                        attempts: attempt,
                        cached: false,
                        duration_ms: start.elapsed().as_millis() as u64,
                        input_tokens,
                        output_tokens,
                    });
                }
                Err(e) => {
                    warn!(
                        "Section {}: {} attempt {}/{} failed: {}",
                        index, kind, attempt, self.max_attempts, e
                    );
                    last_err = e;
                }
            }

            if attempt < self.max_attempts {
                let backoff = backoff_delay(self.retry_backoff_ms, attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(SectionError::Cancelled { section: index }),
                    _ = sleep(backoff) => {}
                }
            }
        }

        Err(SectionError::TransformFailed {
            section: index,
            kind,
            attempts: self.max_attempts,
            detail: last_err.to_string(),
        })
    }

    fn sanitize(
        &self,
        kind: InstructionKind,
        completion: Completion,
    ) -> Result<(String, usize, usize), CapabilityError> {
        let content = match kind {
            InstructionKind::Convert | InstructionKind::Refine => {
                clean_model_output(&completion.content)
            }
            InstructionKind::SuggestTitles | InstructionKind::SuggestImprovements => {
                completion.content.trim().to_string()
            }
        };
        if content.is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok((content, completion.input_tokens, completion.output_tokens))
    }
}

/// Upper bound on a single retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Wait after failed attempt `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// saturating, capped at [`MAX_BACKOFF_MS`].
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64
        .checked_pow(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::{NoCache, TtlCache};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a script of results and records when each call arrived.
    struct Scripted {
        script: Mutex<VecDeque<Result<Completion, CapabilityError>>>,
        calls: AtomicUsize,
        call_times: Mutex<Vec<tokio::time::Instant>>,
    }

    impl Scripted {
        fn new(script: Vec<Result<Completion, CapabilityError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                call_times: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TransformCapability for Scripted {
        async fn complete(&self, _instruction_text: &str) -> Result<Completion, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.call_times
                .lock()
                .unwrap()
                .push(tokio::time::Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CapabilityError::Provider("script exhausted".into())))
        }
    }

    struct Hang;

    #[async_trait]
    impl TransformCapability for Hang {
        async fn complete(&self, _instruction_text: &str) -> Result<Completion, CapabilityError> {
            std::future::pending().await
        }
    }

    fn fail() -> Result<Completion, CapabilityError> {
        Err(CapabilityError::Provider("503".into()))
    }

    #[tokio::test]
    async fn cache_hit_skips_capability() {
        let cap = Scripted::new(vec![Ok(Completion::text("# Out"))]);
        let cache: Arc<dyn SectionCache> = Arc::new(TtlCache::default());
        let client = TransformClient::new(cap.clone(), cache);
        let cancel = CancelToken::new();

        let first = client
            .transform("text", InstructionKind::Convert, 0, &cancel)
            .await
            .unwrap();
        let second = client
            .transform("text", InstructionKind::Convert, 0, &cancel)
            .await
            .unwrap();

        assert_eq!(first.content, "# Out");
        assert!(!first.cached);
        assert_eq!(second.content, "# Out");
        assert!(second.cached);
        assert_eq!(cap.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_exhaust_with_exponential_backoff() {
        let cap = Scripted::new(vec![fail(), fail(), fail()]);
        let client = TransformClient::new(cap.clone(), Arc::new(NoCache));
        let cancel = CancelToken::new();

        let err = client
            .transform("text", InstructionKind::Convert, 4, &cancel)
            .await
            .unwrap_err();

        match err {
            SectionError::TransformFailed {
                section,
                attempts,
                detail,
                ..
            } => {
                assert_eq!(section, 4);
                assert_eq!(attempts, 3);
                assert!(detail.contains("503"));
            }
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(cap.calls.load(Ordering::SeqCst), 3);

        let times = cap.call_times.lock().unwrap().clone();
        assert_eq!(times[1] - times[0], Duration::from_millis(1000));
        assert_eq!(times[2] - times[1], Duration::from_millis(2000));
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(1000, 40), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(1, 200), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(0, 200), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn many_attempts_do_not_overflow_backoff() {
        let cap = Scripted::new(Vec::new());
        let client = TransformClient::new(cap.clone(), Arc::new(NoCache))
            .max_attempts(70)
            .retry_backoff_ms(0);

        let err = client
            .transform("text", InstructionKind::Convert, 0, &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, SectionError::TransformFailed { attempts: 70, .. }));
        assert_eq!(cap.calls.load(Ordering::SeqCst), 70);
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_failure_reports_attempts() {
        let cap = Scripted::new(vec![fail(), Ok(Completion::text("done"))]);
        let client = TransformClient::new(cap.clone(), Arc::new(NoCache));
        let out = client
            .transform("text", InstructionKind::Refine, 0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(out.content, "done");
        assert_eq!(out.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_response_is_retried() {
        let cap = Scripted::new(vec![Ok(Completion::text("  \n")), Ok(Completion::text("ok"))]);
        let client = TransformClient::new(cap.clone(), Arc::new(NoCache));
        let out = client
            .transform("text", InstructionKind::Convert, 0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(out.content, "ok");
        assert_eq!(cap.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let client = TransformClient::new(Arc::new(Hang), Arc::new(NoCache))
            .max_attempts(2)
            .api_timeout_secs(5);
        let err = client
            .transform("text", InstructionKind::Convert, 1, &CancelToken::new())
            .await
            .unwrap_err();
        match err {
            SectionError::TransformFailed { detail, attempts, .. } => {
                assert_eq!(attempts, 2);
                assert!(detail.contains("timed out"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_in_flight_call() {
        let client = TransformClient::new(Arc::new(Hang), Arc::new(NoCache));
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = client
            .transform("text", InstructionKind::Convert, 2, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SectionError::Cancelled { section: 2 }));
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_call() {
        let cap = Scripted::new(vec![Ok(Completion::text("x"))]);
        let client = TransformClient::new(cap.clone(), Arc::new(NoCache));
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = client
            .transform("text", InstructionKind::Convert, 0, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SectionError::Cancelled { .. }));
        assert_eq!(cap.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_fences_are_stripped() {
        let cap = Scripted::new(vec![Ok(Completion::text("```markdown\n# T\n```"))]);
        let client = TransformClient::new(cap, Arc::new(NoCache));
        let out = client
            .transform("t", InstructionKind::Convert, 0, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(out.content, "# T");
    }
}
