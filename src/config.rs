//! Configuration types for text-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! config can be shared across tasks and logged as a whole.

use crate::capability::TransformCapability;
use crate::error::Text2MdError;
use crate::pipeline::cache::SectionCache;
use crate::pipeline::split::SectionBudget;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Smallest accepted section budget, in the budget's own unit.
pub const MIN_SECTION_BUDGET: usize = 2;

/// Configuration for a text-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_text2md::{ConversionConfig, SectionBudget};
///
/// let config = ConversionConfig::builder()
///     .section_budget(SectionBudget::Tokens(4000))
///     .concurrency(8)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 8);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Size limit of one section. Default: `Tokens(8000)`.
    ///
    /// Larger sections give the model more context per call but take longer
    /// and fail more expensively; smaller ones parallelise better.
    pub section_budget: SectionBudget,

    /// Run the refinement pass when the normalized first-pass output is
    /// longer than this many chars. Default: 10 000.
    pub refine_threshold_chars: usize,

    /// Allow the refinement pass at all. Default: true.
    pub enable_refinement: bool,

    /// Number of concurrent model calls. Default: 5.
    ///
    /// Calls are network-bound; lower this if the provider starts answering
    /// with rate-limit errors.
    pub concurrency: usize,

    /// Attempts per section before the conversion fails. Default: 3.
    pub max_attempts: u32,

    /// Base retry delay in milliseconds, doubled after each failed attempt.
    /// Default: 1000.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Time-to-live of a cached section in seconds. Default: 600.
    pub cache_ttl_secs: u64,

    /// Maximum number of cached sections. Default: 1024.
    pub cache_capacity: usize,

    /// Chars of a section that feed its cache fingerprint. Default: 1024.
    pub fingerprint_prefix_chars: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed capability. Takes precedence over every provider setting.
    pub capability: Option<Arc<dyn TransformCapability>>,

    /// Shared section cache. If None, each converter builds its own `TtlCache`.
    pub cache: Option<Arc<dyn SectionCache>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    pub max_tokens: usize,

    /// Replaces the built-in conversion instructions. Refinement is unaffected.
    pub custom_instruction: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives section-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            section_budget: SectionBudget::default(),
            refine_threshold_chars: 10_000,
            enable_refinement: true,
            concurrency: 5,
            max_attempts: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 120,
            cache_ttl_secs: 600,
            cache_capacity: 1024,
            fingerprint_prefix_chars: 1024,
            model: None,
            provider_name: None,
            provider: None,
            capability: None,
            cache: None,
            temperature: 0.1,
            max_tokens: 8192,
            custom_instruction: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("section_budget", &self.section_budget)
            .field("refine_threshold_chars", &self.refine_threshold_chars)
            .field("enable_refinement", &self.enable_refinement)
            .field("concurrency", &self.concurrency)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "capability",
                &self.capability.as_ref().map(|_| "<dyn TransformCapability>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn section_budget(mut self, budget: SectionBudget) -> Self {
        self.config.section_budget = budget;
        self
    }

    pub fn refine_threshold_chars(mut self, n: usize) -> Self {
        self.config.refine_threshold_chars = n;
        self
    }

    pub fn enable_refinement(mut self, v: bool) -> Self {
        self.config.enable_refinement = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n;
        self
    }

    pub fn fingerprint_prefix_chars(mut self, n: usize) -> Self {
        self.config.fingerprint_prefix_chars = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn capability(mut self, capability: Arc<dyn TransformCapability>) -> Self {
        self.config.capability = Some(capability);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn SectionCache>) -> Self {
        self.config.cache = Some(cache);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn custom_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.custom_instruction = Some(instruction.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Text2MdError> {
        let c = &self.config;
        if c.section_budget.limit() < MIN_SECTION_BUDGET {
            return Err(Text2MdError::InvalidConfig(format!(
                "Section budget must be ≥ {}, got {:?}",
                MIN_SECTION_BUDGET, c.section_budget
            )));
        }
        if c.concurrency == 0 {
            return Err(Text2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_attempts == 0 {
            return Err(Text2MdError::InvalidConfig(
                "Max attempts must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Text2MdError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Text2MdError::InvalidConfig(
                "Max tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
