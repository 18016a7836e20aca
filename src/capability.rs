//! The external text-to-text capability and its LLM-backed implementation.
//!
//! The pipeline only ever talks to a [`TransformCapability`]: one instruction
//! text in, one completion out. [`LlmCapability`] adapts any
//! `edgequake_llm::LLMProvider` to that shape; tests plug in scripted
//! implementations instead.

use crate::config::ConversionConfig;
use crate::error::{CapabilityError, Text2MdError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use tracing::debug;

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// One successful answer from the capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Completion {
    /// A completion with content only and no token accounting.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// A non-deterministic text transformation service.
#[async_trait]
pub trait TransformCapability: Send + Sync {
    /// Answer `instruction_text`, which already embeds the subject text.
    async fn complete(&self, instruction_text: &str) -> Result<Completion, CapabilityError>;
}

/// [`TransformCapability`] backed by an `edgequake_llm` provider.
pub struct LlmCapability {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmCapability {
    pub fn new(provider: Arc<dyn LLMProvider>, temperature: f32, max_tokens: usize) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(temperature),
                max_tokens: Some(max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl TransformCapability for LlmCapability {
    async fn complete(&self, instruction_text: &str) -> Result<Completion, CapabilityError> {
        let messages = vec![ChatMessage::user(instruction_text)];
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| CapabilityError::Provider(e.to_string()))?;

        debug!(
            "{} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(CapabilityError::EmptyResponse);
        }
        Ok(Completion {
            content: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Resolve the capability, from most-specific to least-specific:
///
/// 1. **Capability** (`config.capability`): used as-is.
/// 2. **Pre-built provider** (`config.provider`): wrapped in [`LlmCapability`].
/// 3. **Named provider + model** (`config.provider_name`).
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **OpenAI key** (`OPENAI_API_KEY`) with `config.model` or [`DEFAULT_MODEL`].
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_capability(
    config: &ConversionConfig,
) -> Result<Arc<dyn TransformCapability>, Text2MdError> {
    if let Some(ref capability) = config.capability {
        return Ok(Arc::clone(capability));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmCapability::new(
        provider,
        config.temperature,
        config.max_tokens,
    )))
}

fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Text2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // With several keys present, OpenAI wins unless another provider is named.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Text2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Text2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Text2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
