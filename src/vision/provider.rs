//! Vision engine backed by an `edgequake_llm` provider.
//!
//! Lets the pipeline use whatever provider the `edgequake_llm` factory can
//! build (OpenAI, Anthropic, Gemini, Mistral, Ollama, Azure…) instead of a
//! raw chat-completions endpoint. The prompt and the image travel in a single
//! user message; the call is bounded by the same per-call timeout as the HTTP
//! engine.

use super::VisionEngine;
use crate::error::InferenceError;
use crate::output::RasterImage;
use crate::pipeline::encode;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Wraps an `Arc<dyn LLMProvider>` as a [`VisionEngine`].
pub struct ProviderVisionEngine {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout_secs: u64,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl ProviderVisionEngine {
    /// Wrap an already-configured provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            provider,
            label: label.into(),
            timeout_secs: timeout_secs.max(1),
            max_tokens: 4096,
            temperature: Some(0.1),
        }
    }

    /// Build a named provider (`openai`, `anthropic`, `gemini`, …) for `model`.
    ///
    /// The factory reads the matching API key from the environment; this is
    /// the only place the library defers to it.
    pub fn from_name(provider_name: &str, model: &str, timeout_secs: u64) -> Result<Self, InferenceError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model)
            .map_err(|e| InferenceError::Provider(format!("{provider_name}: {e}")))?;
        Ok(Self::new(provider, format!("{provider_name}/{model}"), timeout_secs))
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.max_tokens = n.max(1);
        self
    }

    pub fn temperature(mut self, t: Option<f32>) -> Self {
        self.temperature = t;
        self
    }
}

/// Build `CompletionOptions` for one transcription call.
fn build_options(max_tokens: usize, temperature: Option<f32>) -> CompletionOptions {
    CompletionOptions {
        temperature,
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl VisionEngine for ProviderVisionEngine {
    async fn infer(&self, image: &RasterImage, prompt: &str) -> Result<String, InferenceError> {
        let image_data = ImageData::new(encode::to_base64(image), image.mime_type);
        let messages = vec![ChatMessage::user_with_images(prompt, vec![image_data])];
        let options = build_options(self.max_tokens, self.temperature);

        let response = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| InferenceError::Timeout {
            secs: self.timeout_secs,
        })?
        .map_err(|e| InferenceError::Provider(e.to_string()))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        if response.content.trim().is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(response.content)
    }

    fn name(&self) -> &str {
        &self.label
    }
}
