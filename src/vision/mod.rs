//! Vision extraction: one image plus one instruction in, transcribed text out.
//!
//! The extractor only ever sees the [`VisionEngine`] trait, so tests swap in
//! a deterministic fake and production code picks a backend:
//!
//! * [`HttpVisionEngine`]: any OpenAI-compatible `/chat/completions` endpoint
//!   (Ollama, vLLM, LiteLLM, OpenAI itself) with optional bearer auth.
//! * [`ProviderVisionEngine`]: any `edgequake_llm` provider, for users who
//!   already configure OpenAI / Anthropic / Gemini keys for that stack.
//!
//! Engines return the model's raw text; Markdown clean-up happens in
//! [`crate::pipeline::postprocess`].

pub mod http;
pub mod provider;

pub use http::HttpVisionEngine;
pub use provider::ProviderVisionEngine;

use crate::error::InferenceError;
use crate::output::RasterImage;
use async_trait::async_trait;
use std::sync::Arc;

/// A capability that transcribes an image according to an instruction.
#[async_trait]
pub trait VisionEngine: Send + Sync {
    /// Send one image with one instruction and return the generated text.
    async fn infer(&self, image: &RasterImage, prompt: &str) -> Result<String, InferenceError>;

    /// Short label used in logs.
    fn name(&self) -> &str {
        "vision"
    }
}

/// Shared handle stored by the extractor.
pub type SharedVisionEngine = Arc<dyn VisionEngine>;
