//! OpenAI-compatible HTTP vision engine.
//!
//! ## Request
//!
//! ```text
//! POST {endpoint}/chat/completions
//! Authorization: Bearer <api_key>        (only when configured)
//! {
//!   "model": "...",
//!   "messages": [{ "role": "user", "content": [
//!       { "type": "text", "text": "<prompt>" },
//!       { "type": "image_url", "image_url": { "url": "data:image/png;base64,..." } }
//!   ]}],
//!   "max_tokens": 4096
//! }
//! ```
//!
//! `{endpoint}` already ends in `/v1`; see [`crate::config::normalize_endpoint`].
//!
//! The text of `choices[0].message.content` is returned. Anything else (a
//! transport error, a timeout, a non-2xx status, a body without text) is an
//! [`InferenceError`]. At most one retry is made, only for transient transport
//! failures, and only when [`VisionConfig::retry_transient`] is set.

use super::VisionEngine;
use crate::config::VisionConfig;
use crate::error::InferenceError;
use crate::output::RasterImage;
use crate::pipeline::encode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Delay before the single transient-failure retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Vision engine speaking the chat-completions wire format over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpVisionEngine {
    client: reqwest::Client,
    config: VisionConfig,
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl HttpVisionEngine {
    /// Build an engine. The HTTP client carries the per-call timeout.
    pub fn new(config: VisionConfig) -> Result<Self, InferenceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InferenceError::Transport {
                endpoint: config.endpoint.clone(),
                detail: format!("could not build HTTP client: {e}"),
            })?;
        let url = config.completions_url();
        Ok(Self { client, config, url })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, InferenceError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| self.map_transport(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport(e))?;
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate(&text, 500),
            });
        }

        parse_response(&text)
    }

    fn map_transport(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                secs: self.config.timeout_secs,
            }
        } else {
            InferenceError::Transport {
                endpoint: self.url.clone(),
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl VisionEngine for HttpVisionEngine {
    async fn infer(&self, image: &RasterImage, prompt: &str) -> Result<String, InferenceError> {
        let body = build_request(&self.config, image, prompt)?;
        let start = Instant::now();

        let attempts = if self.config.retry_transient { 2 } else { 1 };
        let mut last_err = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            match self.send_once(&body).await {
                Ok(text) => {
                    debug!(
                        "{}: {} chars from {} in {:?}",
                        self.config.model,
                        text.len(),
                        self.url,
                        start.elapsed()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    warn!("Vision call failed ({}), retrying once", e);
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(InferenceError::EmptyResponse))
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Serialise the chat-completions body for one image.
fn build_request(
    config: &VisionConfig,
    image: &RasterImage,
    prompt: &str,
) -> Result<serde_json::Value, InferenceError> {
    let request = ChatRequest {
        model: &config.model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: encode::to_data_url(image),
                    },
                },
            ],
        }],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
    };
    serde_json::to_value(&request).map_err(|e| InferenceError::Encoding(e.to_string()))
}

/// Pull the generated text out of a chat-completions body.
fn parse_response(body: &str) -> Result<String, InferenceError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

    if let Some(err) = parsed.error {
        return Err(InferenceError::MalformedResponse(err.message));
    }

    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(content)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}…")
    }
}
