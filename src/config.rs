//! Configuration types for batch document conversion.
//!
//! Every knob the pipeline reads lives in one of two structs, both passed in
//! at construction time:
//!
//! * [`PipelineConfig`]: strategy thresholds, rendering scale, page
//!   separator, failure tolerance, packaging and concurrency.
//! * [`VisionConfig`]: how to reach the vision inference endpoint.
//!
//! Nothing in the core reads the process environment. The `doc2md` binary
//! maps flags (with `env` fallbacks) onto these builders.

use crate::error::Doc2MdError;
use crate::output::ExtractionMode;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for one batch pipeline.
///
/// # Example
/// ```rust
/// use edgequake_doc2md::{ConversionMode, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .render_scale(2.0)
///     .mode(ConversionMode::Auto)
///     .max_failed_page_ratio(0.5)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Heuristic thresholds for the per-page strategy selector.
    pub thresholds: StrategyThresholds,

    /// Batch-wide override of the per-page strategy. Default: [`ConversionMode::Auto`].
    pub mode: ConversionMode,

    /// Zoom factor used when rasterising a page for the vision engine. Range: 0.5–6.0. Default: 2.0.
    ///
    /// 1.0 renders at 72 DPI; 2.0 gives ~144 DPI, which keeps body text legible
    /// for vision models without producing oversized uploads.
    pub render_scale: f32,

    /// Separator inserted between page outputs. Default: horizontal rule.
    pub page_separator: PageSeparator,

    /// Instruction sent with every image. If None, uses [`crate::prompts::DEFAULT_EXTRACTION_PROMPT`].
    pub extraction_prompt: Option<String>,

    /// Fraction of failed pages above which the whole document fails. Default: None.
    ///
    /// With `None` a document only fails when every page failed.
    pub max_failed_page_ratio: Option<f32>,

    /// Deflate level for multi-file archives, 1-9; 0 stores entries uncompressed. Default: 9.
    pub compression_level: u8,

    /// Number of uploads converted at once. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// Number of pages of one document converted at once. Default: 1.
    pub page_concurrency: usize,

    /// Optional progress callback for per-item and per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            thresholds: StrategyThresholds::default(),
            mode: ConversionMode::default(),
            render_scale: 2.0,
            page_separator: PageSeparator::default(),
            extraction_prompt: None,
            max_failed_page_ratio: None,
            compression_level: 9,
            concurrency: 1,
            page_concurrency: 1,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("thresholds", &self.thresholds)
            .field("mode", &self.mode)
            .field("render_scale", &self.render_scale)
            .field("page_separator", &self.page_separator)
            .field("extraction_prompt", &self.extraction_prompt.as_ref().map(|p| p.len()))
            .field("max_failed_page_ratio", &self.max_failed_page_ratio)
            .field("compression_level", &self.compression_level)
            .field("concurrency", &self.concurrency)
            .field("page_concurrency", &self.page_concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The prompt actually sent to the vision engine.
    pub fn prompt(&self) -> &str {
        self.extraction_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(crate::prompts::DEFAULT_EXTRACTION_PROMPT)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn thresholds(mut self, thresholds: StrategyThresholds) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    pub fn mode(mut self, mode: ConversionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn max_failed_page_ratio(mut self, ratio: f32) -> Self {
        self.config.max_failed_page_ratio = Some(ratio);
        self
    }

    pub fn compression_level(mut self, level: u8) -> Self {
        self.config.compression_level = level.min(9);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Doc2MdError> {
        let c = &self.config;
        if !(0.5..=6.0).contains(&c.render_scale) {
            return Err(Doc2MdError::InvalidConfig(format!(
                "render scale must be 0.5–6.0, got {}",
                c.render_scale
            )));
        }
        if let Some(ratio) = c.max_failed_page_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(Doc2MdError::InvalidConfig(format!(
                    "max failed page ratio must be 0.0–1.0, got {}",
                    ratio
                )));
            }
        }
        c.thresholds.validate()?;
        Ok(self.config)
    }
}

// ── Strategy thresholds ──────────────────────────────────────────────────

/// Tunable thresholds for [`crate::strategy::StrategySelector`].
///
/// | Signal | Vision when | Default |
/// |--------|-------------|---------|
/// | `text_density` (chars / in²) | strictly below `min_text_density` | 0.5 |
/// | `image_area_ratio` | strictly above `max_image_area_ratio` | 0.10 |
/// | `table_likelihood` | strictly above `table_likelihood_threshold` | 0.5 |
///
/// 0.5 characters per square inch is roughly 50 characters on a Letter page,
/// the point below which a page is almost certainly a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyThresholds {
    pub min_text_density: f32,
    pub max_image_area_ratio: f32,
    pub table_likelihood_threshold: f32,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            min_text_density: 0.5,
            max_image_area_ratio: 0.10,
            table_likelihood_threshold: 0.5,
        }
    }
}

impl StrategyThresholds {
    fn validate(&self) -> Result<(), Doc2MdError> {
        if !self.min_text_density.is_finite() || self.min_text_density < 0.0 {
            return Err(Doc2MdError::InvalidConfig(format!(
                "min text density must be a non-negative number, got {}",
                self.min_text_density
            )));
        }
        for (name, v) in [
            ("max image area ratio", self.max_image_area_ratio),
            ("table likelihood threshold", self.table_likelihood_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Doc2MdError::InvalidConfig(format!(
                    "{name} must be 0.0–1.0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Batch-wide extraction policy for paginated documents.
///
/// `Auto` lets the strategy selector decide per page. `Vision` and `Native`
/// are explicit overrides: they skip the heuristic for every page, which is
/// how a user recovers from a page the heuristic misjudged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionMode {
    /// Per-page heuristic (default).
    #[default]
    Auto,
    /// Send every page to the vision engine.
    Vision,
    /// Use only the embedded text layer.
    Native,
}

impl ConversionMode {
    /// The per-page override this mode implies.
    pub fn page_override(self) -> Option<ExtractionMode> {
        match self {
            ConversionMode::Auto => None,
            ConversionMode::Vision => Some(ExtractionMode::Vision),
            ConversionMode::Native => Some(ExtractionMode::Native),
        }
    }

    /// Parse the user-facing names; `ocr` is accepted for `Vision`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(ConversionMode::Auto),
            "vision" | "ocr" => Some(ConversionMode::Vision),
            "native" => Some(ConversionMode::Native),
            _ => None,
        }
    }
}

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No marker; pages joined with "\n\n".
    None,
    /// Horizontal rule: "\n\n---\n\n" (default)
    #[default]
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s.replace("{page}", &page_num.to_string())),
        }
    }
}

// ── Vision endpoint ──────────────────────────────────────────────────────

/// How to reach an OpenAI-compatible vision endpoint.
#[derive(Clone)]
pub struct VisionConfig {
    /// Base URL, normalised to end in `/v1`. Default: `http://localhost:11434/v1` (Ollama).
    pub endpoint: String,

    /// Model identifier. Default: `qwen2.5vl:latest`.
    pub model: String,

    /// Bearer token; omitted from the request when None.
    pub api_key: Option<String>,

    /// Per-call timeout in seconds. Default: 120.
    ///
    /// Bounds one call only. A batch's wall-clock time is the sum of its calls.
    pub timeout_secs: u64,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: u32,

    /// Sampling temperature; omitted from the request when None.
    pub temperature: Option<f32>,

    /// Retry once on a transient transport failure. Default: false.
    pub retry_transient: bool,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5vl:latest".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: None,
            retry_transient: false,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("retry_transient", &self.retry_transient)
            .finish()
    }
}

impl VisionConfig {
    /// Create a new builder for `VisionConfig`.
    pub fn builder() -> VisionConfigBuilder {
        VisionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the chat-completions route.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", normalize_endpoint(&self.endpoint))
    }
}

/// Ensure the endpoint ends in exactly one `/v1`.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

/// Builder for [`VisionConfig`].
#[derive(Debug)]
pub struct VisionConfigBuilder {
    config: VisionConfig,
}

impl VisionConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn retry_transient(mut self, v: bool) -> Self {
        self.config.retry_transient = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<VisionConfig, Doc2MdError> {
        let c = &self.config;
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(Doc2MdError::InvalidConfig(format!(
                "vision endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model.trim().is_empty() {
            return Err(Doc2MdError::InvalidConfig("vision model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(Doc2MdError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.render_scale, 2.0);
        assert_eq!(c.page_separator, PageSeparator::HorizontalRule);
        assert_eq!(c.compression_level, 9);
        assert_eq!(c.concurrency, 1);
        assert!(c.max_failed_page_ratio.is_none());
        assert_eq!(c.mode, ConversionMode::Auto);
    }

    #[test]
    fn builder_rejects_out_of_range_scale() {
        let err = PipelineConfig::builder().render_scale(12.0).build().unwrap_err();
        assert!(err.to_string().contains("render scale"), "got: {err}");
    }

    #[test]
    fn builder_rejects_bad_thresholds() {
        let err = PipelineConfig::builder()
            .thresholds(StrategyThresholds {
                max_image_area_ratio: 1.5,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("image area ratio"), "got: {err}");
    }

    #[test]
    fn blank_prompt_falls_back_to_default() {
        let c = PipelineConfig::builder().extraction_prompt("   ").build().unwrap();
        assert_eq!(c.prompt(), crate::prompts::DEFAULT_EXTRACTION_PROMPT);
        let c = PipelineConfig::builder().extraction_prompt("Transcribe.").build().unwrap();
        assert_eq!(c.prompt(), "Transcribe.");
    }

    #[test]
    fn conversion_mode_maps_to_page_override() {
        assert_eq!(ConversionMode::Auto.page_override(), None);
        assert_eq!(
            ConversionMode::parse("OCR").and_then(ConversionMode::page_override),
            Some(ExtractionMode::Vision)
        );
        assert_eq!(ConversionMode::parse("native"), Some(ConversionMode::Native));
        assert_eq!(ConversionMode::parse("fast"), None);
    }

    #[test]
    fn separator_rendering() {
        assert_eq!(PageSeparator::HorizontalRule.render(2), "\n\n---\n\n");
        assert_eq!(PageSeparator::Comment.render(4), "\n\n<!-- page 4 -->\n\n");
        assert_eq!(
            PageSeparator::Custom("---------- Page {page} ----------".into()).render(2),
            "\n\n---------- Page 2 ----------\n\n"
        );
    }

    #[test]
    fn endpoint_normalisation() {
        assert_eq!(normalize_endpoint("http://localhost:11434"), "http://localhost:11434/v1");
        assert_eq!(normalize_endpoint("http://localhost:11434/v1/"), "http://localhost:11434/v1");
        let c = VisionConfig::builder()
            .endpoint("https://api.example.com/")
            .build()
            .unwrap();
        assert_eq!(c.completions_url(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn vision_builder_validates() {
        assert!(VisionConfig::builder().endpoint("ftp://x").build().is_err());
        assert!(VisionConfig::builder().model(" ").build().is_err());
        let c = VisionConfig::builder().api_key("").build().unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = VisionConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
