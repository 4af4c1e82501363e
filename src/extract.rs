//! Extraction orchestrator: one upload in, one Markdown string out.
//!
//! Images take a single vision call. Word-processor documents take a single
//! converter call. Paginated documents are decided page by page:
//!
//! ```text
//! page_count ──▶ for each page (in order, up to page_concurrency at once)
//!                  native_page ──▶ StrategySelector
//!                     ├─ Native ──▶ clean text layer
//!                     └─ Vision ──▶ render_page ──▶ VisionEngine ──▶ clean_markdown
//!            ──▶ join with PageSeparator (failed pages become inline markers)
//! ```
//!
//! A page is only rasterised when it is sent to the vision engine. A single
//! failed page never aborts the document; the document fails only when every
//! page failed, or when `max_failed_page_ratio` is configured and exceeded.

use crate::config::PipelineConfig;
use crate::error::{ExtractionError, InferenceError, PageError};
use crate::output::{DocumentCategory, ExtractionMode, NativePage, PageAnalysis, RasterImage, UploadItem};
use crate::pipeline::encode;
use crate::pipeline::postprocess::{clean_markdown, clean_native_text};
use crate::pipeline::render::{PageSource, PdfiumPageSource};
use crate::pipeline::wordproc::{PandocConverter, WordConverter};
use crate::strategy::StrategySelector;
use crate::vision::SharedVisionEngine;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Produces Markdown for a single [`UploadItem`].
pub struct Extractor {
    vision: SharedVisionEngine,
    pages: Arc<dyn PageSource>,
    word: Arc<dyn WordConverter>,
    config: Arc<PipelineConfig>,
    selector: StrategySelector,
}

impl Extractor {
    /// Wire an extractor from explicit collaborators.
    pub fn new(
        vision: SharedVisionEngine,
        pages: Arc<dyn PageSource>,
        word: Arc<dyn WordConverter>,
        config: PipelineConfig,
    ) -> Self {
        let selector = StrategySelector::new(config.thresholds);
        Self {
            vision,
            pages,
            word,
            config: Arc::new(config),
            selector,
        }
    }

    /// pdfium from the system library path and `pandoc` from `PATH`.
    pub fn with_vision(vision: SharedVisionEngine, config: PipelineConfig) -> Self {
        Self::new(
            vision,
            Arc::new(PdfiumPageSource::new()),
            Arc::new(PandocConverter::new()),
            config,
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Convert one upload.
    pub async fn extract(&self, item: &UploadItem) -> Result<String, ExtractionError> {
        info!(
            "Converting {} ({:?}, {} bytes) with {}",
            item.original_filename,
            item.category,
            item.bytes.len(),
            self.vision.name()
        );
        match item.category {
            DocumentCategory::Image => self.extract_image(item).await,
            DocumentCategory::PaginatedDocument => self.extract_paginated(item).await,
            DocumentCategory::WordProcessorDocument => {
                let markdown = self.word.convert(&item.bytes, &item.original_filename).await?;
                Ok(clean_native_text(&markdown))
            }
        }
    }

    async fn extract_image(&self, item: &UploadItem) -> Result<String, ExtractionError> {
        let raster = encode::raster_from_upload(&item.bytes, &item.original_filename);
        let text = self.vision.infer(&raster, self.config.prompt()).await?;
        let markdown = clean_markdown(&text);
        if markdown.is_empty() {
            return Err(InferenceError::EmptyResponse.into());
        }
        Ok(markdown)
    }

    async fn extract_paginated(&self, item: &UploadItem) -> Result<String, ExtractionError> {
        let doc = Arc::clone(&item.bytes);
        let source = Arc::clone(&self.pages);
        let total = tokio::task::spawn_blocking(move || source.page_count(&doc))
            .await
            .map_err(|e| ExtractionError::Aborted(e.to_string()))??;
        if total == 0 {
            return Err(ExtractionError::EmptyDocument);
        }
        debug!("{}: {} pages", item.original_filename, total);

        let filename = item.original_filename.as_str();
        let outcomes: Vec<Result<String, PageError>> = stream::iter(0..total)
            .map(|index| async move {
                let outcome = self.convert_page(&item.bytes, index).await;
                if let Some(ref cb) = self.config.progress_callback {
                    let err = outcome.as_ref().err().map(|e| e.to_string());
                    cb.on_page_complete(filename, index + 1, total, err.as_deref());
                }
                outcome
            })
            .buffered(self.config.page_concurrency.max(1))
            .collect()
            .await;

        check_page_failures(&outcomes, self.config.max_failed_page_ratio)?;
        Ok(assemble_pages(&outcomes, &self.config.page_separator))
    }

    async fn convert_page(&self, doc: &Arc<[u8]>, index: usize) -> Result<String, PageError> {
        let page = index + 1;
        let override_mode = self.config.mode.page_override();

        let (mode, native) = if override_mode == Some(ExtractionMode::Vision) {
            (ExtractionMode::Vision, None)
        } else {
            match self.native_page(doc, index).await {
                Ok(native) => {
                    let mode = self.selector.select(&native.signals, override_mode);
                    debug!("{:?}", PageAnalysis::new(index, native.signals, mode));
                    (mode, Some(native))
                }
                Err(e) if override_mode.is_none() => {
                    warn!("{e}; falling back to vision");
                    (ExtractionMode::Vision, None)
                }
                Err(e) => return Err(e),
            }
        };

        match mode {
            ExtractionMode::Native => {
                let text = native.map(|n| n.text).unwrap_or_default();
                Ok(clean_native_text(&text))
            }
            ExtractionMode::Vision => {
                let raster = self.render_page(doc, index).await?;
                let text = self
                    .vision
                    .infer(&raster, self.config.prompt())
                    .await
                    .map_err(|source| PageError::Inference { page, source })?;
                let markdown = clean_markdown(&text);
                if markdown.is_empty() {
                    return Err(PageError::Inference {
                        page,
                        source: InferenceError::EmptyResponse,
                    });
                }
                Ok(markdown)
            }
        }
    }

    async fn native_page(&self, doc: &Arc<[u8]>, index: usize) -> Result<NativePage, PageError> {
        let doc = Arc::clone(doc);
        let source = Arc::clone(&self.pages);
        tokio::task::spawn_blocking(move || source.native_page(&doc, index))
            .await
            .map_err(|e| PageError::Worker {
                page: index + 1,
                detail: e.to_string(),
            })?
    }

    async fn render_page(&self, doc: &Arc<[u8]>, index: usize) -> Result<RasterImage, PageError> {
        let doc = Arc::clone(doc);
        let source = Arc::clone(&self.pages);
        let scale = self.config.render_scale;
        tokio::task::spawn_blocking(move || source.render_page(&doc, index, scale))
            .await
            .map_err(|e| PageError::Worker {
                page: index + 1,
                detail: e.to_string(),
            })?
    }
}

/// Enforce the document-level failure policy over per-page outcomes.
fn check_page_failures(
    outcomes: &[Result<String, PageError>],
    max_failed_ratio: Option<f32>,
) -> Result<(), ExtractionError> {
    let total = outcomes.len();
    let failed = outcomes.iter().filter(|o| o.is_err()).count();
    if failed == 0 {
        return Ok(());
    }

    warn!("{}/{} pages failed", failed, total);
    if failed == total {
        let first_error = outcomes
            .iter()
            .find_map(|o| o.as_ref().err())
            .map(|e| e.to_string())
            .unwrap_or_default();
        return Err(ExtractionError::AllPagesFailed { total, first_error });
    }
    if let Some(limit) = max_failed_ratio {
        if failed as f32 / total as f32 > limit {
            return Err(ExtractionError::TooManyPageFailures {
                failed,
                total,
                limit,
            });
        }
    }
    Ok(())
}

/// Join page outputs in order; failed pages become a visible marker.
fn assemble_pages(
    outcomes: &[Result<String, PageError>],
    separator: &crate::config::PageSeparator,
) -> String {
    let mut out = String::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        if i > 0 {
            out.push_str(&separator.render(i + 1));
        }
        match outcome {
            Ok(markdown) => out.push_str(markdown),
            Err(e) => out.push_str(&failure_marker(e)),
        }
    }
    out
}

fn failure_marker(e: &PageError) -> String {
    format!("> ⚠ Conversion failed for {e}")
}
