//! # edgequake-doc2md
//!
//! Batch-convert images, PDFs and word-processor documents to Markdown.
//!
//! ## Why this crate?
//!
//! Sending every PDF page to a Vision Language Model is slow and costly;
//! pulling only the embedded text layer garbles scans, tables and figures.
//! This crate decides **per page**: pages with a healthy text layer are read
//! natively, while scanned, image-heavy or tabular pages are rasterised and
//! transcribed by a vision model. Images always go to the vision model, and
//! word-processor documents are handed to `pandoc` in one call.
//!
//! ## Pipeline Overview
//!
//! ```text
//! uploads (filename, bytes, category)
//!  │
//!  ├─ BatchCoordinator   one task per item, submission order, isolated failures
//!  │   └─ Extractor
//!  │       ├─ Image      → VisionEngine → clean Markdown
//!  │       ├─ PDF        → per page: signals → StrategySelector
//!  │       │                 ├─ Native → text layer
//!  │       │                 └─ Vision → render (pdfium) → VisionEngine
//!  │       └─ Word       → WordConverter (pandoc)
//!  └─ ResultPackager     one upload → <stem>.md, otherwise converted_<ts>.zip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2md::{
//!     BatchCoordinator, Extractor, HttpVisionEngine, PipelineConfig, UploadItem, VisionConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let vision = HttpVisionEngine::new(VisionConfig::default())?; // Ollama on localhost
//!     let extractor = Extractor::with_vision(Arc::new(vision), PipelineConfig::default());
//!     let coordinator = BatchCoordinator::new(extractor);
//!
//!     let item = UploadItem::from_filename("scan.png", std::fs::read("scan.png")?)
//!         .ok_or("unsupported file type")?;
//!     let outcome = coordinator.run(vec![item]).await;
//!
//!     std::fs::write(&outcome.artifact_filename, &outcome.artifact_bytes)?;
//!     for e in &outcome.errors {
//!         eprintln!("{e}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod package;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod strategy;
pub mod stream;
pub mod vision;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::BatchCoordinator;
pub use config::{
    ConversionMode, PageSeparator, PipelineConfig, PipelineConfigBuilder, StrategyThresholds,
    VisionConfig, VisionConfigBuilder,
};
pub use error::{Doc2MdError, ExtractionError, InferenceError, PageError};
pub use extract::Extractor;
pub use output::{
    BatchError, BatchOutcome, ContentSignals, ConversionResult, ConversionStatus, DocumentCategory,
    ExtractionMode, NativePage, OutputMode, PageAnalysis, RasterImage, UploadItem,
};
pub use package::ResultPackager;
pub use pipeline::render::{PageSource, PdfiumPageSource};
pub use pipeline::wordproc::{PandocConverter, WordConverter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use strategy::StrategySelector;
pub use stream::ResultStream;
pub use vision::{HttpVisionEngine, ProviderVisionEngine, SharedVisionEngine, VisionEngine};
