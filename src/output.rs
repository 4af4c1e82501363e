//! Data model: what goes into a batch and what comes out.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

// ── Input ────────────────────────────────────────────────────────────────

/// Which extraction path an upload takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// A raster image; transcribed by one vision call.
    Image,
    /// A multi-page document (PDF); decided page by page.
    PaginatedDocument,
    /// A word-processor document; handed to the external converter.
    WordProcessorDocument,
}

impl DocumentCategory {
    /// Map a file name's extension to a category.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => Some(DocumentCategory::Image),
            "pdf" => Some(DocumentCategory::PaginatedDocument),
            // Legacy binary `.doc` has no pandoc reader and is rejected here.
            "docx" | "odt" | "rtf" => Some(DocumentCategory::WordProcessorDocument),
            _ => None,
        }
    }
}

/// One uploaded file. Immutable once the batch is submitted.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub original_filename: String,
    pub bytes: Arc<[u8]>,
    pub category: DocumentCategory,
}

impl UploadItem {
    pub fn new(
        original_filename: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        category: DocumentCategory,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            bytes: bytes.into(),
            category,
        }
    }

    /// Build an item, inferring the category from the file name.
    pub fn from_filename(original_filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Option<Self> {
        let original_filename = original_filename.into();
        let category = DocumentCategory::from_filename(&original_filename)?;
        Some(Self::new(original_filename, bytes, category))
    }
}

/// Encoded raster image handed to the vision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

// ── Per-page analysis ────────────────────────────────────────────────────

/// How one page's text is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExtractionMode {
    /// Pull the embedded text layer; no network call.
    Native,
    /// Render the page and transcribe it with the vision engine.
    Vision,
}

/// Content descriptor of one page, computed from its native layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSignals {
    /// Non-whitespace characters per square inch of page.
    pub text_density: f32,
    /// Share of the page covered by meaningful images, 0.0–1.0.
    pub image_area_ratio: f32,
    /// How table-like the page looks, 0.0–1.0.
    pub table_likelihood: f32,
}

impl ContentSignals {
    /// True for a page with neither text nor images.
    pub fn is_blank(&self) -> bool {
        self.text_density <= 0.0 && self.image_area_ratio <= 0.0
    }
}

/// Transient record of the strategy decision for one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageAnalysis {
    /// 0-indexed page number.
    pub page_index: usize,
    pub text_density: f32,
    pub image_area_ratio: f32,
    pub table_likelihood: f32,
    pub chosen_mode: ExtractionMode,
}

impl PageAnalysis {
    pub fn new(page_index: usize, signals: ContentSignals, chosen_mode: ExtractionMode) -> Self {
        Self {
            page_index,
            text_density: signals.text_density,
            image_area_ratio: signals.image_area_ratio,
            table_likelihood: signals.table_likelihood,
            chosen_mode,
        }
    }
}

/// Embedded text layer of one page plus the signals derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativePage {
    pub text: String,
    pub signals: ContentSignals,
}

// ── Per-item result ──────────────────────────────────────────────────────

/// Tagged outcome of converting one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionStatus {
    Success { markdown: String },
    Failure { error_detail: String },
}

/// Exactly one of these exists per [`UploadItem`] in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub filename: String,
    #[serde(flatten)]
    pub status: ConversionStatus,
    /// Wall-clock time spent on this item.
    pub elapsed_ms: u64,
}

impl ConversionResult {
    pub fn success(filename: impl Into<String>, markdown: String, elapsed_ms: u64) -> Self {
        Self {
            filename: filename.into(),
            status: ConversionStatus::Success { markdown },
            elapsed_ms,
        }
    }

    pub fn failure(filename: impl Into<String>, error_detail: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            filename: filename.into(),
            status: ConversionStatus::Failure {
                error_detail: error_detail.into(),
            },
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ConversionStatus::Success { .. })
    }

    pub fn markdown(&self) -> Option<&str> {
        match &self.status {
            ConversionStatus::Success { markdown } => Some(markdown),
            ConversionStatus::Failure { .. } => None,
        }
    }

    pub fn error_detail(&self) -> Option<&str> {
        match &self.status {
            ConversionStatus::Success { .. } => None,
            ConversionStatus::Failure { error_detail } => Some(error_detail),
        }
    }
}

// ── Batch outcome ────────────────────────────────────────────────────────

/// Shape of the deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Exactly one upload: the artifact is the Markdown itself.
    Single,
    /// Zero or several uploads: the artifact is a zip archive.
    Archive,
}

impl OutputMode {
    /// `Single` iff the batch holds exactly one upload.
    pub fn for_batch_size(n: usize) -> Self {
        if n == 1 {
            OutputMode::Single
        } else {
            OutputMode::Archive
        }
    }
}

/// A failed upload as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchError {
    pub filename: String,
    pub message: String,
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.filename, self.message)
    }
}

/// Final, immutable result of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub results: Vec<ConversionResult>,
    pub success_count: usize,
    pub failure_count: usize,
    pub output_mode: OutputMode,
    #[serde(skip)]
    pub artifact_bytes: Vec<u8>,
    pub artifact_filename: String,
    pub errors: Vec<BatchError>,
}

impl BatchOutcome {
    /// MIME type of the artifact.
    pub fn content_type(&self) -> &'static str {
        match self.output_mode {
            OutputMode::Single => "text/markdown",
            OutputMode::Archive => "application/zip",
        }
    }

    /// Number of uploads in the batch.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// True when the batch held uploads and none of them converted.
    pub fn all_failed(&self) -> bool {
        self.success_count == 0 && self.failure_count > 0
    }
}
