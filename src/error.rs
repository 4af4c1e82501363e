//! Error types for the edgequake-doc2md library.
//!
//! Failures are layered by blast radius:
//!
//! * [`PageError`]: one page of a paginated document failed. Recovered
//!   locally by the extractor: the page becomes an inline marker and its
//!   siblings carry on.
//!
//! * [`InferenceError`]: the vision collaborator could not produce text
//!   (unreachable, timed out, non-success status, empty body).
//!
//! * [`ExtractionError`]: a whole upload could not be converted. Caught at
//!   the item boundary by [`crate::batch::BatchCoordinator`] and turned into a
//!   failed [`crate::output::ConversionResult`]; never surfaced as `Err` to the
//!   batch caller.
//!
//! * [`Doc2MdError`]: setup problems (bad configuration, pdfium cannot be
//!   bound, artifact cannot be written). These happen before or after a batch,
//!   never per item.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while building or finishing a pipeline.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium, or install it system-wide."
    )]
    PdfiumBindingFailed(String),

    /// Could not write the batch artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why a single call to the vision collaborator produced no usable text.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Connection refused, DNS failure, TLS failure, reset mid-body…
    #[error("vision endpoint '{endpoint}' unreachable: {detail}")]
    Transport { endpoint: String, detail: String },

    /// The call exceeded the configured timeout.
    #[error("vision call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The endpoint answered with a non-success status.
    #[error("vision endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body parsed but contained no text.
    #[error("vision endpoint returned an empty response")]
    EmptyResponse,

    /// The body could not be parsed.
    #[error("vision response could not be parsed: {0}")]
    MalformedResponse(String),

    /// A provider-backed engine reported an error.
    #[error("vision provider error: {0}")]
    Provider(String),

    /// The image could not be prepared for the request.
    #[error("image could not be encoded: {0}")]
    Encoding(String),
}

impl InferenceError {
    /// Transport failures and timeouts may succeed on a second attempt;
    /// everything else is deterministic.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            InferenceError::Transport { .. } | InferenceError::Timeout { .. }
        )
    }
}

/// A single page failed; its siblings are unaffected.
#[derive(Debug, Clone, Error)]
pub enum PageError {
    /// The page could not be rasterised.
    #[error("page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The embedded text layer could not be read.
    #[error("page {page}: text layer unreadable: {detail}")]
    TextLayerFailed { page: usize, detail: String },

    /// The vision call for this page failed.
    #[error("page {page}: {source}")]
    Inference {
        page: usize,
        #[source]
        source: InferenceError,
    },

    /// The blocking worker for this page died.
    #[error("page {page}: worker failed: {detail}")]
    Worker { page: usize, detail: String },
}

impl PageError {
    /// 1-indexed page number the error refers to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. }
            | PageError::TextLayerFailed { page, .. }
            | PageError::Inference { page, .. }
            | PageError::Worker { page, .. } => *page,
        }
    }
}

/// A whole upload could not be converted.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// The vision call for an image upload failed.
    #[error("{0}")]
    Inference(#[from] InferenceError),

    /// The document could not be opened at all.
    #[error("document could not be opened: {detail}")]
    UnreadableDocument { detail: String },

    /// The document opened but has no pages.
    #[error("document has no pages")]
    EmptyDocument,

    /// Every page failed.
    #[error("all {total} pages failed; first error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// More pages failed than `max_failed_page_ratio` allows.
    #[error("{failed}/{total} pages failed (limit {pct:.0}%)", pct = .limit * 100.0)]
    TooManyPageFailures {
        failed: usize,
        total: usize,
        limit: f32,
    },

    /// The word-processor converter reported a failure.
    #[error("word-processor conversion failed: {detail}")]
    WordConversion { detail: String },

    /// The item's task panicked or was cancelled.
    #[error("conversion task aborted: {0}")]
    Aborted(String),
}
