//! Paginated documents: page count, native text layer, rasterisation.
//!
//! All three operations are blocking; the extractor calls them from
//! `tokio::task::spawn_blocking`. pdfium keeps thread-local state, so every
//! call binds its own `Pdfium` handle and reloads the document from the
//! shared byte buffer rather than holding a document across threads.

use crate::error::{Doc2MdError, ExtractionError, PageError};
use crate::output::{ContentSignals, NativePage, RasterImage};
use crate::pipeline::encode;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Images lying entirely inside the top or bottom 5% of the page are
/// treated as running headers / footers (logos, page furniture).
const HEADER_FOOTER_BAND: f32 = 0.05;

/// Ruling lines are paths at most this thick (in points)...
const RULE_MAX_THICKNESS: f32 = 2.0;
/// ...and at least this long.
const RULE_MIN_LENGTH: f32 = 36.0;

/// Number of ruling lines that saturates the ruled-table score.
const RULES_FOR_TABLE: f32 = 6.0;

/// Source of pages for the extractor. Implementations must be usable from
/// blocking worker threads.
pub trait PageSource: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self, document: &[u8]) -> Result<usize, ExtractionError>;

    /// Text layer of one page (0-indexed) plus its content signals.
    fn native_page(&self, document: &[u8], page_index: usize) -> Result<NativePage, PageError>;

    /// Rasterise one page (0-indexed) at `scale` × its natural size.
    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<RasterImage, PageError>;
}

/// [`PageSource`] backed by the pdfium library via `pdfium-render`.
#[derive(Debug, Clone, Default)]
pub struct PdfiumPageSource {
    library_path: Option<PathBuf>,
}

impl PdfiumPageSource {
    /// Bind to the system pdfium library on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a specific library file, or to the platform library name
    /// inside a directory.
    pub fn with_library_path(path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: Some(path.into()),
        }
    }

    /// Bind once to verify the library can be loaded at all.
    pub fn check(&self) -> Result<(), Doc2MdError> {
        self.bind().map(|_| ()).map_err(Doc2MdError::PdfiumBindingFailed)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match self.library_path.as_deref() {
            Some(path) if path.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
            }
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_system_library(),
        };
        bindings.map(Pdfium::new).map_err(|e| e.to_string())
    }

    fn library_label(&self) -> String {
        self.library_path
            .as_deref()
            .map(Path::display)
            .map(|p| p.to_string())
            .unwrap_or_else(|| "system".to_string())
    }
}

impl PageSource for PdfiumPageSource {
    fn page_count(&self, document: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = self.bind().map_err(|e| ExtractionError::UnreadableDocument {
            detail: format!("pdfium ({}) unavailable: {e}", self.library_label()),
        })?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| ExtractionError::UnreadableDocument {
                detail: e.to_string(),
            })?;
        let count = doc.pages().len() as usize;
        debug!("PDF loaded: {} pages", count);
        Ok(count)
    }

    fn native_page(&self, document: &[u8], page_index: usize) -> Result<NativePage, PageError> {
        let page_num = page_index + 1;
        let fail = |detail: String| PageError::TextLayerFailed {
            page: page_num,
            detail,
        };

        let pdfium = self.bind().map_err(fail)?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| fail(e.to_string()))?;
        let pages = doc.pages();
        let index = page_index
            .try_into()
            .map_err(|_| fail(format!("page index {page_index} out of range")))?;
        let page = pages.get(index).map_err(|e| fail(e.to_string()))?;

        let text = page.text().map_err(|e| fail(e.to_string()))?.all();

        let mut image_boxes = Vec::new();
        let mut ruling_lines = 0usize;
        for object in page.objects().iter() {
            match object.object_type() {
                PdfPageObjectType::Image => {
                    if let Ok(b) = object.bounds() {
                        image_boxes.push(Rect {
                            left: b.left().value,
                            bottom: b.bottom().value,
                            right: b.right().value,
                            top: b.top().value,
                        });
                    }
                }
                PdfPageObjectType::Path => {
                    if let (Ok(w), Ok(h)) = (object.width(), object.height()) {
                        if is_ruling_line(w.value, h.value) {
                            ruling_lines += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        let layout = PageLayout {
            width: page.width().value,
            height: page.height().value,
            text: &text,
            image_boxes: &image_boxes,
            ruling_lines,
        };
        let signals = signals_from_layout(&layout);
        Ok(NativePage { text, signals })
    }

    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<RasterImage, PageError> {
        let page_num = page_index + 1;
        let fail = |detail: String| PageError::RenderFailed {
            page: page_num,
            detail,
        };

        let pdfium = self.bind().map_err(fail)?;
        let doc = pdfium
            .load_pdf_from_byte_slice(document, None)
            .map_err(|e| fail(e.to_string()))?;
        let pages = doc.pages();
        let index = page_index
            .try_into()
            .map_err(|_| fail(format!("page index {page_index} out of range")))?;
        let page = pages.get(index).map_err(|e| fail(e.to_string()))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let image = page
            .render_with_config(&render_config)
            .map_err(|e| fail(e.to_string()))?
            .as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        encode::encode_page(&image).map_err(|e| fail(e.to_string()))
    }
}

// ── Content signals ──────────────────────────────────────────────────────

/// Axis-aligned box in PDF points, origin at the bottom-left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl Rect {
    fn area(&self) -> f32 {
        (self.right - self.left).abs() * (self.top - self.bottom).abs()
    }
}

/// What the native layer tells us about a page's layout.
#[derive(Debug, Clone, Copy)]
pub struct PageLayout<'a> {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    pub text: &'a str,
    pub image_boxes: &'a [Rect],
    pub ruling_lines: usize,
}

fn is_ruling_line(width: f32, height: f32) -> bool {
    let (thin, long) = if width < height {
        (width, height)
    } else {
        (height, width)
    };
    thin <= RULE_MAX_THICKNESS && long >= RULE_MIN_LENGTH
}

/// A column gap: a run of two or more spaces, or any tabs.
static RE_COLUMN_GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?: {2,}|\t+)").unwrap());

/// Derive [`ContentSignals`] from a page's layout.
pub fn signals_from_layout(layout: &PageLayout<'_>) -> ContentSignals {
    let page_area = layout.width * layout.height;
    if page_area <= 0.0 {
        return ContentSignals::default();
    }

    let chars = layout.text.chars().filter(|c| !c.is_whitespace()).count() as f32;
    let square_inches = page_area / (POINTS_PER_INCH * POINTS_PER_INCH);
    let text_density = chars / square_inches;

    let header_floor = layout.height * (1.0 - HEADER_FOOTER_BAND);
    let footer_ceiling = layout.height * HEADER_FOOTER_BAND;
    let image_area: f32 = layout
        .image_boxes
        .iter()
        .filter(|r| {
            let in_header = r.bottom.min(r.top) >= header_floor;
            let in_footer = r.top.max(r.bottom) <= footer_ceiling;
            !(in_header || in_footer)
        })
        .map(Rect::area)
        .sum();
    let image_area_ratio = (image_area / page_area).clamp(0.0, 1.0);

    ContentSignals {
        text_density,
        image_area_ratio,
        table_likelihood: table_likelihood(layout.text, layout.ruling_lines),
    }
}

fn table_likelihood(text: &str, ruling_lines: usize) -> f32 {
    let ruled = (ruling_lines as f32 / RULES_FOR_TABLE).min(1.0);

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let aligned = lines
        .iter()
        .filter(|l| RE_COLUMN_GAP.find_iter(l.trim()).count() >= 2)
        .count();
    let columnar = if aligned >= 3 {
        (2.0 * aligned as f32 / lines.len() as f32).min(1.0)
    } else {
        0.0
    };

    ruled.max(columnar)
}
