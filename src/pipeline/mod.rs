//! Pipeline stages used by the extractor.
//!
//! ```text
//! paginated:  render::PageSource ──▶ native text ─────────────▶ postprocess
//!                                └─▶ render ──▶ encode ──▶ vision ──▶ postprocess
//! image:      encode (sniff MIME) ──▶ vision ──▶ postprocess
//! word:       wordproc::WordConverter
//! ```
//!
//! 1. [`render`]: page count, text layer, content signals and rasterisation
//!    through pdfium; every call is blocking
//! 2. [`encode`]: PNG-encode rendered pages, sniff uploaded images, base64
//! 3. [`postprocess`]: deterministic cleanup of vision and native text
//! 4. [`wordproc`]: whole-document conversion by an external tool

pub mod encode;
pub mod postprocess;
pub mod render;
pub mod wordproc;
