//! Instructions sent to the vision engine.
//!
//! Callers override the default through
//! [`crate::config::PipelineConfig::extraction_prompt`]; the constant here is
//! used only when no (non-blank) override is configured.

/// Default instruction for transcribing an image or rendered page.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Extract all text from this image and convert it to clean Markdown.

1. STRUCTURE
   - Preserve headings, lists, tables and emphasis as they appear
   - Convert tables to GFM pipe format
   - If there are multiple columns, read left to right, top to bottom

2. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap in ```markdown fences
   - Do NOT add commentary or explanations"#;
