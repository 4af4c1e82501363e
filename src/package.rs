//! Result packaging: turn the ordered results of a batch into one artifact.
//!
//! * one upload → the Markdown itself, named `<stem>.md` (empty on failure)
//! * anything else → an in-memory zip with one `<stem>.md` entry per
//!   successful result, named `converted_<YYYYmmdd_HHMMSS>.zip`
//!
//! Packaging never fails the batch. If the archive cannot be written the
//! artifact is empty and the reason is reported as an extra [`BatchError`].

use crate::output::{BatchError, ConversionResult, OutputMode};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The downloadable deliverable of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub output_mode: OutputMode,
    pub bytes: Vec<u8>,
    pub filename: String,
    /// Set when the archive could not be written.
    pub error: Option<BatchError>,
}

/// Builds the batch artifact.
#[derive(Debug, Clone, Copy)]
pub struct ResultPackager {
    compression_level: u8,
}

impl Default for ResultPackager {
    fn default() -> Self {
        Self {
            compression_level: 9,
        }
    }
}

impl ResultPackager {
    /// `compression_level` is the deflate level, clamped to 0–9.
    pub fn new(compression_level: u8) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    /// Package the results, stamping archives with the current local time.
    pub fn package(&self, results: &[ConversionResult]) -> Artifact {
        self.package_at(results, Local::now())
    }

    /// Package the results with an explicit timestamp for the archive name.
    pub fn package_at(&self, results: &[ConversionResult], now: DateTime<Local>) -> Artifact {
        match OutputMode::for_batch_size(results.len()) {
            OutputMode::Single => {
                let result = &results[0];
                Artifact {
                    output_mode: OutputMode::Single,
                    bytes: result.markdown().unwrap_or_default().as_bytes().to_vec(),
                    filename: markdown_name(&result.filename),
                    error: None,
                }
            }
            OutputMode::Archive => {
                let filename = archive_name(now);
                match self.write_archive(results) {
                    Ok(bytes) => {
                        debug!("Wrote {} ({} bytes)", filename, bytes.len());
                        Artifact {
                            output_mode: OutputMode::Archive,
                            bytes,
                            filename,
                            error: None,
                        }
                    }
                    Err(e) => {
                        error!("Could not write {}: {}", filename, e);
                        Artifact {
                            output_mode: OutputMode::Archive,
                            bytes: Vec::new(),
                            error: Some(BatchError {
                                filename: filename.clone(),
                                message: e.to_string(),
                            }),
                            filename,
                        }
                    }
                }
            }
        }
    }

    fn write_archive(&self, results: &[ConversionResult]) -> Result<Vec<u8>, ArchiveError> {
        // Deflate accepts levels 1-9 only; level 0 means store uncompressed.
        let options = match self.compression_level {
            0 => SimpleFileOptions::default().compression_method(CompressionMethod::Stored),
            level => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level))),
        };

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let mut used = HashSet::new();
        for result in results {
            let Some(markdown) = result.markdown() else {
                continue;
            };
            let name = unique_name(&result.filename, &mut used);
            zip.start_file(name, options)?;
            zip.write_all(markdown.as_bytes())?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

fn stem(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document")
}

/// `report.pdf` → `report.md`.
pub fn markdown_name(filename: &str) -> String {
    format!("{}.md", stem(filename))
}

/// `converted_20240131_094500.zip`
pub fn archive_name(now: DateTime<Local>) -> String {
    now.format("converted_%Y%m%d_%H%M%S.zip").to_string()
}

fn unique_name(filename: &str, used: &mut HashSet<String>) -> String {
    let base = stem(filename);
    let mut name = format!("{base}.md");
    let mut n = 2;
    while used.contains(&name) {
        name = format!("{base}_{n}.md");
        n += 1;
    }
    used.insert(name.clone());
    name
}
