//! Deterministic collaborators for integration tests.
//!
//! Fake PDFs are plain text: one line per page, `kind:payload`.
//!
//! | line                | text layer                 | rendered image bytes |
//! |---------------------|----------------------------|----------------------|
//! | `text:<words>`      | `<words>`, dense           | `<words>`            |
//! | `scan:<label>`      | empty, page-sized image    | `<label>`            |
//! | `table:<words>`     | `<words>`, table-like      | `<words>`            |
//! | `brokentext:<label>`| error                      | `<label>`            |
//! | `norender:<label>`  | empty, page-sized image    | error                |
//!
//! A document starting with `%CORRUPT` cannot be opened. The fake vision
//! engine answers `# <bytes>` wrapped in a code fence; bytes containing
//! `FAIL` time out, `SLOW` delays the answer, `PANIC` panics.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_doc2md::{
    BatchCoordinator, ContentSignals, ExtractionError, Extractor, InferenceError, NativePage,
    PageError, PageSource, PipelineConfig, RasterImage, UploadItem, VisionEngine, WordConverter,
};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct FakeVision {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl VisionEngine for FakeVision {
    async fn infer(&self, image: &RasterImage, prompt: &str) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let label = String::from_utf8_lossy(&image.bytes).to_string();
        if label.contains("PANIC") {
            panic!("vision engine blew up on {label}");
        }
        if label.contains("SLOW") {
            tokio::time::sleep(Duration::from_millis(80)).await;
        }
        if label.contains("FAIL") {
            return Err(InferenceError::Timeout { secs: 120 });
        }
        Ok(format!("```markdown\n# {label}\n```"))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakePages {
    pub renders: AtomicUsize,
}

fn page_line(document: &[u8], page_index: usize) -> Option<(String, String)> {
    let text = String::from_utf8_lossy(document).to_string();
    let line = text.lines().nth(page_index)?.to_string();
    let (kind, payload) = line.split_once(':').unwrap_or(("text", line.as_str()));
    Some((kind.to_string(), payload.to_string()))
}

impl PageSource for FakePages {
    fn page_count(&self, document: &[u8]) -> Result<usize, ExtractionError> {
        if document.starts_with(b"%CORRUPT") {
            return Err(ExtractionError::UnreadableDocument {
                detail: "no header".into(),
            });
        }
        Ok(String::from_utf8_lossy(document).lines().count())
    }

    fn native_page(&self, document: &[u8], page_index: usize) -> Result<NativePage, PageError> {
        let page = page_index + 1;
        let (kind, payload) = page_line(document, page_index).ok_or(PageError::TextLayerFailed {
            page,
            detail: "out of range".into(),
        })?;
        let dense = ContentSignals {
            text_density: 5.0,
            ..Default::default()
        };
        let scanned = ContentSignals {
            image_area_ratio: 1.0,
            ..Default::default()
        };
        match kind.as_str() {
            "text" => Ok(NativePage {
                text: payload,
                signals: dense,
            }),
            "table" => Ok(NativePage {
                text: payload,
                signals: ContentSignals {
                    table_likelihood: 0.9,
                    ..dense
                },
            }),
            "scan" | "norender" => Ok(NativePage {
                text: String::new(),
                signals: scanned,
            }),
            _ => Err(PageError::TextLayerFailed {
                page,
                detail: "garbled text layer".into(),
            }),
        }
    }

    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        _scale: f32,
    ) -> Result<RasterImage, PageError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let page = page_index + 1;
        let (kind, payload) = page_line(document, page_index).ok_or(PageError::RenderFailed {
            page,
            detail: "out of range".into(),
        })?;
        if kind == "norender" {
            return Err(PageError::RenderFailed {
                page,
                detail: "bitmap allocation failed".into(),
            });
        }
        Ok(RasterImage {
            bytes: payload.into_bytes(),
            mime_type: "image/png",
        })
    }
}

pub struct FakeWord;

#[async_trait]
impl WordConverter for FakeWord {
    async fn convert(&self, bytes: &[u8], _filename: &str) -> Result<String, ExtractionError> {
        if bytes == b"BAD" {
            return Err(ExtractionError::WordConversion {
                detail: "pandoc exited with status 64".into(),
            });
        }
        Ok(format!("{}\r\n", String::from_utf8_lossy(bytes)))
    }
}

pub struct Harness {
    pub coordinator: BatchCoordinator,
    pub vision: Arc<FakeVision>,
    pub pages: Arc<FakePages>,
}

pub fn harness(config: PipelineConfig) -> Harness {
    let vision = Arc::new(FakeVision::default());
    let pages = Arc::new(FakePages::default());
    let extractor = Extractor::new(
        vision.clone(),
        pages.clone(),
        Arc::new(FakeWord),
        config,
    );
    Harness {
        coordinator: BatchCoordinator::new(extractor),
        vision,
        pages,
    }
}

pub fn default_harness() -> Harness {
    harness(PipelineConfig::default())
}

pub fn item(filename: &str, bytes: &str) -> UploadItem {
    UploadItem::from_filename(filename, bytes.as_bytes().to_vec()).expect("supported extension")
}

/// `(entry name, body)` pairs of a zip archive, in archive order.
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, String)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut body = String::new();
            file.read_to_string(&mut body).unwrap();
            (file.name().to_string(), body)
        })
        .collect()
}
