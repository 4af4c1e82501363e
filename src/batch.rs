//! Batch coordinator: run every upload through the extractor and package
//! the outcome.
//!
//! Items are processed in submission order (up to `concurrency` at once) and
//! results come back in that same order. Each item runs in its own Tokio task,
//! so a failing or even panicking item becomes a `Failure` result instead of
//! taking the batch down. [`BatchCoordinator::run`] therefore never returns an
//! error: the caller always gets a [`BatchOutcome`].

use crate::error::ExtractionError;
use crate::extract::Extractor;
use crate::output::{BatchError, BatchOutcome, ConversionResult, ConversionStatus, UploadItem};
use crate::package::ResultPackager;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{info, warn};

/// Drives one batch from uploads to a packaged [`BatchOutcome`].
#[derive(Clone)]
pub struct BatchCoordinator {
    pub(crate) extractor: Arc<Extractor>,
    packager: ResultPackager,
}

impl BatchCoordinator {
    pub fn new(extractor: Extractor) -> Self {
        Self::from_shared(Arc::new(extractor))
    }

    /// Share one extractor between several coordinators.
    pub fn from_shared(extractor: Arc<Extractor>) -> Self {
        let packager = ResultPackager::new(extractor.config().compression_level);
        Self {
            extractor,
            packager,
        }
    }

    pub fn extractor(&self) -> &Arc<Extractor> {
        &self.extractor
    }

    /// Convert every item and package the results.
    pub async fn run(&self, items: Vec<UploadItem>) -> BatchOutcome {
        let start = Instant::now();
        let total = items.len();
        let callback = self.extractor.config().progress_callback.clone();
        info!("Starting batch of {} item(s)", total);
        if let Some(ref cb) = callback {
            cb.on_batch_start(total);
        }

        let tally = self
            .stream(items)
            .fold(Tally::default(), |tally, result| async move { tally.record(result) })
            .await;

        let artifact = self.packager.package(&tally.results);
        let mut errors = tally.errors;
        errors.extend(artifact.error);

        info!(
            "Batch complete: {} succeeded, {} failed in {}ms",
            tally.success_count,
            tally.failure_count,
            start.elapsed().as_millis()
        );
        if let Some(ref cb) = callback {
            cb.on_batch_complete(tally.success_count, tally.failure_count);
        }

        BatchOutcome {
            results: tally.results,
            success_count: tally.success_count,
            failure_count: tally.failure_count,
            output_mode: artifact.output_mode,
            artifact_bytes: artifact.bytes,
            artifact_filename: artifact.filename,
            errors,
        }
    }
}

/// Running totals folded over the ordered results.
#[derive(Debug, Default)]
struct Tally {
    results: Vec<ConversionResult>,
    success_count: usize,
    failure_count: usize,
    errors: Vec<BatchError>,
}

impl Tally {
    fn record(mut self, result: ConversionResult) -> Self {
        match &result.status {
            ConversionStatus::Success { .. } => self.success_count += 1,
            ConversionStatus::Failure { error_detail } => {
                self.failure_count += 1;
                self.errors.push(BatchError {
                    filename: result.filename.clone(),
                    message: error_detail.clone(),
                });
            }
        }
        self.results.push(result);
        self
    }
}

/// Convert one item in its own task and turn the outcome into a result.
pub(crate) async fn convert_item(
    extractor: Arc<Extractor>,
    index: usize,
    item: UploadItem,
) -> ConversionResult {
    let start = Instant::now();
    let filename = item.original_filename.clone();
    let callback = extractor.config().progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_item_start(index, &filename);
    }

    let outcome = tokio::spawn(async move { extractor.extract(&item).await })
        .await
        .unwrap_or_else(|e| Err(ExtractionError::Aborted(join_error_detail(e))));
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(markdown) => {
            info!("{}: {} chars in {}ms", filename, markdown.len(), elapsed_ms);
            if let Some(ref cb) = callback {
                cb.on_item_complete(index, &filename, markdown.len());
            }
            ConversionResult::success(filename, markdown, elapsed_ms)
        }
        Err(e) => {
            let detail = e.to_string();
            warn!("{}: {}", filename, detail);
            if let Some(ref cb) = callback {
                cb.on_item_error(index, &filename, &detail);
            }
            ConversionResult::failure(filename, detail, elapsed_ms)
        }
    }
}

fn join_error_detail(e: JoinError) -> String {
    if !e.is_panic() {
        return "task cancelled".to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_and_collects_errors_in_order() {
        let tally = [
            ConversionResult::success("a.png", "A".into(), 1),
            ConversionResult::failure("b.pdf", "document could not be opened", 2),
            ConversionResult::success("c.jpg", "C".into(), 3),
            ConversionResult::failure("d.docx", "pandoc missing", 4),
        ]
        .into_iter()
        .fold(Tally::default(), Tally::record);

        assert_eq!(tally.success_count, 2);
        assert_eq!(tally.failure_count, 2);
        assert_eq!(tally.results.len(), 4);
        let lines: Vec<String> = tally.errors.iter().map(ToString::to_string).collect();
        assert_eq!(lines, ["b.pdf: document could not be opened", "d.docx: pandoc missing"]);
    }

    #[test]
    fn panics_are_reported_with_their_message() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let err = rt
            .block_on(async { tokio::spawn(async { panic!("boom") }).await })
            .unwrap_err();
        assert_eq!(join_error_detail(err), "panicked: boom");
    }
}
