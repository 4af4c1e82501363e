//! Streaming batch API: yield each item's result as soon as it is ready.
//!
//! [`BatchCoordinator::run`] only returns after packaging. Callers that want
//! to show results immediately (a progress UI, a server pushing events) can
//! consume [`BatchCoordinator::stream`] instead. Results arrive in
//! submission order even when `concurrency > 1`; a slow item delays the
//! ones queued behind it but never reorders them.

use crate::batch::{convert_item, BatchCoordinator};
use crate::output::{ConversionResult, UploadItem};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;

/// A boxed stream of per-item results, in submission order.
pub type ResultStream = Pin<Box<dyn Stream<Item = ConversionResult> + Send>>;

impl BatchCoordinator {
    /// Convert `items`, yielding one [`ConversionResult`] per item.
    ///
    /// The stream is lazy: nothing runs until it is polled. Batch-level
    /// progress events (`on_batch_start` / `on_batch_complete`) are only
    /// emitted by [`BatchCoordinator::run`].
    pub fn stream(&self, items: Vec<UploadItem>) -> ResultStream {
        let extractor = Arc::clone(&self.extractor);
        let concurrency = extractor.config().concurrency.max(1);
        let s = stream::iter(items.into_iter().enumerate())
            .map(move |(index, item)| convert_item(Arc::clone(&extractor), index, item))
            .buffered(concurrency);
        Box::pin(s)
    }
}
