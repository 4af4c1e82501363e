//! Progress-callback trait for batch, item and page events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! batch as it runs. The CLI drives its progress bar from these events; a
//! server could forward them to a channel or a WebSocket instead.
//!
//! # Example
//!
//! ```rust
//! use edgequake_doc2md::{BatchProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_item_complete(&self, index: usize, filename: &str, _markdown_len: usize) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}: item {index} ({filename}) done");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch coordinator and the extractor as work progresses.
///
/// All methods default to no-ops. With `concurrency > 1` or
/// `page_concurrency > 1` events for different items or pages may arrive
/// from different threads, so shared state needs `Mutex` or atomics.
pub trait BatchProgressCallback: Send + Sync {
    /// Once, before the first item starts.
    fn on_batch_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Before an item (0-indexed, submission order) is extracted.
    fn on_item_start(&self, index: usize, filename: &str) {
        let _ = (index, filename);
    }

    /// After an item produced Markdown.
    fn on_item_complete(&self, index: usize, filename: &str, markdown_len: usize) {
        let _ = (index, filename, markdown_len);
    }

    /// After an item failed as a whole.
    fn on_item_error(&self, index: usize, filename: &str, error: &str) {
        let _ = (index, filename, error);
    }

    /// After one page of a paginated document was handled.
    ///
    /// * `page_num`: 1-indexed
    /// * `error`: `Some` when the page became an inline failure marker
    fn on_page_complete(
        &self,
        filename: &str,
        page_num: usize,
        total_pages: usize,
        error: Option<&str>,
    ) {
        let _ = (filename, page_num, total_pages, error);
    }

    /// Once, after every item has a result.
    fn on_batch_complete(&self, success_count: usize, failure_count: usize) {
        let _ = (success_count, failure_count);
    }
}

/// Default when no callback is configured.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
