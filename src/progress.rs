//! Progress-callback trait for per-chunk conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while the scheduler works through its chunks.
//!
//! # Example
//!
//! ```rust
//! use pdfmorph::{ConversionProgressCallback, ConversionConfig};
//! use std::ops::Range;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk: usize, pages: Range<usize>, failed_pages: usize) {
//!         self.completed.fetch_add(pages.len() - failed_pages, Ordering::SeqCst);
//!         eprintln!("Chunk {} done", chunk);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::ops::Range;
use std::sync::Arc;

/// Called by the chunk scheduler as chunks start and finish.
///
/// Chunks run concurrently, so `on_chunk_*` may be called from different
/// tasks at once and in any order. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first chunk starts.
    fn on_conversion_start(&self, total_pages: usize, chunks: usize) {
        let _ = (total_pages, chunks);
    }

    /// Called when a chunk's first page is sent to the recognizer.
    fn on_chunk_start(&self, chunk: usize, pages: Range<usize>) {
        let _ = (chunk, pages);
    }

    /// Called when every page of a chunk was answered.
    ///
    /// `failed_pages` counts responses that carried no extractable payload.
    fn on_chunk_complete(&self, chunk: usize, pages: Range<usize>, failed_pages: usize) {
        let _ = (chunk, pages, failed_pages);
    }

    /// Called when a recognizer error aborted a chunk; all its pages fail.
    fn on_chunk_error(&self, chunk: usize, pages: Range<usize>, error: &str) {
        let _ = (chunk, pages, error);
    }

    /// Called once after all chunks have settled.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
