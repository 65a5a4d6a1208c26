//! Chunk scheduling: partition pages, dispatch chunks concurrently, reassemble.
//!
//! ## Partition
//!
//! For N pages, target size S and cap C the scheduler uses
//! `K = min(C, ceil(N / S))` chunks of `ceil(N / K)` contiguous pages (the
//! last one possibly shorter). Concurrency is bounded by K ≤ C while chunks
//! stay close to S for small documents.
//!
//! ## Dispatch
//!
//! Each chunk owns its pages and feeds them to the recognizer one at a time;
//! chunks run concurrently via `buffer_unordered(K)`. The first recognizer
//! error in a chunk fails every page of that chunk, and a panicking
//! recognizer counts as such an error. A response without a payload fails
//! only its own page.
//!
//! Finished chunks hand their pages back and the coordinator drops them into
//! a slot per page number, so chunk completion order never affects the result.

use crate::config::ConversionConfig;
use crate::error::RecognitionError;
use crate::page::{Page, Pending, Settled};
use crate::pipeline::recognize::{extract_payload, ContentRecognizer};
use crate::progress::ProgressCallback;
use crate::prompts::page_instructions;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::any::Any;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub index: usize,
    /// Page numbers covered, end exclusive.
    pub pages: Range<usize>,
    /// False when a recognizer error failed the whole chunk.
    pub succeeded: bool,
    /// Pages settled as failed, whatever the reason.
    pub failed_pages: usize,
    pub error: Option<RecognitionError>,
    pub duration_ms: u64,
}

/// Split `n` items into at most `max_chunks` contiguous ranges of near
/// `chunk_size` items. Zero items yield no ranges.
pub fn plan_chunks(n: usize, chunk_size: usize, max_chunks: usize) -> Vec<Range<usize>> {
    if n == 0 {
        return Vec::new();
    }
    let k = max_chunks.max(1).min(n.div_ceil(chunk_size.max(1)));
    let size = n.div_ceil(k);
    (0..n)
        .step_by(size)
        .map(|start| start..(start + size).min(n))
        .collect()
}

/// Recognize every page, returning settled pages in page order and one report
/// per chunk in chunk order.
pub async fn dispatch(
    mut pages: Vec<Page<Pending>>,
    recognizer: Arc<dyn ContentRecognizer>,
    config: &ConversionConfig,
) -> (Vec<Page<Settled>>, Vec<ChunkReport>) {
    pages.sort_by_key(|p| p.number);
    let total = pages.len();
    let plan = plan_chunks(total, config.chunk_size, config.max_chunks);
    let callback = config.progress_callback.clone();

    info!(
        "Dispatching {} pages in {} chunks (target size {}, cap {})",
        total,
        plan.len(),
        config.chunk_size,
        config.max_chunks
    );
    if let Some(cb) = &callback {
        cb.on_conversion_start(total, plan.len());
    }

    let numbers: Vec<usize> = pages.iter().map(|p| p.number).collect();
    let mut remaining = pages.into_iter();
    let chunks: Vec<Vec<Page<Pending>>> = plan
        .iter()
        .map(|range| remaining.by_ref().take(range.len()).collect())
        .collect();

    let concurrency = chunks.len().max(1);
    let finished: Vec<(Vec<Page<Settled>>, ChunkReport)> = stream::iter(
        chunks
            .into_iter()
            .enumerate()
            .map(|(index, chunk)| run_chunk(index, chunk, recognizer.clone(), config, callback.clone())),
    )
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let mut slots: Vec<Option<Page<Settled>>> = (0..total).map(|_| None).collect();
    let mut reports = Vec::with_capacity(finished.len());
    for (settled, report) in finished {
        for page in settled {
            if let Ok(slot) = numbers.binary_search(&page.number) {
                slots[slot] = Some(page);
            }
        }
        reports.push(report);
    }
    reports.sort_by_key(|r| r.index);

    let settled: Vec<Page<Settled>> = slots.into_iter().flatten().collect();
    let success = settled.iter().filter(|p| !p.outcome().is_failed()).count();
    info!("Dispatch complete: {}/{} pages recognized", success, total);
    if let Some(cb) = &callback {
        cb.on_conversion_complete(total, success);
    }
    (settled, reports)
}

async fn run_chunk(
    index: usize,
    pages: Vec<Page<Pending>>,
    recognizer: Arc<dyn ContentRecognizer>,
    config: &ConversionConfig,
    callback: Option<ProgressCallback>,
) -> (Vec<Page<Settled>>, ChunkReport) {
    let start = Instant::now();
    let span = match (pages.first(), pages.last()) {
        (Some(first), Some(last)) => first.number..last.number + 1,
        _ => 0..0,
    };
    debug!("Chunk {}: pages {:?}", index, span);
    if let Some(cb) = &callback {
        cb.on_chunk_start(index, span.clone());
    }

    let mut outcomes: Vec<Settled> = Vec::with_capacity(pages.len());
    let mut error = None;
    for page in &pages {
        let instructions = page_instructions(config, page);
        let call = recognizer.recognize(page.number, &page.raster, &instructions);
        let result = AssertUnwindSafe(call)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(RecognitionError::Panicked {
                    page: page.number,
                    detail: panic_message(panic.as_ref()),
                })
            });
        match result {
            Ok(response) => match extract_payload(config.format, &response) {
                Some(content) => outcomes.push(Settled::Done(content)),
                None => {
                    warn!("Page {}: response has no delimited payload", page.number);
                    outcomes.push(Settled::Failed);
                }
            },
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }

    let settled: Vec<Page<Settled>> = match &error {
        Some(e) => {
            warn!("Chunk {} (pages {:?}) failed: {}", index, span, e);
            if let Some(cb) = &callback {
                cb.on_chunk_error(index, span.clone(), &e.to_string());
            }
            pages.into_iter().map(|p| p.settle(Settled::Failed)).collect()
        }
        None => pages
            .into_iter()
            .zip(outcomes)
            .map(|(p, outcome)| p.settle(outcome))
            .collect(),
    };

    let failed_pages = settled.iter().filter(|p| p.outcome().is_failed()).count();
    if error.is_none() {
        if let Some(cb) = &callback {
            cb.on_chunk_complete(index, span.clone(), failed_pages);
        }
    }

    let report = ChunkReport {
        index,
        pages: span,
        succeeded: error.is_none(),
        failed_pages,
        error,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    (settled, report)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
