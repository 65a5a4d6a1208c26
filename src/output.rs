//! Result types returned by the conversion entry points.

use crate::page::{ImageRegion, Page, RegionOrigin, Settled, TocEntry};
use crate::pipeline::chunk::ChunkReport;
use serde::{Deserialize, Serialize};

/// Everything a conversion produces.
///
/// Region byte payloads are not serialised; persist them with
/// [`ImageRegion::bytes`] (the CLI's `--images-dir` does this).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The merged document in the configured format.
    pub text: String,
    /// All image regions, in page order then discovery order.
    pub images: Vec<ImageRegion>,
    pub pages: Vec<PageSummary>,
    pub chunks: Vec<ChunkReport>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

/// Per-page view of a settled page, without the raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub page_number: usize,
    pub outcome: Settled,
    pub regions: Vec<String>,
    pub toc: Vec<TocEntry>,
}

impl From<&Page<Settled>> for PageSummary {
    fn from(page: &Page<Settled>) -> Self {
        Self {
            page_number: page.number,
            outcome: page.outcome().clone(),
            regions: page.regions.iter().map(|r| r.name().to_string()).collect(),
            toc: page.toc.clone(),
        }
    }
}

/// Document-level metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Counters and timings for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    /// Pages that settled with content (possibly empty text).
    pub recognized_pages: usize,
    /// Pages settled as failed.
    pub failed_pages: usize,
    pub chunks: usize,
    pub failed_chunks: usize,
    pub embedded_images: usize,
    pub drawing_regions: usize,
    pub toc_entries: usize,
    pub prepass_duration_ms: u64,
    pub dispatch_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    pub(crate) fn count_regions(&mut self, images: &[ImageRegion]) {
        self.embedded_images = images
            .iter()
            .filter(|r| r.origin() == RegionOrigin::Embedded)
            .count();
        self.drawing_regions = images.len() - self.embedded_images;
    }
}

/// Summary returned by [`crate::inspect`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub metadata: DocumentMetadata,
    /// Outline entries that resolve to a page.
    pub toc: Vec<TocEntry>,
}
