//! The synchronous pre-pass: everything that needs the open document.

use crate::config::ConversionConfig;
use crate::document::DocumentSource;
use crate::error::PdfMorphError;
use crate::page::Page;
use crate::pipeline::drawings::{self, ClusterParams};
use crate::pipeline::{images, render, toc};
use tracing::{debug, info};

/// The part of [`ConversionConfig`] the pre-pass needs.
///
/// Plain data, so it can cross into `spawn_blocking` without the provider
/// and callback handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepassOptions {
    pub zoom: f32,
    pub extract_images: bool,
    pub extract_drawings: bool,
    pub clustering: ClusterParams,
}

impl From<&ConversionConfig> for PrepassOptions {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            zoom: config.zoom,
            extract_images: config.extract_images,
            extract_drawings: config.extract_drawings,
            clustering: config.clustering,
        }
    }
}

/// Rasterise every page and collect its image regions and outline entries.
///
/// Only a render failure aborts; extraction problems are logged inside the
/// extractors and leave the affected page with fewer regions.
pub fn prepare_pages(
    source: &dyn DocumentSource,
    options: &PrepassOptions,
) -> Result<Vec<Page>, PdfMorphError> {
    let total = source.page_count();
    let mut pages = Vec::with_capacity(total);

    // One page at a time: only the PNG outlives the iteration, the decoded
    // pixels are dropped once the page's figures are cropped.
    for number in 0..total {
        let raster = render::rasterize_page(source, number, options.zoom)?;
        let mut page = Page::new(number, raster.png);
        if options.extract_images {
            page.regions.extend(images::extract_embedded(source, number));
        }
        if options.extract_drawings {
            page.regions.extend(drawings::extract_drawings(
                source,
                number,
                &raster.pixels,
                options.zoom,
                &options.clustering,
            ));
        }
        debug!("Page {}: {} regions", number, page.regions.len());
        pages.push(page);
    }

    toc::attach_toc(&mut pages, toc::extract_toc(source));

    info!(
        "Pre-pass: {} pages, {} regions",
        pages.len(),
        pages.iter().map(|p| p.regions.len()).sum::<usize>()
    );
    Ok(pages)
}
