//! Embedded image extraction.
//!
//! Per page the extractor asks the source for its embedded rasters, falling
//! back to the nested (form XObject) enumeration only when the primary one
//! comes back empty, then appends images found in annotation appearance
//! streams. Each candidate is:
//!
//! 1. merged with its soft mask, which becomes the alpha channel;
//! 2. dropped if either side is under [`MIN_IMAGE_SIDE`] pixels;
//! 3. dropped if its luminance range is under [`MIN_LUMA_RANGE`]
//!    (solid fills, spacer images);
//! 4. re-encoded as PNG and named `image_{page}_{hash12}.png`.
//!
//! Enumeration failures are logged and degrade the page's region list; they
//! never fail the conversion.

use crate::document::{DocumentSource, EmbeddedImage};
use crate::error::SourceError;
use crate::page::{ImageRegion, RegionOrigin};
use crate::pipeline::encode::{embedded_name, encode_png};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Images with a side shorter than this many pixels are ignored.
pub const MIN_IMAGE_SIDE: u32 = 10;

/// Images whose luminance spans fewer levels than this are ignored.
pub const MIN_LUMA_RANGE: u8 = 5;

/// Extract the embedded images of one page as [`ImageRegion`]s.
pub fn extract_embedded(source: &dyn DocumentSource, page: usize) -> Vec<ImageRegion> {
    let mut candidates = match source.page_images(page) {
        Ok(images) => images,
        Err(e) => {
            warn!("Page {}: image enumeration failed: {}", page, e);
            Vec::new()
        }
    };
    if candidates.is_empty() {
        candidates = source.nested_images(page).unwrap_or_else(|e| {
            warn!("Page {}: nested image enumeration failed: {}", page, e);
            Vec::new()
        });
    }
    match source.annotation_images(page) {
        Ok(mut annots) => candidates.append(&mut annots),
        Err(e) => warn!("Page {}: annotation image enumeration failed: {}", page, e),
    }

    let mut seen = HashSet::new();
    let mut regions = Vec::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        match to_region(page, candidate) {
            Ok(Some(region)) => {
                if seen.insert(region.name().to_string()) {
                    debug!(
                        "Page {}: embedded image {} ({}x{})",
                        page,
                        region.name(),
                        region.size().0,
                        region.size().1
                    );
                    regions.push(region);
                } else {
                    trace!("Page {}: duplicate image {} skipped", page, region.name());
                }
            }
            Ok(None) => trace!("Page {}: image #{} filtered", page, index),
            Err(e) => warn!("Page {}: image #{} dropped: {}", page, index, e),
        }
    }
    regions
}

/// Validate and encode one candidate. `Ok(None)` means it was filtered out.
fn to_region(page: usize, candidate: EmbeddedImage) -> Result<Option<ImageRegion>, SourceError> {
    let EmbeddedImage { image, soft_mask } = candidate;
    let (width, height) = (image.width(), image.height());
    if width < MIN_IMAGE_SIDE || height < MIN_IMAGE_SIDE {
        return Ok(None);
    }
    if luma_range(&image) < MIN_LUMA_RANGE {
        return Ok(None);
    }

    let image = match soft_mask {
        Some(mask) => DynamicImage::ImageRgba8(merge_soft_mask(&image, &mask)),
        None => image,
    };
    let png = encode_png(&image).map_err(|e| SourceError::Encode {
        page,
        detail: e.to_string(),
    })?;
    Ok(Some(ImageRegion::new(
        embedded_name(page, &png),
        page,
        (width, height),
        RegionOrigin::Embedded,
        png,
    )))
}

/// Replace the alpha channel of `image` with `mask`, resampling the mask
/// when its size differs.
pub fn merge_soft_mask(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    let resized;
    let mask = if mask.dimensions() == rgba.dimensions() {
        mask
    } else {
        resized = image::imageops::resize(mask, rgba.width(), rgba.height(), FilterType::Triangle);
        &resized
    };
    for (px, m) in rgba.pixels_mut().zip(mask.pixels()) {
        px[3] = m[0];
    }
    rgba
}

/// `max - min` of the luminance over all pixels.
fn luma_range(image: &DynamicImage) -> u8 {
    let luma = image.to_luma8();
    let (lo, hi) = luma
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    hi.saturating_sub(lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InMemoryDocument, MemoryPage};
    use image::{Luma, Rgb, RgbImage};

    fn checker(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    fn flat(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([120, 120, 120])))
    }

    fn doc_with(page: MemoryPage) -> InMemoryDocument {
        InMemoryDocument::new().page(page)
    }

    #[test]
    fn tiny_image_is_excluded() {
        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_image(EmbeddedImage::new(checker(5, 5)))
                .with_image(EmbeddedImage::new(checker(5, 40))),
        );
        assert!(extract_embedded(&doc, 0).is_empty());
    }

    #[test]
    fn uniform_image_is_excluded() {
        let doc = doc_with(MemoryPage::blank(100, 100).with_image(EmbeddedImage::new(flat(40, 40))));
        assert!(extract_embedded(&doc, 0).is_empty());
    }

    #[test]
    fn valid_image_becomes_named_region() {
        let doc = doc_with(MemoryPage::blank(100, 100).with_image(EmbeddedImage::new(checker(20, 12))));
        let regions = extract_embedded(&doc, 0);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert!(r.name().starts_with("image_0_"));
        assert!(r.name().ends_with(".png"));
        assert_eq!(r.size(), (20, 12));
        assert_eq!(r.origin(), RegionOrigin::Embedded);
    }

    #[test]
    fn naming_is_deterministic_across_runs() {
        let doc = doc_with(MemoryPage::blank(100, 100).with_image(EmbeddedImage::new(checker(16, 16))));
        let first = extract_embedded(&doc, 0);
        let second = extract_embedded(&doc, 0);
        assert_eq!(first[0].name(), second[0].name());
        assert_eq!(first[0].bytes(), second[0].bytes());
    }

    #[test]
    fn identical_images_on_one_page_are_kept_once() {
        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_image(EmbeddedImage::new(checker(16, 16)))
                .with_image(EmbeddedImage::new(checker(16, 16))),
        );
        assert_eq!(extract_embedded(&doc, 0).len(), 1);
    }

    #[test]
    fn soft_mask_becomes_alpha() {
        let mask = GrayImage::from_fn(12, 12, |x, _| Luma([if x < 6 { 0 } else { 200 }]));
        let doc = doc_with(
            MemoryPage::blank(100, 100).with_image(EmbeddedImage::new(checker(12, 12)).with_soft_mask(mask)),
        );
        let regions = extract_embedded(&doc, 0);
        assert_eq!(regions.len(), 1);
        let decoded = image::load_from_memory(regions[0].bytes()).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(decoded.get_pixel(11, 5)[3], 200);
    }

    #[test]
    fn soft_mask_of_other_size_is_resampled() {
        let mask = GrayImage::from_pixel(3, 3, Luma([77]));
        let merged = merge_soft_mask(&checker(12, 12), &mask);
        assert_eq!(merged.dimensions(), (12, 12));
        assert!(merged.pixels().all(|p| p[3] == 77));
    }

    #[test]
    fn nested_images_used_only_as_fallback() {
        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_nested_image(EmbeddedImage::new(checker(20, 20))),
        );
        assert_eq!(extract_embedded(&doc, 0).len(), 1);

        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_image(EmbeddedImage::new(checker(20, 20)))
                .with_nested_image(EmbeddedImage::new(checker(30, 30))),
        );
        let regions = extract_embedded(&doc, 0);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].size(), (20, 20));
    }

    #[test]
    fn annotation_images_are_appended() {
        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_image(EmbeddedImage::new(checker(20, 20)))
                .with_annotation_image(EmbeddedImage::new(checker(14, 14))),
        );
        let regions = extract_embedded(&doc, 0);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[1].size(), (14, 14));
    }

    #[test]
    fn enumeration_failure_degrades_to_empty() {
        let doc = doc_with(
            MemoryPage::blank(100, 100)
                .with_image(EmbeddedImage::new(checker(20, 20)))
                .failing_objects(),
        );
        assert!(extract_embedded(&doc, 0).is_empty());
    }
}
