//! Page rasterisation: whole pages to opaque PNG.
//!
//! pdfium renders with an alpha channel; pages are flattened onto white so
//! the raster handed to the recognizer, and the crops the clusterer takes
//! from it, are always opaque RGB.
//!
//! A render failure on any page is fatal: there is no partial-document
//! rasterisation.

use crate::document::DocumentSource;
use crate::error::PdfMorphError;
use crate::pipeline::encode::encode_png;
use image::{DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// A rendered page: pixels for cropping plus the encoded PNG.
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub pixels: RgbImage,
    pub png: Vec<u8>,
}

/// Render one page at `zoom`, flattened to opaque RGB.
pub fn rasterize_page(
    source: &dyn DocumentSource,
    page: usize,
    zoom: f32,
) -> Result<PageRaster, PdfMorphError> {
    let rendered = source
        .render_page(page, zoom)
        .map_err(|e| PdfMorphError::RasterisationFailed {
            page,
            detail: e.to_string(),
        })?;
    let pixels = flatten(&rendered);
    let png = encode_png(&DynamicImage::ImageRgb8(pixels.clone())).map_err(|e| {
        PdfMorphError::RasterisationFailed {
            page,
            detail: format!("PNG encode: {}", e),
        }
    })?;
    debug!(
        "Rendered page {} → {}x{} px, {} bytes",
        page,
        pixels.width(),
        pixels.height(),
        png.len()
    );
    Ok(PageRaster { pixels, png })
}

/// Composite onto white and drop alpha.
pub fn flatten(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let a = src[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        *dst = Rgb([blend(src[0]), blend(src[1]), blend(src[2])]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InMemoryDocument, MemoryPage};
    use image::{Rgba, RgbaImage};

    #[test]
    fn transparent_pixels_become_white() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let flat = flatten(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn raster_is_opaque_png_at_zoom() {
        let doc = InMemoryDocument::blank_pages(1, 30, 20);
        let raster = rasterize_page(&doc, 0, 2.0).unwrap();
        let decoded = image::load_from_memory(&raster.png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (60, 40));
        assert!(!decoded.color().has_alpha());
    }

    #[test]
    fn render_failure_is_fatal() {
        let doc = InMemoryDocument::new()
            .page(MemoryPage::blank(10, 10))
            .page(MemoryPage::blank(10, 10).failing_render());
        assert!(rasterize_page(&doc, 0, 1.0).is_ok());
        let err = rasterize_page(&doc, 1, 1.0).unwrap_err();
        assert!(matches!(err, PdfMorphError::RasterisationFailed { page: 1, .. }));
    }
}
