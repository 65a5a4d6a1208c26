//! [`DocumentSource`] backed by pdfium via `pdfium-render`.
//!
//! pdfium is not async-safe; everything here is synchronous and is driven
//! from `spawn_blocking` by [`crate::convert`]. PDF space has a bottom-left
//! origin, so every rectangle is flipped against the page height on the way
//! out.

use super::{
    items_from_segments, Destination, DocumentSource, Drawing, EmbeddedImage, OutlineNode,
    Point, Rect, SegmentKind,
};
use crate::error::{PdfMorphError, SourceError};
use crate::output::DocumentMetadata;
use image::{DynamicImage, GrayImage, Luma};
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Bind the pdfium shared library, downloading it on first use.
pub fn bind_pdfium() -> Result<Pdfium, PdfMorphError> {
    pdfium_auto::bind_pdfium_silent().map_err(|e| PdfMorphError::PdfiumBindingFailed(e.to_string()))
}

/// An open pdfium document.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl<'a> PdfiumDocument<'a> {
    /// Open `path`, mapping pdfium's load errors onto [`PdfMorphError`].
    pub fn open(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&'a str>,
    ) -> Result<Self, PdfMorphError> {
        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.to_lowercase().contains("password") {
                if password.is_some() {
                    PdfMorphError::WrongPassword {
                        path: path.to_path_buf(),
                    }
                } else {
                    PdfMorphError::PasswordRequired {
                        path: path.to_path_buf(),
                    }
                }
            } else {
                PdfMorphError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;
        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Self { document })
    }

    fn page(&self, page: usize) -> Result<PdfPage<'_>, SourceError> {
        let total = self.page_count();
        let index = page
            .try_into()
            .map_err(|_| SourceError::PageOutOfRange { page, total })?;
        self.document
            .pages()
            .get(index)
            .map_err(|_| SourceError::PageOutOfRange { page, total })
    }

    fn embedded(&self, image: &PdfPageImageObject) -> Result<EmbeddedImage, PdfiumError> {
        let raw = image.get_raw_image()?;
        // The processed image has the soft mask applied as alpha.
        let soft_mask = image
            .get_processed_image(&self.document)
            .ok()
            .and_then(|processed| alpha_mask(&processed));
        Ok(EmbeddedImage {
            image: raw,
            soft_mask,
        })
    }

    fn collect_images<'o>(
        &self,
        page: usize,
        objects: impl Iterator<Item = PdfPageObject<'o>>,
        descend: bool,
        out: &mut Vec<EmbeddedImage>,
    ) {
        for object in objects {
            if let Some(image) = object.as_image_object() {
                match self.embedded(image) {
                    Ok(e) => out.push(e),
                    Err(e) => debug!("Page {}: undecodable image object: {:?}", page, e),
                }
            } else if descend {
                if let Some(form) = object.as_x_object_form_object() {
                    self.collect_images(page, form.iter(), true, out);
                }
            }
        }
    }
}

impl DocumentSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError> {
        let p = self.page(page)?;
        Ok(Rect::new(0.0, 0.0, p.width().value, p.height().value))
    }

    fn render_page(&self, page: usize, zoom: f32) -> Result<DynamicImage, SourceError> {
        let p = self.page(page)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        let bitmap = p
            .render_with_config(&config)
            .map_err(|e| SourceError::Render {
                page,
                detail: format!("{:?}", e),
            })?;
        Ok(bitmap.as_image())
    }

    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        let p = self.page(page)?;
        let mut out = Vec::new();
        self.collect_images(page, p.objects().iter(), false, &mut out);
        Ok(out)
    }

    fn nested_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        let p = self.page(page)?;
        let mut out = Vec::new();
        for object in p.objects().iter() {
            if let Some(form) = object.as_x_object_form_object() {
                self.collect_images(page, form.iter(), true, &mut out);
            }
        }
        Ok(out)
    }

    fn annotation_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        let p = self.page(page)?;
        let mut out = Vec::new();
        for annotation in p.annotations().iter() {
            self.collect_images(page, annotation.objects().iter(), true, &mut out);
        }
        Ok(out)
    }

    fn drawings(&self, page: usize) -> Result<Vec<Drawing>, SourceError> {
        let p = self.page(page)?;
        let mut drawings = Vec::new();
        collect_drawings(page, p.height().value, p.objects().iter(), &mut drawings)?;
        Ok(drawings)
    }

    fn outline(&self) -> Vec<OutlineNode> {
        outline_siblings(self.document.bookmarks().root())
    }

    fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: self.page_count(),
            pdf_version: format!("{:?}", self.document.version()),
        }
    }
}

/// Collect path objects, descending into form XObjects so figures placed
/// as embedded PDFs (e.g. plots) are seen too.
fn collect_drawings<'o>(
    page: usize,
    page_height: f32,
    objects: impl Iterator<Item = PdfPageObject<'o>>,
    out: &mut Vec<Drawing>,
) -> Result<(), SourceError> {
    for object in objects {
        if let Some(form) = object.as_x_object_form_object() {
            collect_drawings(page, page_height, form.iter(), out)?;
            continue;
        }
        let Some(path) = object.as_path_object() else {
            continue;
        };
        let bounds = object.bounds().map_err(|e| SourceError::Objects {
            page,
            detail: format!("{:?}", e),
        })?;
        let rect = flip_rect(
            page_height,
            bounds.left().value,
            bounds.top().value,
            bounds.right().value,
            bounds.bottom().value,
        );

        let segments: Vec<(SegmentKind, Point, bool)> = path
            .segments()
            .iter()
            .filter_map(|segment| {
                let kind = match segment.segment_type() {
                    PdfPathSegmentType::MoveTo => SegmentKind::MoveTo,
                    PdfPathSegmentType::LineTo => SegmentKind::LineTo,
                    PdfPathSegmentType::BezierTo => SegmentKind::BezierTo,
                    PdfPathSegmentType::Unknown => return None,
                };
                let point = Point::new(segment.x().value, page_height - segment.y().value);
                Some((kind, point, segment.is_close()))
            })
            .collect();

        let stroke_width = path.stroke_width().map(|w| w.value).unwrap_or(0.0);
        out.push(Drawing {
            items: items_from_segments(&segments),
            bounds: rect,
            stroke_width,
        });
    }
    Ok(())
}

/// PDF bounds (bottom-left origin) to a top-left page rectangle.
fn flip_rect(page_height: f32, left: f32, top: f32, right: f32, bottom: f32) -> Rect {
    Rect::new(left, page_height - top, right, page_height - bottom)
}

/// Walk a bookmark and its following siblings into outline nodes.
fn outline_siblings(first: Option<PdfBookmark<'_>>) -> Vec<OutlineNode> {
    let mut nodes = Vec::new();
    let mut current = first;
    while let Some(bookmark) = current {
        let destination = bookmark
            .destination()
            .and_then(|d| d.page_index().ok())
            .and_then(|index| usize::try_from(index).ok())
            .map(Destination::Page)
            .unwrap_or(Destination::Unresolved);
        nodes.push(OutlineNode::Entry {
            title: bookmark.title().unwrap_or_default(),
            destination,
        });

        let children = outline_siblings(bookmark.first_child());
        if !children.is_empty() {
            nodes.push(OutlineNode::Group(children));
        }
        current = bookmark.next_sibling();
    }
    nodes
}

/// Extract the alpha channel as a mask, or `None` when fully opaque.
fn alpha_mask(image: &DynamicImage) -> Option<GrayImage> {
    if !image.color().has_alpha() {
        return None;
    }
    let rgba = image.to_rgba8();
    if rgba.pixels().all(|p| p[3] == u8::MAX) {
        return None;
    }
    Some(GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([rgba.get_pixel(x, y)[3]])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn bounds_are_flipped_to_top_left_origin() {
        // A box 100..150 up from the bottom of a 792pt page.
        let r = flip_rect(792.0, 10.0, 150.0, 60.0, 100.0);
        assert_eq!(r, Rect::new(10.0, 642.0, 60.0, 692.0));
    }

    #[test]
    fn opaque_image_has_no_mask() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255])));
        assert!(alpha_mask(&img).is_none());
    }

    #[test]
    fn translucent_pixels_produce_mask() {
        let mut rgba = RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 255]));
        rgba.put_pixel(1, 2, Rgba([9, 9, 9, 40]));
        let mask = alpha_mask(&DynamicImage::ImageRgba8(rgba)).expect("mask");
        assert_eq!(mask.get_pixel(1, 2)[0], 40);
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
    }
}
