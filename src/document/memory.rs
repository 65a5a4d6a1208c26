//! An in-memory [`DocumentSource`] for synthetic documents and tests.

use super::{DocumentSource, Drawing, EmbeddedImage, OutlineNode, Rect};
use crate::error::SourceError;
use image::imageops::FilterType;
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;

/// A page held entirely in memory.
///
/// `canvas` is the page as it looks at zoom 1.0 (one pixel per page unit);
/// [`InMemoryDocument::render_page`] scales it with nearest-neighbour
/// filtering so crops stay pixel-exact.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    pub canvas: DynamicImage,
    pub images: Vec<EmbeddedImage>,
    pub nested_images: Vec<EmbeddedImage>,
    pub annotation_images: Vec<EmbeddedImage>,
    pub drawings: Vec<Drawing>,
    pub render_fails: bool,
    pub objects_fail: bool,
}

impl MemoryPage {
    /// A white page of `width` × `height` units.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_canvas(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([255, 255, 255]),
        )))
    }

    pub fn from_canvas(canvas: DynamicImage) -> Self {
        Self {
            canvas,
            images: Vec::new(),
            nested_images: Vec::new(),
            annotation_images: Vec::new(),
            drawings: Vec::new(),
            render_fails: false,
            objects_fail: false,
        }
    }

    pub fn with_image(mut self, image: EmbeddedImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_nested_image(mut self, image: EmbeddedImage) -> Self {
        self.nested_images.push(image);
        self
    }

    pub fn with_annotation_image(mut self, image: EmbeddedImage) -> Self {
        self.annotation_images.push(image);
        self
    }

    pub fn with_drawing(mut self, drawing: Drawing) -> Self {
        self.drawings.push(drawing);
        self
    }

    /// Make every render of this page fail.
    pub fn failing_render(mut self) -> Self {
        self.render_fails = true;
        self
    }

    /// Make image and drawing enumeration fail for this page.
    pub fn failing_objects(mut self) -> Self {
        self.objects_fail = true;
        self
    }
}

/// A document assembled from [`MemoryPage`]s.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocument {
    pages: Vec<MemoryPage>,
    outline: Vec<OutlineNode>,
    named: HashMap<String, usize>,
}

impl InMemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// `n` blank pages of the given size.
    pub fn blank_pages(n: usize, width: u32, height: u32) -> Self {
        let mut doc = Self::new();
        for _ in 0..n {
            doc = doc.page(MemoryPage::blank(width, height));
        }
        doc
    }

    pub fn page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn outline(mut self, outline: Vec<OutlineNode>) -> Self {
        self.outline = outline;
        self
    }

    pub fn named_destination(mut self, name: impl Into<String>, page: usize) -> Self {
        self.named.insert(name.into(), page);
        self
    }

    fn get(&self, page: usize) -> Result<&MemoryPage, SourceError> {
        self.pages.get(page).ok_or(SourceError::PageOutOfRange {
            page,
            total: self.pages.len(),
        })
    }

    fn objects(&self, page: usize) -> Result<&MemoryPage, SourceError> {
        let p = self.get(page)?;
        if p.objects_fail {
            return Err(SourceError::Objects {
                page,
                detail: "object enumeration disabled for this page".into(),
            });
        }
        Ok(p)
    }
}

impl DocumentSource for InMemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError> {
        let p = self.get(page)?;
        Ok(Rect::new(
            0.0,
            0.0,
            p.canvas.width() as f32,
            p.canvas.height() as f32,
        ))
    }

    fn render_page(&self, page: usize, zoom: f32) -> Result<DynamicImage, SourceError> {
        let p = self.get(page)?;
        if p.render_fails {
            return Err(SourceError::Render {
                page,
                detail: "render disabled for this page".into(),
            });
        }
        let w = ((p.canvas.width() as f32) * zoom).round().max(1.0) as u32;
        let h = ((p.canvas.height() as f32) * zoom).round().max(1.0) as u32;
        if w == p.canvas.width() && h == p.canvas.height() {
            return Ok(p.canvas.clone());
        }
        Ok(p.canvas.resize_exact(w, h, FilterType::Nearest))
    }

    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        Ok(self.objects(page)?.images.clone())
    }

    fn nested_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        Ok(self.objects(page)?.nested_images.clone())
    }

    fn annotation_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        Ok(self.objects(page)?.annotation_images.clone())
    }

    fn drawings(&self, page: usize) -> Result<Vec<Drawing>, SourceError> {
        Ok(self.objects(page)?.drawings.clone())
    }

    fn outline(&self) -> Vec<OutlineNode> {
        self.outline.clone()
    }

    fn resolve_named(&self, name: &str) -> Option<usize> {
        self.named.get(name).copied()
    }
}
