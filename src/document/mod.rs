//! Read-only access to the source document.
//!
//! The pre-pass never talks to pdfium directly; it goes through
//! [`DocumentSource`], which hands out plain data: page rasters, decoded
//! embedded images, vector drawing primitives and the outline. This keeps
//! every decomposition algorithm testable with [`InMemoryDocument`] and lets
//! the pdfium binding ([`PdfiumDocument`]) stay a thin adapter.
//!
//! All geometry is in page units (PDF points) with a **top-left** origin,
//! `y` growing downwards, matching the orientation of rendered rasters.

mod memory;
mod pdfium;

pub use memory::{InMemoryDocument, MemoryPage};
pub use pdfium::{bind_pdfium, PdfiumDocument};

use crate::error::SourceError;
use crate::output::DocumentMetadata;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Random access to the pages of a document.
///
/// Implementations are used from a single thread during the pre-pass and are
/// dropped before any page is dispatched for recognition.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Page box in page units, origin at (0, 0).
    fn page_bounds(&self, page: usize) -> Result<Rect, SourceError>;

    /// Render the whole page at `zoom` × page units.
    fn render_page(&self, page: usize, zoom: f32) -> Result<DynamicImage, SourceError>;

    /// Primary enumeration of embedded raster images, in drawing order.
    fn page_images(&self, page: usize) -> Result<Vec<EmbeddedImage>, SourceError>;

    /// Secondary enumeration, consulted only when [`Self::page_images`] finds
    /// nothing (e.g. images wrapped in form XObjects).
    fn nested_images(&self, _page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        Ok(Vec::new())
    }

    /// Images carried by annotation appearance streams.
    fn annotation_images(&self, _page: usize) -> Result<Vec<EmbeddedImage>, SourceError> {
        Ok(Vec::new())
    }

    /// Vector drawing primitives, in drawing order.
    fn drawings(&self, page: usize) -> Result<Vec<Drawing>, SourceError>;

    /// Document outline; empty when the document has none.
    fn outline(&self) -> Vec<OutlineNode>;

    /// Resolve a named destination to a page index.
    fn resolve_named(&self, _name: &str) -> Option<usize> {
        None
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            page_count: self.page_count(),
            ..DocumentMetadata::default()
        }
    }
}

/// A decoded embedded image, before validation.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    pub image: DynamicImage,
    /// Soft mask reported for the image, if any. May differ in size.
    pub soft_mask: Option<GrayImage>,
}

impl EmbeddedImage {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            soft_mask: None,
        }
    }

    pub fn with_soft_mask(mut self, mask: GrayImage) -> Self {
        self.soft_mask = Some(mask);
        self
    }
}

/// Outline tree, in the list-of-siblings shape: an entry's children follow
/// it as a [`OutlineNode::Group`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutlineNode {
    Entry {
        title: String,
        destination: Destination,
    },
    Group(Vec<OutlineNode>),
}

/// Target of an outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Zero-based page index, not yet range-checked.
    Page(usize),
    /// Named destination, resolved through [`DocumentSource::resolve_named`].
    Named(String),
    /// The entry points nowhere we can follow (external link, script, …).
    Unresolved,
}

/// A single vector drawing (one path object).
#[derive(Debug, Clone, PartialEq)]
pub struct Drawing {
    pub items: Vec<PathItem>,
    /// Geometric bounds, without stroke.
    pub bounds: Rect,
    pub stroke_width: f32,
}

impl Drawing {
    /// Build a drawing whose bounds are the extent of its items.
    pub fn from_items(items: Vec<PathItem>, stroke_width: f32) -> Self {
        let bounds = items
            .iter()
            .map(PathItem::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Self {
            items,
            bounds,
            stroke_width,
        }
    }
}

/// One drawing command of a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathItem {
    Line(Point, Point),
    Curve([Point; 4]),
    Rect(Rect),
    Quad([Point; 4]),
}

impl PathItem {
    pub fn bounds(&self) -> Rect {
        match self {
            PathItem::Line(a, b) => Rect::new(a.x, a.y, b.x, b.y),
            PathItem::Curve(pts) | PathItem::Quad(pts) => Rect::around(pts),
            PathItem::Rect(r) => *r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Build from two corners in any order.
    pub fn new(xa: f32, ya: f32, xb: f32, yb: f32) -> Self {
        Self {
            x0: xa.min(xb),
            y0: ya.min(yb),
            x1: xa.max(xb),
            y1: ya.max(yb),
        }
    }

    fn around(points: &[Point]) -> Self {
        let mut r = Rect::new(points[0].x, points[0].y, points[0].x, points[0].y);
        for p in &points[1..] {
            r.x0 = r.x0.min(p.x);
            r.y0 = r.y0.min(p.y);
            r.x1 = r.x1.max(p.x);
            r.y1 = r.y1.max(p.y);
        }
        r
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Grow by `d` on every side.
    pub fn inflate(&self, d: f32) -> Rect {
        Rect {
            x0: self.x0 - d,
            y0: self.y0 - d,
            x1: self.x1 + d,
            y1: self.y1 + d,
        }
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 <= other.x1 && other.x0 <= self.x1 && self.y0 <= other.y1 && other.y0 <= self.y1
    }

    /// Clip to `bounds`. The result may have zero size.
    pub fn clip(&self, bounds: &Rect) -> Rect {
        let x0 = self.x0.max(bounds.x0);
        let y0 = self.y0.max(bounds.y0);
        Rect {
            x0,
            y0,
            x1: self.x1.min(bounds.x1).max(x0),
            y1: self.y1.min(bounds.y1).max(y0),
        }
    }
}

/// Raw path segment kinds as reported by PDF backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    MoveTo,
    LineTo,
    BezierTo,
}

/// Turn a flat segment list into [`PathItem`]s.
///
/// Bezier control points arrive as three consecutive `BezierTo` segments.
/// `close` on a segment draws a line back to the subpath start. A closed
/// subpath made of exactly four axis-aligned lines is reported as a single
/// [`PathItem::Rect`]; any other closed four-line subpath as a
/// [`PathItem::Quad`].
pub fn items_from_segments(segments: &[(SegmentKind, Point, bool)]) -> Vec<PathItem> {
    let mut items = Vec::new();
    let mut subpath: Vec<PathItem> = Vec::new();
    let mut start = Point::default();
    let mut current = Point::default();
    let mut pending_curve: Vec<Point> = Vec::new();

    let flush = |subpath: &mut Vec<PathItem>, items: &mut Vec<PathItem>, closed: bool| {
        if closed {
            if let Some(shape) = as_quadrilateral(subpath) {
                items.push(shape);
                subpath.clear();
                return;
            }
        }
        items.append(subpath);
    };

    for &(kind, point, close) in segments {
        match kind {
            SegmentKind::MoveTo => {
                flush(&mut subpath, &mut items, false);
                pending_curve.clear();
                start = point;
                current = point;
            }
            SegmentKind::LineTo => {
                subpath.push(PathItem::Line(current, point));
                current = point;
            }
            SegmentKind::BezierTo => {
                pending_curve.push(point);
                if pending_curve.len() == 3 {
                    subpath.push(PathItem::Curve([
                        current,
                        pending_curve[0],
                        pending_curve[1],
                        pending_curve[2],
                    ]));
                    current = pending_curve[2];
                    pending_curve.clear();
                }
            }
        }
        if close {
            if current != start {
                subpath.push(PathItem::Line(current, start));
                current = start;
            }
            flush(&mut subpath, &mut items, true);
        }
    }
    flush(&mut subpath, &mut items, false);
    items
}

fn as_quadrilateral(subpath: &[PathItem]) -> Option<PathItem> {
    if subpath.len() != 4 {
        return None;
    }
    let mut corners = [Point::default(); 4];
    for (slot, item) in corners.iter_mut().zip(subpath) {
        match item {
            PathItem::Line(a, _) => *slot = *a,
            _ => return None,
        }
    }
    let axis_aligned = subpath.iter().all(|item| match item {
        PathItem::Line(a, b) => a.x == b.x || a.y == b.y,
        _ => false,
    });
    if axis_aligned {
        Some(PathItem::Rect(Rect::around(&corners)))
    } else {
        Some(PathItem::Quad(corners))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn rect_normalises_corners() {
        let r = Rect::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(r, Rect { x0: 0.0, y0: 5.0, x1: 10.0, y1: 20.0 });
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 15.0);
    }

    #[test]
    fn touching_rects_intersect() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 20.0, 10.0);
        let c = Rect::new(10.5, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn clip_never_inverts() {
        let page = Rect::new(0.0, 0.0, 100.0, 100.0);
        let outside = Rect::new(150.0, 150.0, 200.0, 200.0);
        let clipped = outside.clip(&page);
        assert!(clipped.width() >= 0.0);
        assert!(clipped.height() >= 0.0);
    }

    #[test]
    fn closed_axis_aligned_subpath_is_rect() {
        let segs = [
            (SegmentKind::MoveTo, p(0.0, 0.0), false),
            (SegmentKind::LineTo, p(10.0, 0.0), false),
            (SegmentKind::LineTo, p(10.0, 5.0), false),
            (SegmentKind::LineTo, p(0.0, 5.0), true),
        ];
        let items = items_from_segments(&segs);
        assert_eq!(items, vec![PathItem::Rect(Rect::new(0.0, 0.0, 10.0, 5.0))]);
    }

    #[test]
    fn open_polyline_stays_lines() {
        let segs = [
            (SegmentKind::MoveTo, p(0.0, 0.0), false),
            (SegmentKind::LineTo, p(3.0, 4.0), false),
            (SegmentKind::LineTo, p(6.0, 1.0), false),
        ];
        let items = items_from_segments(&segs);
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], PathItem::Line(_, _)));
    }

    #[test]
    fn bezier_triplet_becomes_curve() {
        let segs = [
            (SegmentKind::MoveTo, p(0.0, 0.0), false),
            (SegmentKind::BezierTo, p(1.0, 2.0), false),
            (SegmentKind::BezierTo, p(3.0, 2.0), false),
            (SegmentKind::BezierTo, p(4.0, 0.0), false),
        ];
        let items = items_from_segments(&segs);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].bounds(), Rect::new(0.0, 0.0, 4.0, 2.0));
    }

    #[test]
    fn drawing_bounds_cover_all_items() {
        let d = Drawing::from_items(
            vec![
                PathItem::Line(p(0.0, 0.0), p(5.0, 0.0)),
                PathItem::Rect(Rect::new(20.0, 20.0, 30.0, 40.0)),
            ],
            1.0,
        );
        assert_eq!(d.bounds, Rect::new(0.0, 0.0, 30.0, 40.0));
    }
}
