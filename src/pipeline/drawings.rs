//! Vector region clustering.
//!
//! Charts and diagrams drawn with vector operators have no embedded raster to
//! extract. This module groups the page's drawing primitives into bounding
//! boxes, crops those boxes out of the page raster and keeps the crops that
//! look like real figures.
//!
//! ## Algorithm
//!
//! 1. Each drawing becomes a primitive: its bounds inflated by half the
//!    stroke width, plus an *axis-like* flag (a near horizontal, vertical or
//!    45° line, or a rectangle/quad item). Axis-like primitives anchor
//!    clusters even when they are tiny.
//! 2. Seeding: a primitive smaller than `min_primitive_side` on both sides is
//!    dropped unless it lies within `axis_proximity` of an axis-like
//!    primitive. Survivors join the first cluster within `merge_distance`,
//!    or start a new one.
//! 3. Clusters are re-merged pairwise until no two are within
//!    `merge_distance`. The count only ever goes down, so this terminates.
//! 4. Each cluster is padded, clipped to the page and dropped if either side
//!    is under `min_region_side`.
//! 5. The region is cropped from the page raster at the raster's zoom and
//!    dropped when it is flat (luma std-dev under `min_std_dev`) or blank
//!    (mean luma over `max_mean_luma`).
//!
//! The two proximity tiers let the loose fragments of one chart merge while
//! separate figures on the same page stay apart; step 3 catches chains that
//! only become close after an earlier merge.
//!
//! All distances are page units. They were tuned at zoom 2.0; see
//! [`ClusterParams`].

use crate::document::{DocumentSource, Drawing, PathItem, Rect};
use crate::page::{ImageRegion, RegionOrigin};
use crate::pipeline::encode::{drawing_name, encode_png};
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Thresholds for [`extract_drawings`].
///
/// Distances are in page units and were calibrated together with the default
/// zoom of 2.0. When changing the zoom substantially, scale the crop
/// thresholds with it rather than changing them independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Primitives smaller than this on both sides are noise unless near an axis.
    pub min_primitive_side: f32,
    /// How close a tiny primitive must be to an axis-like one to survive.
    pub axis_proximity: f32,
    /// Expanded-rectangle distance under which boxes merge.
    pub merge_distance: f32,
    /// Padding added around each final cluster.
    pub padding: f32,
    /// Padded clusters smaller than this on either side are dropped.
    pub min_region_side: f32,
    /// Crops with a lower luma standard deviation are flat.
    pub min_std_dev: f32,
    /// Crops with a higher mean luma are blank.
    pub max_mean_luma: f32,
    /// Angular tolerance in degrees for axis-like lines.
    pub axis_tolerance_deg: f32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            min_primitive_side: 10.0,
            axis_proximity: 50.0,
            merge_distance: 150.0,
            padding: 50.0,
            min_region_side: 30.0,
            min_std_dev: 10.0,
            max_mean_luma: 252.0,
            axis_tolerance_deg: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Primitive {
    bounds: Rect,
    axis_like: bool,
}

/// Derive drawing regions for one page.
///
/// `raster` must be the page rendered at `zoom`. Source failures are logged
/// and yield no regions.
pub fn extract_drawings(
    source: &dyn DocumentSource,
    page: usize,
    raster: &RgbImage,
    zoom: f32,
    params: &ClusterParams,
) -> Vec<ImageRegion> {
    let drawings = match source.drawings(page) {
        Ok(d) => d,
        Err(e) => {
            warn!("Page {}: drawing enumeration failed: {}", page, e);
            return Vec::new();
        }
    };
    if drawings.is_empty() {
        return Vec::new();
    }
    let page_bounds = match source.page_bounds(page) {
        Ok(b) => b,
        Err(e) => {
            warn!("Page {}: page bounds unavailable: {}", page, e);
            return Vec::new();
        }
    };

    let clusters = cluster(&drawings, params);
    debug!(
        "Page {}: {} drawings → {} clusters",
        page,
        drawings.len(),
        clusters.len()
    );

    let mut regions = Vec::new();
    for (index, bounds) in clusters.iter().enumerate() {
        let region = bounds.inflate(params.padding).clip(&page_bounds);
        if region.width() < params.min_region_side || region.height() < params.min_region_side {
            trace!("Page {}: cluster {} too small after padding", page, index);
            continue;
        }
        let Some(crop) = crop(raster, &region, zoom) else {
            continue;
        };
        let (mean, std_dev) = luma_stats(&crop);
        if std_dev < params.min_std_dev || mean > params.max_mean_luma {
            trace!(
                "Page {}: cluster {} rejected (mean {:.1}, std {:.1})",
                page,
                index,
                mean,
                std_dev
            );
            continue;
        }
        let size = crop.dimensions();
        let png = match encode_png(&DynamicImage::ImageRgb8(crop)) {
            Ok(png) => png,
            Err(e) => {
                warn!("Page {}: cluster {} encode failed: {}", page, index, e);
                continue;
            }
        };
        let name = drawing_name(page, index, &png);
        debug!("Page {}: drawing region {} ({}x{})", page, name, size.0, size.1);
        regions.push(ImageRegion::new(
            name,
            page,
            size,
            RegionOrigin::DerivedDrawing,
            png,
        ));
    }
    regions
}

/// Group drawings into cluster bounding boxes, in seed order.
pub fn cluster(drawings: &[Drawing], params: &ClusterParams) -> Vec<Rect> {
    let primitives: Vec<Primitive> = drawings
        .iter()
        .map(|d| Primitive {
            bounds: d.bounds.inflate(d.stroke_width.max(0.0) / 2.0),
            axis_like: is_axis_like(d, params.axis_tolerance_deg),
        })
        .collect();
    let anchors: Vec<Rect> = primitives
        .iter()
        .filter(|p| p.axis_like)
        .map(|p| p.bounds)
        .collect();

    let mut clusters: Vec<Rect> = Vec::new();
    for p in &primitives {
        let tiny = p.bounds.width() < params.min_primitive_side
            && p.bounds.height() < params.min_primitive_side;
        if tiny
            && !p.axis_like
            && !anchors.iter().any(|a| close(a, &p.bounds, params.axis_proximity))
        {
            continue;
        }
        match clusters
            .iter_mut()
            .find(|c| close(c, &p.bounds, params.merge_distance))
        {
            Some(c) => *c = c.union(&p.bounds),
            None => clusters.push(p.bounds),
        }
    }

    while let Some((i, j)) = find_close_pair(&clusters, params.merge_distance) {
        let absorbed = clusters.remove(j);
        clusters[i] = clusters[i].union(&absorbed);
    }
    clusters
}

fn find_close_pair(clusters: &[Rect], distance: f32) -> Option<(usize, usize)> {
    for i in 0..clusters.len() {
        for j in (i + 1)..clusters.len() {
            if close(&clusters[i], &clusters[j], distance) {
                return Some((i, j));
            }
        }
    }
    None
}

/// `a` grown by `distance` on every side touches or overlaps `b`.
fn close(a: &Rect, b: &Rect, distance: f32) -> bool {
    a.inflate(distance).intersects(b)
}

fn is_axis_like(drawing: &Drawing, tolerance_deg: f32) -> bool {
    drawing.items.iter().any(|item| match item {
        PathItem::Rect(_) | PathItem::Quad(_) => true,
        PathItem::Line(a, b) => {
            let angle = (b.y - a.y).atan2(b.x - a.x).to_degrees().abs() % 45.0;
            angle <= tolerance_deg || 45.0 - angle <= tolerance_deg
        }
        PathItem::Curve(_) => false,
    })
}

/// Crop `region` (page units) out of a raster rendered at `zoom`.
fn crop(raster: &RgbImage, region: &Rect, zoom: f32) -> Option<RgbImage> {
    let (w, h) = raster.dimensions();
    let x0 = ((region.x0 * zoom).floor().max(0.0) as u32).min(w);
    let y0 = ((region.y0 * zoom).floor().max(0.0) as u32).min(h);
    let x1 = ((region.x1 * zoom).ceil().max(0.0) as u32).min(w);
    let y1 = ((region.y1 * zoom).ceil().max(0.0) as u32).min(h);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(image::imageops::crop_imm(raster, x0, y0, x1 - x0, y1 - y0).to_image())
}

/// Mean and population standard deviation of the luma channel.
fn luma_stats(img: &RgbImage) -> (f32, f32) {
    let luma = DynamicImage::ImageRgb8(img.clone()).to_luma8();
    let n = luma.width() as f64 * luma.height() as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let (sum, sum_sq) = luma.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = p[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean as f32, variance.sqrt() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InMemoryDocument, MemoryPage, Point};
    use crate::pipeline::render::rasterize_page;
    use image::Rgb;

    fn rect_drawing(x0: f32, y0: f32, x1: f32, y1: f32) -> Drawing {
        Drawing::from_items(vec![PathItem::Rect(Rect::new(x0, y0, x1, y1))], 1.0)
    }

    fn curve_drawing(x: f32, y: f32, size: f32) -> Drawing {
        let p = |dx: f32, dy: f32| Point::new(x + dx, y + dy);
        Drawing::from_items(
            vec![PathItem::Curve([p(0.0, 0.0), p(0.0, size), p(size, size), p(size, 0.0)])],
            0.0,
        )
    }

    fn hline(x0: f32, x1: f32, y: f32) -> Drawing {
        Drawing::from_items(vec![PathItem::Line(Point::new(x0, y), Point::new(x1, y))], 1.0)
    }

    #[test]
    fn overlapping_boxes_merge() {
        let drawings = vec![
            rect_drawing(0.0, 0.0, 100.0, 100.0),
            rect_drawing(80.0, 80.0, 200.0, 150.0),
        ];
        let clusters = cluster(&drawings, &ClusterParams::default());
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].x1 >= 200.0);
    }

    #[test]
    fn distant_boxes_stay_separate() {
        let drawings = vec![
            rect_drawing(0.0, 0.0, 50.0, 50.0),
            rect_drawing(400.0, 400.0, 450.0, 450.0),
        ];
        assert_eq!(cluster(&drawings, &ClusterParams::default()).len(), 2);
    }

    #[test]
    fn transitive_chain_merges_at_fixed_point() {
        // A and C are too far apart; B bridges them but is seeded last.
        let drawings = vec![
            rect_drawing(0.0, 0.0, 20.0, 20.0),
            rect_drawing(300.0, 0.0, 320.0, 20.0),
            rect_drawing(160.0, 0.0, 170.0, 20.0),
        ];
        let clusters = cluster(&drawings, &ClusterParams::default());
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].x0 <= 0.0 && clusters[0].x1 >= 320.0);
    }

    #[test]
    fn tiny_isolated_primitive_is_dropped() {
        let drawings = vec![curve_drawing(500.0, 500.0, 4.0)];
        assert!(cluster(&drawings, &ClusterParams::default()).is_empty());
    }

    #[test]
    fn tiny_primitive_near_axis_is_kept() {
        let drawings = vec![hline(0.0, 200.0, 100.0), curve_drawing(100.0, 130.0, 4.0)];
        let clusters = cluster(&drawings, &ClusterParams::default());
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].y1 >= 134.0);
    }

    #[test]
    fn axis_detection_tolerates_small_angles() {
        let params = ClusterParams::default();
        let line = |dx: f32, dy: f32| {
            Drawing::from_items(vec![PathItem::Line(Point::new(0.0, 0.0), Point::new(dx, dy))], 1.0)
        };
        assert!(is_axis_like(&line(100.0, 1.0), params.axis_tolerance_deg));
        assert!(is_axis_like(&line(0.0, -50.0), params.axis_tolerance_deg));
        assert!(is_axis_like(&line(30.0, 30.0), params.axis_tolerance_deg));
        assert!(!is_axis_like(&line(100.0, 30.0), params.axis_tolerance_deg));
        assert!(!is_axis_like(&curve_drawing(0.0, 0.0, 20.0), params.axis_tolerance_deg));
    }

    #[test]
    fn stroke_width_inflates_bounds() {
        let d = Drawing::from_items(vec![PathItem::Line(Point::new(0.0, 0.0), Point::new(8.0, 0.0))], 12.0);
        let clusters = cluster(&[d], &ClusterParams::default());
        assert_eq!(clusters[0].height(), 12.0);
    }

    fn page_with_pattern(pattern: impl Fn(u32, u32) -> Rgb<u8>) -> MemoryPage {
        MemoryPage::from_canvas(DynamicImage::ImageRgb8(RgbImage::from_fn(300, 300, pattern)))
            .with_drawing(rect_drawing(100.0, 100.0, 160.0, 160.0))
    }

    fn regions_for(page: MemoryPage) -> Vec<ImageRegion> {
        let doc = InMemoryDocument::new().page(page);
        let raster = rasterize_page(&doc, 0, 2.0).unwrap();
        extract_drawings(&doc, 0, &raster.pixels, 2.0, &ClusterParams::default())
    }

    #[test]
    fn flat_crop_is_discarded() {
        let regions = regions_for(page_with_pattern(|_, _| Rgb([90, 90, 90])));
        assert!(regions.is_empty());
    }

    #[test]
    fn blank_crop_is_discarded() {
        let regions = regions_for(page_with_pattern(|x, y| {
            if x == 130 && y == 130 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert!(regions.is_empty());
    }

    #[test]
    fn high_contrast_crop_is_kept() {
        let regions = regions_for(page_with_pattern(|x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert!(r.name().starts_with("drawing_0_0_"));
        assert_eq!(r.origin(), RegionOrigin::DerivedDrawing);
        // 60 units + 2×50 padding, at zoom 2.
        assert_eq!(r.size(), (322, 322));
    }

    #[test]
    fn page_without_drawings_yields_nothing() {
        let doc = InMemoryDocument::blank_pages(1, 100, 100);
        let raster = rasterize_page(&doc, 0, 1.0).unwrap();
        assert!(extract_drawings(&doc, 0, &raster.pixels, 1.0, &ClusterParams::default()).is_empty());
    }
}
