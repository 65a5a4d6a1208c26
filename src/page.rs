//! Page data model shared by the pre-pass and the chunk scheduler.
//!
//! A [`Page`] is produced once by the pre-pass with its raster, image
//! regions and TOC entries, in the [`Pending`] state. The scheduler consumes
//! it exactly once through [`Page::settle`], yielding a `Page<Settled>`.
//! Because `settle` takes `self` by value, content can never be written twice
//! and a pending page can never be read as if it had content.

use serde::{Deserialize, Serialize};

/// Content state of a page that has not been dispatched yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending;

/// Final content state of a page after dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settled {
    /// The recognizer produced content for the page.
    Done(String),
    /// The page's chunk failed, or the response carried no payload.
    Failed,
}

impl Settled {
    /// The page text; empty when failed.
    pub fn as_str(&self) -> &str {
        match self {
            Settled::Done(s) => s,
            Settled::Failed => "",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Settled::Failed)
    }
}

/// One page of the source document.
#[derive(Debug, Clone)]
pub struct Page<S = Pending> {
    /// Zero-based, dense page index.
    pub number: usize,
    /// Opaque PNG rendering of the whole page at the configured zoom.
    pub raster: Vec<u8>,
    /// Raster regions found on the page, in discovery order.
    pub regions: Vec<ImageRegion>,
    /// Outline entries that resolve to this page, in outline-walk order.
    pub toc: Vec<TocEntry>,
    content: S,
}

impl Page<Pending> {
    pub fn new(number: usize, raster: Vec<u8>) -> Self {
        Self {
            number,
            raster,
            regions: Vec::new(),
            toc: Vec::new(),
            content: Pending,
        }
    }

    /// Record the page's one and only content outcome.
    pub fn settle(self, content: Settled) -> Page<Settled> {
        Page {
            number: self.number,
            raster: self.raster,
            regions: self.regions,
            toc: self.toc,
            content,
        }
    }
}

impl Page<Settled> {
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    pub fn outcome(&self) -> &Settled {
        &self.content
    }
}

/// Where an [`ImageRegion`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionOrigin {
    /// A raster image embedded in the page or one of its annotations.
    Embedded,
    /// A crop of the page raster covering a cluster of vector drawings.
    DerivedDrawing,
}

/// A named, content-addressed image taken from a page.
///
/// Fields are private so a region cannot change after the name has been
/// derived from its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegion {
    name: String,
    page: usize,
    width: u32,
    height: u32,
    origin: RegionOrigin,
    #[serde(skip)]
    bytes: Vec<u8>,
}

impl ImageRegion {
    pub(crate) fn new(
        name: String,
        page: usize,
        (width, height): (u32, u32),
        origin: RegionOrigin,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name,
            page,
            width,
            height,
            origin,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Pixel size `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn origin(&self) -> RegionOrigin {
        self.origin
    }

    /// Encoded PNG payload.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A titled, leveled pointer from the document outline to a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    /// Nesting depth, 0 for top-level entries.
    pub level: usize,
    pub page: usize,
}
