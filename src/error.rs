//! Error types for the pdfmorph library.
//!
//! Failures fall into two tiers:
//!
//! * [`PdfMorphError`]: **Fatal**: the conversion cannot proceed at all
//!   (bad input file, wrong password, a page that cannot be rasterised,
//!   provider not configured). Returned as `Err(PdfMorphError)` from the
//!   top-level `convert*` functions.
//!
//! * [`SourceError`] and [`RecognitionError`]: **Non-fatal**: a single
//!   page's image extraction or a single chunk's recognition failed. They are
//!   absorbed where they happen, logged, and surface only as missing regions
//!   or empty page content in [`crate::output::ConversionOutput`]. The one
//!   exception is [`SourceError`] raised while rasterising a page, which the
//!   pre-pass promotes to [`PdfMorphError::RasterisationFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a conversion.
#[derive(Debug, Error)]
pub enum PdfMorphError {
    // ── Input ────────────────────────────────────────────────────────────
    #[error("no such file: '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("cannot read '{path}': permission denied")]
    PermissionDenied { path: PathBuf },

    /// The URL was fetched but the request or the response failed.
    #[error("download of '{url}' failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("download of '{url}' did not finish within {secs}s (see --download-timeout)")]
    DownloadTimeout { url: String, secs: u64 },

    /// Readable, but the `%PDF` signature is missing.
    #[error("'{path}' is not a PDF (starts with {magic:?})")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document ─────────────────────────────────────────────────────────
    #[error("cannot open '{path}': {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    #[error("'{path}' is encrypted; pass --password")]
    PasswordRequired { path: PathBuf },

    #[error("the password for '{path}' was rejected")]
    WrongPassword { path: PathBuf },

    /// Every page must render; one failure aborts the pre-pass.
    #[error("cannot rasterise page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Recognition backend ──────────────────────────────────────────────
    #[error("no usable vision provider '{provider}'\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output and setup ─────────────────────────────────────────────────
    #[error("cannot write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rejected by [`crate::config::ConversionConfigBuilder::build`].
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "pdfium could not be loaded: {0}\n\
The library is fetched on first run. Retry with network access, or point\n\
PDFIUM_LIB_PATH at an existing libpdfium."
    )]
    PdfiumBindingFailed(String),

    /// A background task panicked or the runtime could not start.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A failure while reading one part of the source document.
///
/// Raised by [`crate::document::DocumentSource`] implementations.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The page index does not exist in the document.
    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// The backend failed to render a page.
    #[error("page {page}: render failed: {detail}")]
    Render { page: usize, detail: String },

    /// The backend failed to enumerate or decode page objects.
    #[error("page {page}: object access failed: {detail}")]
    Objects { page: usize, detail: String },

    /// Re-encoding an extracted bitmap failed.
    #[error("page {page}: image encoding failed: {detail}")]
    Encode { page: usize, detail: String },
}

/// A failure reported by a [`crate::pipeline::recognize::ContentRecognizer`].
///
/// Any such error fails the whole chunk the page belongs to.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RecognitionError {
    /// The recognition backend returned an error after all retries.
    #[error("page {page}: recognition failed after {retries} retries: {detail}")]
    Failed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// A single call exceeded the adapter's timeout.
    #[error("page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },

    /// The recognizer panicked while handling the page.
    #[error("page {page}: recognizer panicked: {detail}")]
    Panicked { page: usize, detail: String },

    /// The page image could not be prepared for the request.
    #[error("page {page}: invalid page image: {detail}")]
    InvalidImage { page: usize, detail: String },
}
