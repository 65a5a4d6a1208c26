//! # pdfmorph
//!
//! Convert PDF documents to Markdown or LaTeX by combining deterministic page
//! decomposition with a vision model that reads each page.
//!
//! ## Why this crate?
//!
//! Text extractors lose layout, formulas and figures. This crate rasterises
//! every page and lets a VLM read it, but first does the structural work
//! itself: it pulls out embedded images, recovers vector figures as cropped
//! rasters, and reads the outline, so the model can reference figures by
//! stable names and keep heading levels consistent. Pages are recognized in
//! bounded concurrent chunks and reassembled strictly in page order.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Pre-pass  rasterise pages, extract embedded images, cluster vector
//!  │               drawings into figures, attach outline titles (pdfium,
//!  │               spawn_blocking)
//!  ├─ 3. Dispatch  K = min(C, ⌈N/S⌉) concurrent chunks, sequential inside
//!  ├─ 4. Extract   payload between <markdown>…</markdown> or <latex>…</latex>
//!  └─ 5. Merge     non-empty pages in page order, format wrapper
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfmorph::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ConversionConfig::default();
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.text);
//!     for image in &output.images {
//!         std::fs::write(image.name(), image.bytes())?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Custom recognizers
//!
//! Anything implementing [`ContentRecognizer`] can stand in for the VLM; pair
//! it with [`convert_with`] for PDFs or [`convert_document`] for any
//! [`DocumentSource`].
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `pdfmorph` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod output;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, OutputFormat};
pub use convert::{
    convert, convert_document, convert_sync, convert_to_file, convert_with, inspect,
    inspect_document,
};
pub use document::{DocumentSource, InMemoryDocument, MemoryPage};
pub use error::{PdfMorphError, RecognitionError, SourceError};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, InspectReport, PageSummary};
pub use page::{ImageRegion, Page, RegionOrigin, Settled, TocEntry};
pub use pipeline::chunk::ChunkReport;
pub use pipeline::drawings::ClusterParams;
pub use pipeline::llm::VlmRecognizer;
pub use pipeline::recognize::ContentRecognizer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
