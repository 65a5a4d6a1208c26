//! Pipeline stages for document conversion.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//!           ┌─ render ─┬─ images ──┐
//! input ──▶ │          └─ drawings ┼─▶ toc ──▶ chunk ──▶ merge
//! (URL/path)└──────── prepass ─────┘        (recognize)
//! ```
//!
//! 1. [`input`]    resolves the user-supplied path or URL to a local file
//! 2. [`prepass`]  drives [`render`], [`images`], [`drawings`] and [`toc`]
//!    over the open document, single-threaded
//! 3. [`chunk`]    partitions pages and dispatches chunks concurrently to a
//!    [`recognize::ContentRecognizer`] ([`llm`] provides the VLM one)
//! 4. [`merge`]    joins the settled pages in page order
//!
//! [`encode`] holds the PNG, hashing and attachment helpers shared by the
//! stages.

pub mod chunk;
pub mod drawings;
pub mod encode;
pub mod images;
pub mod input;
pub mod llm;
pub mod merge;
pub mod prepass;
pub mod recognize;
pub mod render;
pub mod toc;
