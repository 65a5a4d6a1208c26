//! End-to-end integration tests for pdfmorph.
//!
//! These tests use real PDF files in `./test_cases/` and, for conversion,
//! make live LLM API calls. They are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! A different PDF can be pointed at with `PDFMORPH_E2E_PDF=/path/to/file.pdf`.

use pdfmorph::document::{bind_pdfium, DocumentSource, PdfiumDocument};
use pdfmorph::{convert, convert_to_file, inspect, ConversionConfig, OutputFormat, PdfMorphError};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = test_cases_dir().join("output");
    std::fs::create_dir_all(&d).ok();
    d
}

fn sample_pdf() -> PathBuf {
    std::env::var("PDFMORPH_E2E_PDF")
        .map(PathBuf::from)
        .unwrap_or_else(|_| test_cases_dir().join("sample.pdf"))
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn has_provider_key() -> bool {
    ["OPENAI_API_KEY", "ANTHROPIC_API_KEY", "GEMINI_API_KEY", "EDGEQUAKE_LLM_PROVIDER"]
        .iter()
        .any(|k| std::env::var(k).map(|v| !v.is_empty()).unwrap_or(false))
}

// ── Inspect (no LLM) ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_sample() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    let report = inspect(path.to_string_lossy(), None).await.unwrap();
    println!("{:#?}", report.metadata);
    assert!(report.metadata.page_count > 0);
    assert!(!report.metadata.pdf_version.is_empty());
    for entry in &report.toc {
        assert!(entry.page < report.metadata.page_count);
    }
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let err = inspect("/definitely/not/here.pdf", None).await.unwrap_err();
    assert!(matches!(err, PdfMorphError::FileNotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_inspect_rejects_non_pdf() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");
    let err = inspect(path.to_string_lossy(), None).await.unwrap_err();
    assert!(matches!(err, PdfMorphError::NotAPdf { .. }), "{err}");
}

// ── Conversion (live LLM) ────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_sample_markdown() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    if !has_provider_key() {
        println!("SKIP: no provider API key in environment");
        return;
    }
    let config = ConversionConfig::builder().chunk_size(2).build().unwrap();
    let out = output_dir().join("sample.md");
    let output = convert_to_file(path.to_string_lossy(), &out, &config)
        .await
        .unwrap();

    println!(
        "{} pages, {} chunks, {} images, {} figures",
        output.stats.total_pages,
        output.stats.chunks,
        output.stats.embedded_images,
        output.stats.drawing_regions
    );
    assert!(output.stats.recognized_pages > 0);
    assert!(!output.text.trim().is_empty());
    assert!(!output.text.contains("<markdown>"));
    assert_eq!(std::fs::read_to_string(&out).unwrap(), output.text);

    for region in &output.images {
        assert!(output.text.contains(region.name()) || !region.bytes().is_empty());
    }
}

#[tokio::test]
async fn test_convert_sample_latex() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    if !has_provider_key() {
        println!("SKIP: no provider API key in environment");
        return;
    }
    let config = ConversionConfig::builder()
        .format(OutputFormat::Latex)
        .extract_drawings(false)
        .build()
        .unwrap();
    let output = convert(path.to_string_lossy(), &config).await.unwrap();
    assert!(output.text.starts_with("\\documentclass{article}"));
    assert!(output.text.trim_end().ends_with("\\end{document}"));
    std::fs::write(output_dir().join("sample.tex"), &output.text).ok();
}

// ── pdfium adapter ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_with_password_on_plain_pdf() {
    let path = e2e_skip_unless_ready!(sample_pdf());
    // pdfium ignores a password for unencrypted files; the borrowed password
    // must live as long as the open document.
    let password = String::from("unused");
    let report = inspect(path.to_string_lossy(), Some(password.as_str())).await.unwrap();
    assert!(report.metadata.page_count > 0);
}

/// A PDF whose figures are placed as form XObjects (e.g. plots included with
/// `\includegraphics`), set with `PDFMORPH_E2E_FORM_PDF`.
#[test]
fn test_drawings_inside_form_xobjects() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let Ok(path) = std::env::var("PDFMORPH_E2E_FORM_PDF").map(PathBuf::from) else {
        println!("SKIP: set PDFMORPH_E2E_FORM_PDF to a PDF with form XObject figures");
        return;
    };
    let pdfium = bind_pdfium().unwrap();
    let doc = PdfiumDocument::open(&pdfium, &path, None).unwrap();
    let total: usize = (0..doc.page_count())
        .map(|p| doc.drawings(p).unwrap().len())
        .sum();
    assert!(total > 0, "no path objects found in {}", path.display());
}
