//! Conversion entry points.
//!
//! A conversion runs in two phases:
//!
//! 1. **Pre-pass** (blocking): bind pdfium, open the document, rasterise every
//!    page and extract its regions and outline entries. pdfium is not
//!    async-safe, so this runs inside `spawn_blocking` and the document is
//!    closed before anything is dispatched.
//! 2. **Dispatch** (async): the chunk scheduler feeds pages to the
//!    recognizer and the merger joins the results.
//!
//! [`convert_document`] skips the pdfium part and works on any
//! [`DocumentSource`], which is how the integration tests drive the pipeline.

use crate::config::ConversionConfig;
use crate::document::{bind_pdfium, DocumentSource, PdfiumDocument};
use crate::error::PdfMorphError;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, InspectReport, PageSummary};
use crate::page::Page;
use crate::pipeline::llm::VlmRecognizer;
use crate::pipeline::recognize::ContentRecognizer;
use crate::pipeline::prepass::{self, PrepassOptions};
use crate::pipeline::{chunk, input, merge, toc};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Convert a PDF file or URL using a vision LLM as the recognizer.
///
/// # Errors
/// Returns `Err(PdfMorphError)` only for fatal errors: unreadable input, a PDF
/// that cannot be opened, a page that cannot be rasterised, or no usable
/// provider. Recognition failures show up as failed pages in the output.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfMorphError> {
    let provider = resolve_provider(config).await?;
    let recognizer = Arc::new(VlmRecognizer::new(provider, config));
    convert_with(input_str, recognizer, config).await
}

/// Convert a PDF file or URL with a caller-supplied recognizer.
pub async fn convert_with(
    input_str: impl AsRef<str>,
    recognizer: Arc<dyn ContentRecognizer>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfMorphError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    let resolved = input::resolve(input_str, config.download_timeout_secs).await?;
    let path = resolved.path().to_path_buf();

    let prepass_start = Instant::now();
    let options = PrepassOptions::from(config);
    let password = config.password.clone();
    let (pages, metadata) = tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = PdfiumDocument::open(&pdfium, &path, password.as_deref())?;
        let pages = prepass::prepare_pages(&document, &options)?;
        Ok::<_, PdfMorphError>((pages, document.metadata()))
    })
    .await
    .map_err(|e| PdfMorphError::Internal(format!("Pre-pass task panicked: {}", e)))??;
    let prepass_ms = prepass_start.elapsed().as_millis() as u64;

    Ok(finish(pages, metadata, recognizer, config, prepass_ms, total_start).await)
}

/// Convert any [`DocumentSource`] with the given recognizer.
///
/// The pre-pass runs on the calling thread.
pub async fn convert_document(
    source: &dyn DocumentSource,
    recognizer: Arc<dyn ContentRecognizer>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfMorphError> {
    let total_start = Instant::now();
    let pages = prepass::prepare_pages(source, &PrepassOptions::from(config))?;
    let metadata = source.metadata();
    let prepass_ms = total_start.elapsed().as_millis() as u64;
    Ok(finish(pages, metadata, recognizer, config, prepass_ms, total_start).await)
}

async fn finish(
    pages: Vec<Page>,
    metadata: DocumentMetadata,
    recognizer: Arc<dyn ContentRecognizer>,
    config: &ConversionConfig,
    prepass_duration_ms: u64,
    total_start: Instant,
) -> ConversionOutput {
    let dispatch_start = Instant::now();
    let (settled, chunks) = chunk::dispatch(pages, recognizer, config).await;
    let dispatch_duration_ms = dispatch_start.elapsed().as_millis() as u64;

    let text = merge::assemble(&settled, config.format, config.separator());
    let images: Vec<_> = settled.iter().flat_map(|p| p.regions.iter().cloned()).collect();
    let summaries: Vec<PageSummary> = settled.iter().map(PageSummary::from).collect();

    let failed_pages = settled.iter().filter(|p| p.outcome().is_failed()).count();
    let mut stats = ConversionStats {
        total_pages: settled.len(),
        recognized_pages: settled.len() - failed_pages,
        failed_pages,
        chunks: chunks.len(),
        failed_chunks: chunks.iter().filter(|c| !c.succeeded).count(),
        toc_entries: settled.iter().map(|p| p.toc.len()).sum(),
        prepass_duration_ms,
        dispatch_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    stats.count_regions(&images);

    info!(
        "Conversion complete: {}/{} pages, {} regions, {}ms total",
        stats.recognized_pages,
        stats.total_pages,
        images.len(),
        stats.total_duration_ms
    );

    ConversionOutput {
        text,
        images,
        pages: summaries,
        chunks,
        metadata,
        stats,
    }
}

/// Convert and write the merged text to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfMorphError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.text).await?;
    Ok(output)
}

pub(crate) async fn write_atomic(path: &Path, text: &str) -> Result<(), PdfMorphError> {
    let write_err = |source| PdfMorphError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, text).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, PdfMorphError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfMorphError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Read metadata and the resolved outline without rendering or recognition.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    password: Option<&str>,
) -> Result<InspectReport, PdfMorphError> {
    let resolved = input::resolve(input_str.as_ref(), 120).await?;
    let path = resolved.path().to_path_buf();
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = PdfiumDocument::open(&pdfium, &path, password.as_deref())?;
        Ok(inspect_document(&document))
    })
    .await
    .map_err(|e| PdfMorphError::Internal(format!("Inspect task panicked: {}", e)))?
}

/// [`inspect`] for an already open [`DocumentSource`].
pub fn inspect_document(source: &dyn DocumentSource) -> InspectReport {
    InspectReport {
        metadata: source.metadata(),
        toc: toc::extract_toc(source),
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PdfMorphError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfMorphError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. `config.provider`, used as-is
/// 2. `config.provider_name` (+ `config.model`)
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. OpenAI when `OPENAI_API_KEY` is set
/// 5. `ProviderFactory::from_env` auto-detection
async fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, PdfMorphError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfMorphError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn atomic_write_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.md");
        write_atomic(&target, "# Hello").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "# Hello");
        assert!(!dir.path().join("nested/out.md.tmp").exists());
    }

    #[tokio::test]
    async fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.tex");
        std::fs::write(&target, "old").unwrap();
        write_atomic(&target, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }
}
