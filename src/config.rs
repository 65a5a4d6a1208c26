//! Configuration types for a conversion.
//!
//! All behaviour is controlled through [`ConversionConfig`], built via its
//! [`ConversionConfigBuilder`]. The decomposition knobs (zoom, chunking,
//! clustering) and the recognizer knobs (provider, model, retries) live side
//! by side so one value fully describes a run.

use crate::error::PdfMorphError;
use crate::pipeline::drawings::ClusterParams;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a conversion.
///
/// # Example
/// ```rust
/// use pdfmorph::{ConversionConfig, OutputFormat};
///
/// let config = ConversionConfig::builder()
///     .chunk_size(8)
///     .max_chunks(4)
///     .format(OutputFormat::Latex)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_chunks, 4);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Oversampling zoom for page rasters and drawing crops. Range 1.0–4.0. Default: 2.0.
    ///
    /// The clustering thresholds in [`ClusterParams`] are calibrated for the
    /// default; change both together.
    pub zoom: f32,

    /// Target pages per chunk. Default: 10.
    pub chunk_size: usize,

    /// Upper bound on the number of chunks, and so on concurrent recognizer
    /// streams. Default: 10.
    pub max_chunks: usize,

    /// Target markup format. Default: Markdown.
    pub format: OutputFormat,

    /// Separator between pages in the merged output. `None` uses the format's.
    pub page_separator: Option<String>,

    /// Extract embedded raster images. Default: true.
    pub extract_images: bool,

    /// Derive figure regions from vector drawings. Default: true.
    pub extract_drawings: bool,

    /// Vector clustering thresholds.
    pub clustering: ClusterParams,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per recognizer call inside the VLM adapter. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in the VLM adapter, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Replaces the format's built-in prompt.
    pub system_prompt: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            zoom: 2.0,
            chunk_size: 10,
            max_chunks: 10,
            format: OutputFormat::default(),
            page_separator: None,
            extract_images: true,
            extract_drawings: true,
            clustering: ClusterParams::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.3,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            password: None,
            system_prompt: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("zoom", &self.zoom)
            .field("chunk_size", &self.chunk_size)
            .field("max_chunks", &self.max_chunks)
            .field("format", &self.format)
            .field("page_separator", &self.page_separator)
            .field("extract_images", &self.extract_images)
            .field("extract_drawings", &self.extract_drawings)
            .field("clustering", &self.clustering)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Separator placed between non-empty pages.
    pub fn separator(&self) -> &str {
        self.page_separator
            .as_deref()
            .unwrap_or_else(|| self.format.separator())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = zoom;
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn max_chunks(mut self, n: usize) -> Self {
        self.config.max_chunks = n;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn page_separator(mut self, sep: impl Into<String>) -> Self {
        self.config.page_separator = Some(sep.into());
        self
    }

    pub fn extract_images(mut self, v: bool) -> Self {
        self.config.extract_images = v;
        self
    }

    pub fn extract_drawings(mut self, v: bool) -> Self {
        self.config.extract_drawings = v;
        self
    }

    pub fn clustering(mut self, params: ClusterParams) -> Self {
        self.config.clustering = params;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, PdfMorphError> {
        let c = &self.config;
        if !(1.0..=4.0).contains(&c.zoom) {
            return Err(PdfMorphError::InvalidConfig(format!(
                "Zoom must be 1.0–4.0, got {}",
                c.zoom
            )));
        }
        if c.chunk_size == 0 {
            return Err(PdfMorphError::InvalidConfig("Chunk size must be ≥ 1".into()));
        }
        if c.max_chunks == 0 {
            return Err(PdfMorphError::InvalidConfig(
                "Max chunk count must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target markup format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Latex,
}

impl OutputFormat {
    /// Blank-line separator between pages.
    pub fn separator(&self) -> &'static str {
        "\n\n"
    }

    /// Markers wrapping the payload in a recognizer response.
    pub fn markers(&self) -> (&'static str, &'static str) {
        match self {
            OutputFormat::Markdown => ("<markdown>", "</markdown>"),
            OutputFormat::Latex => ("<latex>", "</latex>"),
        }
    }

    /// File extension for written output.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Latex => "tex",
        }
    }

    /// Wrap the merged body into a complete document.
    pub fn finish(&self, body: &str) -> String {
        match self {
            OutputFormat::Markdown => body.to_string(),
            OutputFormat::Latex => format!(
                "\\documentclass{{article}}\n\\begin{{document}}\n\n{}\n\n\\end{{document}}",
                body
            ),
        }
    }
}
