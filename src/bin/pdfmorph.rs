//! CLI binary for pdfmorph.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, prints the merged document and optionally persists
//! the extracted image regions.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfmorph::{
    convert, convert_to_file, inspect, ConversionConfig, ConversionOutput,
    ConversionProgressCallback, OutputFormat, ProgressCallback,
};
use std::io::{self, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar counted in pages, advanced a whole chunk at a time. Chunks
/// finish out of order, so every line names its page range.
struct CliProgressCallback {
    bar: ProgressBar,
    failed_chunks: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages and extracting figures…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            failed_chunks: AtomicUsize::new(0),
        })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize, chunks: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_pages} pages in {chunks} chunks"))
        ));
    }

    fn on_chunk_complete(&self, chunk: usize, pages: Range<usize>, failed_pages: usize) {
        let note = if failed_pages == 0 {
            String::new()
        } else {
            red(&format!("  {failed_pages} without payload"))
        };
        self.bar.println(format!(
            "  {} Chunk {:>2}  pages {:>3}–{:<3}{}",
            green("✓"),
            chunk,
            pages.start,
            pages.end.saturating_sub(1),
            note
        ));
        self.bar.inc(pages.len() as u64);
    }

    fn on_chunk_error(&self, chunk: usize, pages: Range<usize>, error: &str) {
        self.failed_chunks.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Chunk {:>2}  pages {:>3}–{:<3}  {}",
            red("✗"),
            chunk,
            pages.start,
            pages.end.saturating_sub(1),
            red(&msg)
        ));
        self.bar.inc(pages.len() as u64);
    }

    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} pages converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} failed, {} chunks aborted)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
                self.failed_chunks.load(Ordering::SeqCst),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to stdout
  pdfmorph document.pdf

  # LaTeX to a file, figures saved next to it
  pdfmorph --format latex paper.pdf -o paper.tex --images-dir figures/

  # Smaller chunks, fewer concurrent requests
  pdfmorph --chunk-size 4 --max-chunks 3 book.pdf -o book.md

  # Convert from URL
  pdfmorph https://arxiv.org/pdf/1706.03762 -o attention.md

  # Metadata and outline only (no API key needed)
  pdfmorph --inspect-only document.pdf

  # JSON output with per-page and per-chunk reports
  pdfmorph --json document.pdf > output.json

CHUNKING:
  N pages are split into K = min(max-chunks, ceil(N / chunk-size)) chunks of
  ceil(N / K) pages. Chunks run concurrently; pages inside a chunk run in
  order. A recognition error fails every page of its chunk.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Convert PDF files and URLs to Markdown or LaTeX using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdfmorph",
    version,
    about = "Convert PDF files and URLs to Markdown or LaTeX using Vision LLMs",
    long_about = "Convert PDF documents (local files or URLs) to Markdown or LaTeX. Pages are \
rasterised, embedded images and vector figures are extracted as named PNG regions, the outline \
is attached to its pages, and pages are sent to a vision model in concurrent chunks.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the document to this file instead of stdout.
    #[arg(short, long, env = "PDFMORPH_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, env = "PDFMORPH_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Directory to write extracted image regions into.
    #[arg(long, env = "PDFMORPH_IMAGES_DIR")]
    images_dir: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rasterisation zoom (1.0–4.0). Figure thresholds are tuned for 2.0.
    #[arg(long, env = "PDFMORPH_ZOOM", default_value_t = 2.0)]
    zoom: f32,

    /// Target pages per chunk.
    #[arg(long, env = "PDFMORPH_CHUNK_SIZE", default_value_t = 10)]
    chunk_size: usize,

    /// Maximum number of chunks, i.e. concurrent recognition streams.
    #[arg(long, env = "PDFMORPH_MAX_CHUNKS", default_value_t = 10)]
    max_chunks: usize,

    /// Custom page separator (default: blank line).
    #[arg(long, env = "PDFMORPH_SEPARATOR")]
    separator: Option<String>,

    /// Skip embedded image extraction.
    #[arg(long, env = "PDFMORPH_NO_IMAGES")]
    no_images: bool,

    /// Skip vector figure extraction.
    #[arg(long, env = "PDFMORPH_NO_DRAWINGS")]
    no_drawings: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDFMORPH_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom prompt.
    #[arg(long, env = "PDFMORPH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per page.
    #[arg(long, env = "PDFMORPH_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDFMORPH_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries per page on LLM failure, before the chunk is failed.
    #[arg(long, env = "PDFMORPH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Output structured JSON (ConversionOutput) instead of the document.
    #[arg(long, env = "PDFMORPH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFMORPH_NO_PROGRESS")]
    no_progress: bool,

    /// Print metadata and outline only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFMORPH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFMORPH_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFMORPH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PDFMORPH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Markdown,
    Latex,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Latex => OutputFormat::Latex,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    ensure_pdfium(cli.quiet)?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let report = inspect(&cli.input, cli.password.as_deref())
            .await
            .context("Failed to inspect PDF")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            let meta = &report.metadata;
            println!("File:         {}", cli.input);
            if let Some(ref t) = meta.title {
                println!("Title:        {}", t);
            }
            if let Some(ref a) = meta.author {
                println!("Author:       {}", a);
            }
            println!("Pages:        {}", meta.page_count);
            println!("PDF Version:  {}", meta.pdf_version);
            if let Some(ref p) = meta.producer {
                println!("Producer:     {}", p);
            }
            if !report.toc.is_empty() {
                println!("Outline:");
                for entry in &report.toc {
                    println!(
                        "  {}{}  {}",
                        "  ".repeat(entry.level),
                        entry.title,
                        dim(&format!("p.{}", entry.page))
                    );
                }
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    // `-o paper` becomes paper.md / paper.tex.
    let output_path = cli.output.as_ref().map(|p| {
        if p.extension().is_none() {
            p.with_extension(config.format.extension())
        } else {
            p.clone()
        }
    });
    let output = if let Some(ref output_path) = output_path {
        convert_to_file(&cli.input, output_path, &config)
            .await
            .context("Conversion failed")?
    } else {
        convert(&cli.input, &config)
            .await
            .context("Conversion failed")?
    };

    if let Some(ref dir) = cli.images_dir {
        let written = write_images(&output, dir).await?;
        if !cli.quiet {
            eprintln!(
                "   {} images  →  {}",
                dim(&written.to_string()),
                bold(&dir.display().to_string())
            );
        }
    }

    if output_path.is_none() {
        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.text.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.text.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if !cli.quiet {
        print_summary(&output, output_path.as_deref(), show_progress);
    }
    Ok(())
}

/// Download pdfium on first run, with a byte progress bar unless quiet.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;
    dl_bar.finish_with_message("ready ✓");
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .format(cli.format.into())
        .zoom(cli.zoom)
        .chunk_size(cli.chunk_size)
        .max_chunks(cli.max_chunks)
        .extract_images(!cli.no_images)
        .extract_drawings(!cli.no_drawings)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref sep) = cli.separator {
        builder = builder.page_separator(unescape(sep));
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Allow `\n` and `\t` escapes in `--separator`.
fn unescape(s: &str) -> String {
    s.replace("\\n", "\n").replace("\\t", "\t")
}

async fn write_images(output: &ConversionOutput, dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for image in &output.images {
        let path = dir.join(image.name());
        tokio::fs::write(&path, image.bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(output.images.len())
}

fn print_summary(output: &ConversionOutput, path: Option<&Path>, show_progress: bool) {
    let stats = &output.stats;
    if let Some(path) = path {
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            stats.recognized_pages,
            stats.total_pages,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
    } else if !show_progress {
        eprintln!(
            "Converted {}/{} pages in {}ms",
            stats.recognized_pages, stats.total_pages, stats.total_duration_ms
        );
        if stats.failed_pages > 0 {
            eprintln!("  {} pages failed", stats.failed_pages);
        }
    }
    eprintln!(
        "   {} images, {} figures, {} outline entries  ·  pre-pass {}ms, recognition {}ms",
        dim(&stats.embedded_images.to_string()),
        dim(&stats.drawing_regions.to_string()),
        dim(&stats.toc_entries.to_string()),
        stats.prepass_duration_ms,
        stats.dispatch_duration_ms,
    );
}
