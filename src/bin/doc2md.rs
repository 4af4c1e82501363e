//! CLI binary for edgequake-doc2md.
//!
//! A thin shim over the library crate: validates the files given on the
//! command line, maps flags onto `PipelineConfig` / `VisionConfig`, runs one
//! batch and writes the artifact into the output directory.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_doc2md::{
    BatchCoordinator, BatchOutcome, BatchProgressCallback, ConversionMode, Doc2MdError,
    DocumentCategory, Extractor, HttpVisionEngine, OutputMode, PageSeparator, PandocConverter,
    PdfiumPageSource, PipelineConfig, ProgressCallback, ProviderVisionEngine, SharedVisionEngine,
    UploadItem, VisionConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar over the items of the batch, one log line per finished item.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_items: usize) {
        self.bar.set_length(total_items as u64);
    }

    fn on_item_start(&self, _index: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_page_complete(
        &self,
        filename: &str,
        page_num: usize,
        total_pages: usize,
        error: Option<&str>,
    ) {
        self.bar
            .set_message(format!("{filename}  page {page_num}/{total_pages}"));
        if let Some(e) = error {
            self.bar
                .println(format!("    {} {}", red("!"), dim(&truncate(e, 100))));
        }
    }

    fn on_item_complete(&self, _index: usize, filename: &str, markdown_len: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            green("✓"),
            filename,
            dim(&format!("{markdown_len} chars"))
        ));
        self.bar.inc(1);
    }

    fn on_item_error(&self, _index: usize, filename: &str, error: &str) {
        self.bar
            .println(format!("  {} {}  {}", red("✗"), filename, red(&truncate(error, 100))));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _success_count: usize, _failure_count: usize) {
        self.bar.finish_and_clear();
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars - 1).collect();
        format!("{head}\u{2026}")
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One image → scan.md in the current directory
  doc2md scan.png

  # Several files → converted_<timestamp>.zip in ./out
  doc2md report.pdf invoice.jpg letter.docx -o out

  # Force every PDF page through the vision model
  doc2md --mode vision scanned.pdf

  # Hosted endpoint with a key
  LLM_ENDPOINT=https://api.openai.com LLM_API_KEY=sk-... LLM_MODEL=gpt-4o doc2md doc.pdf

  # Any edgequake-llm provider (reads its own *_API_KEY variable)
  doc2md --provider anthropic --model claude-sonnet-4-20250514 doc.pdf

  # Machine-readable summary
  doc2md --json a.pdf b.png > summary.json

SUPPORTED FILES:
  Images      jpg, jpeg, png, gif, bmp, webp   one vision call each
  PDF         pdf                              native text or vision, per page
  Documents   docx, odt, rtf                   converted by pandoc (must be on PATH)

PAGE SEPARATORS (--separator):
  none, hr (default), comment, or any custom text; "{page}" is replaced by
  the number of the page that follows, e.g. "---------- Page {page} ----------".

ENVIRONMENT VARIABLES:
  LLM_ENDPOINT            OpenAI-compatible base URL (default http://localhost:11434/v1)
  LLM_MODEL               Vision model (default qwen2.5vl:latest)
  LLM_API_KEY             Bearer token, if the endpoint needs one
  LLM_TIMEOUT             Per-call timeout in seconds (default 120)
  CONVERSION_MODE         auto, vision (alias: ocr) or native
  PDF_DPI_SCALE           Page render scale (default 2.0)
  PDF_PAGE_SEPARATOR      Page separator, see above
  ZIP_COMPRESSION_LEVEL   Deflate level 1-9, or 0 to store (default 9)
  EXTRACTION_PROMPT       Replaces the built-in transcription prompt
  MAX_CONCURRENT_UPLOADS  Maximum number of files per run (default 10)
  MAX_UPLOAD_SIZE         Maximum file size in bytes (default 16 MiB)
  PDFIUM_LIB_PATH         libpdfium file or the directory containing it
  RUST_LOG                Overrides the log filter
"#;

/// Convert images, PDFs and word-processor documents to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Convert images, PDFs and word-processor documents to Markdown",
    long_about = "Convert a batch of files to Markdown. Images are transcribed by a vision \
model; PDF pages are read from their text layer when it is usable and sent to the vision \
model otherwise; word-processor documents are converted by pandoc. One file produces \
<name>.md, several files produce a zip archive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert, in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Directory the artifact is written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "LLM_ENDPOINT", default_value = "http://localhost:11434/v1")]
    endpoint: String,

    /// Vision model name.
    #[arg(long, env = "LLM_MODEL", default_value = "qwen2.5vl:latest")]
    model: String,

    /// Bearer token for the endpoint.
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Use an edgequake-llm provider (openai, anthropic, gemini, ollama, …)
    /// instead of the raw endpoint.
    #[arg(long, env = "DOC2MD_PROVIDER")]
    provider: Option<String>,

    /// Per-call timeout in seconds.
    #[arg(long, env = "LLM_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Max output tokens per vision call.
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Retry a vision call once after a connection failure or timeout.
    #[arg(long)]
    retry: bool,

    /// Conversion mode for PDFs: auto, vision (alias ocr), native.
    #[arg(long, env = "CONVERSION_MODE", default_value = "auto", value_parser = parse_mode)]
    mode: ConversionMode,

    /// Render scale for pages sent to the vision model (0.5–6.0).
    #[arg(long, env = "PDF_DPI_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Page separator: none, hr, comment, or custom text.
    #[arg(long, env = "PDF_PAGE_SEPARATOR", default_value = "hr")]
    separator: String,

    /// Fail a PDF when more than this fraction of its pages failed (0.0–1.0).
    #[arg(long)]
    max_failed_pages: Option<f32>,

    /// Deflate level for zip archives (0 = store uncompressed).
    #[arg(long, env = "ZIP_COMPRESSION_LEVEL", default_value_t = 9,
          value_parser = clap::value_parser!(u8).range(0..=9))]
    compression_level: u8,

    /// Replace the built-in transcription prompt.
    #[arg(long, env = "EXTRACTION_PROMPT")]
    prompt: Option<String>,

    /// Files converted at once.
    #[arg(short, long, default_value_t = 1)]
    concurrency: usize,

    /// Pages of one PDF converted at once.
    #[arg(long, default_value_t = 1)]
    page_concurrency: usize,

    /// Maximum number of files per run.
    #[arg(long, env = "MAX_CONCURRENT_UPLOADS", default_value_t = 10)]
    max_files: usize,

    /// Maximum size of one file in bytes.
    #[arg(long, env = "MAX_UPLOAD_SIZE", default_value_t = 16 * 1024 * 1024)]
    max_size: u64,

    /// libpdfium file, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Print the batch summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn parse_mode(s: &str) -> Result<ConversionMode, String> {
    ConversionMode::parse(s).ok_or_else(|| format!("unknown mode '{s}' (auto, vision, native)"))
}

fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Validate and load uploads ────────────────────────────────────────
    let items = load_items(&cli).await?;

    // ── Collaborators ────────────────────────────────────────────────────
    let page_source = match cli.pdfium_lib {
        Some(ref path) => PdfiumPageSource::with_library_path(path),
        None => PdfiumPageSource::new(),
    };
    if items
        .iter()
        .any(|i| i.category == DocumentCategory::PaginatedDocument)
    {
        if let Err(e) = page_source.check() {
            warn!("{e}");
        }
    }

    let vision = build_vision(&cli)?;

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;
    debug!("{:?}", config);

    let extractor = Extractor::new(
        vision,
        Arc::new(page_source),
        Arc::new(PandocConverter::new().timeout(Duration::from_secs(cli.timeout))),
        config,
    );

    // ── Run ──────────────────────────────────────────────────────────────
    let outcome = BatchCoordinator::new(extractor).run(items).await;
    let written = write_artifact(&cli.output_dir, &outcome).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&outcome).context("Failed to serialise summary")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&outcome, written.as_deref());
    }

    if outcome.all_failed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Enforce the upload limits, then read every file in order.
async fn load_items(cli: &Cli) -> Result<Vec<UploadItem>> {
    if cli.files.len() > cli.max_files {
        bail!(
            "Too many files: {} given, at most {} allowed (MAX_CONCURRENT_UPLOADS)",
            cli.files.len(),
            cli.max_files
        );
    }

    let mut items = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?
            .to_string();
        if DocumentCategory::from_filename(&filename).is_none() {
            bail!("Unsupported file type: {filename}");
        }

        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot access {}", path.display()))?;
        if meta.len() > cli.max_size {
            bail!(
                "{filename} is {} bytes, larger than the {} byte limit (MAX_UPLOAD_SIZE)",
                meta.len(),
                cli.max_size
            );
        }

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let item = UploadItem::from_filename(filename.clone(), bytes)
            .with_context(|| format!("Unsupported file type: {filename}"))?;
        items.push(item);
    }
    Ok(items)
}

fn build_vision(cli: &Cli) -> Result<SharedVisionEngine> {
    if let Some(ref provider) = cli.provider {
        let engine = ProviderVisionEngine::from_name(provider, &cli.model, cli.timeout)
            .with_context(|| format!("Failed to create provider '{provider}'"))?
            .max_tokens(cli.max_tokens as usize);
        return Ok(Arc::new(engine));
    }

    let mut builder = VisionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .model(cli.model.clone())
        .timeout_secs(cli.timeout)
        .max_tokens(cli.max_tokens)
        .retry_transient(cli.retry);
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    let config = builder.build().context("Invalid vision configuration")?;
    let engine = HttpVisionEngine::new(config).context("Failed to create HTTP client")?;
    Ok(Arc::new(engine))
}

fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .mode(cli.mode)
        .render_scale(cli.scale)
        .page_separator(parse_separator(&cli.separator))
        .compression_level(cli.compression_level)
        .concurrency(cli.concurrency)
        .page_concurrency(cli.page_concurrency);
    if let Some(ref prompt) = cli.prompt {
        builder = builder.extraction_prompt(prompt.clone());
    }
    if let Some(ratio) = cli.max_failed_pages {
        builder = builder.max_failed_page_ratio(ratio);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

/// Write the artifact; a single failed upload has nothing to write.
async fn write_artifact(dir: &Path, outcome: &BatchOutcome) -> Result<Option<PathBuf>> {
    if outcome.output_mode == OutputMode::Single && outcome.success_count == 0 {
        return Ok(None);
    }
    let path = dir.join(&outcome.artifact_filename);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| Doc2MdError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;
    tokio::fs::write(&path, &outcome.artifact_bytes)
        .await
        .map_err(|source| Doc2MdError::OutputWriteFailed {
            path: path.clone(),
            source,
        })?;
    Ok(Some(path))
}

fn print_summary(outcome: &BatchOutcome, written: Option<&Path>) {
    let mark = if outcome.failure_count == 0 {
        green("✔")
    } else if outcome.success_count == 0 {
        red("✘")
    } else {
        red("⚠")
    };
    eprintln!(
        "{}  {}/{} files converted",
        mark,
        bold(&outcome.success_count.to_string()),
        outcome.total()
    );
    for e in &outcome.errors {
        eprintln!("   {} {}", red("✗"), e);
    }
    if let Some(path) = written {
        eprintln!("   →  {}", bold(&path.display().to_string()));
    }
}
