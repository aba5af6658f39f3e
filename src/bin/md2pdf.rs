//! CLI binary for mdpdfusion.
//!
//! A thin shim over the library crate: `convert` runs one batch and writes
//! the PDFs into a directory, `serve` starts the upload page. Both map their
//! flags to a `ConversionConfig`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mdpdfusion::server::{self, ServerOptions, DEFAULT_BIND};
use mdpdfusion::{
    convert_batch, Backend, BatchReport, CollisionPolicy, ConversionConfig, ConversionObserver,
    DocumentResult, MarkupMode, PageSize, Upload,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Renders a progress bar over the batch and one log line per document.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} files  {msg}",
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

impl ConversionObserver for CliObserver {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_documents} Markdown files…"))
        ));
    }

    fn on_document_start(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn on_backend_failed(&self, name: &str, backend: Backend, reason: &str) {
        if backend == Backend::External {
            self.bar
                .println(dim(&format!("  ↳ {name}: pandoc {reason}; using built-in renderer")));
        }
    }

    fn on_document_converted(&self, name: &str, backend: Backend) {
        self.bar
            .println(format!("  {} {:<32} {}", green("✓"), name, dim(&backend.to_string())));
        self.bar.inc(1);
    }

    fn on_document_failed(&self, name: &str, message: &str) {
        // Truncate very long messages to keep output tidy.
        let msg = if message.chars().count() > 100 {
            format!("{}\u{2026}", message.chars().take(99).collect::<String>())
        } else {
            message.to_string()
        };
        self.bar.println(format!("  {} {:<32} {}", red("✗"), name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total_documents: usize, _converted: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert two files into ./pdf
  md2pdf convert notes.md todo.md -o pdf

  # Never call pandoc; always use the built-in renderer
  md2pdf convert --no-external notes.md -o pdf

  # Use xelatex and A4 pages for the fallback
  md2pdf convert --pdf-engine xelatex --page-size a4 *.md -o pdf

  # Keep both PDFs when two inputs share a name
  md2pdf convert a/notes.md b/notes.md --collision rename -o pdf

  # Start the upload page on all interfaces
  md2pdf serve --bind 0.0.0.0:8501

ENVIRONMENT VARIABLES:
  MD2PDF_PANDOC       Path to the pandoc executable
  MD2PDF_PDF_ENGINE   pandoc --pdf-engine value
  MD2PDF_BIND         Listen address for `serve`
  RUST_LOG            Overrides the log filter (e.g. mdpdfusion=debug)
"#;

/// Convert Markdown files to PDF with pandoc and a built-in fallback renderer.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown files to PDF (pandoc first, built-in renderer as fallback)",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert Markdown files and write `<name>.pdf` files into a directory.
    Convert {
        /// Markdown files to convert (.md).
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Directory that receives the PDFs.
        #[arg(short, long, env = "MD2PDF_OUTPUT_DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Print the batch report as JSON on stdout.
        #[arg(long, env = "MD2PDF_JSON")]
        json: bool,

        /// Disable progress bar.
        #[arg(long, env = "MD2PDF_NO_PROGRESS")]
        no_progress: bool,

        #[command(flatten)]
        conversion: ConversionArgs,
    },

    /// Serve the upload/download web page.
    Serve {
        /// Listen address.
        #[arg(long, env = "MD2PDF_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        /// Largest accepted upload request, in MiB.
        #[arg(long, env = "MD2PDF_MAX_UPLOAD_MB", default_value_t = 200)]
        max_upload_mb: usize,

        /// Converted PDFs kept in memory for download.
        #[arg(long, env = "MD2PDF_STORE_CAPACITY", default_value_t = 256)]
        store_capacity: usize,

        #[command(flatten)]
        conversion: ConversionArgs,
    },
}

/// Flags shared by `convert` and `serve`.
#[derive(Args, Debug)]
struct ConversionArgs {
    /// Skip pandoc and always use the built-in renderer.
    #[arg(long, env = "MD2PDF_NO_EXTERNAL")]
    no_external: bool,

    /// pandoc executable.
    #[arg(long = "pandoc", env = "MD2PDF_PANDOC", default_value = "pandoc")]
    pandoc_path: PathBuf,

    /// pandoc --pdf-engine value (pdflatex, xelatex, wkhtmltopdf, …).
    #[arg(long, env = "MD2PDF_PDF_ENGINE")]
    pdf_engine: Option<String>,

    /// Extra argument passed to pandoc (repeatable).
    #[arg(long = "pandoc-arg", env = "MD2PDF_PANDOC_ARGS", value_delimiter = ' ', allow_hyphen_values = true)]
    pandoc_args: Vec<String>,

    /// Seconds before a pandoc run is killed.
    #[arg(long = "timeout", env = "MD2PDF_TIMEOUT", default_value_t = 120)]
    timeout_secs: u64,

    /// Page size of the built-in renderer.
    #[arg(long, env = "MD2PDF_PAGE_SIZE", value_enum, default_value = "letter")]
    page_size: PageSizeArg,

    /// Page margin of the built-in renderer, in points.
    #[arg(long = "margin", env = "MD2PDF_MARGIN", default_value_t = 72.0)]
    margin_pt: f32,

    /// How the built-in renderer treats `<`, `>` and `&`.
    #[arg(long, env = "MD2PDF_MARKUP", value_enum, default_value = "literal")]
    markup: MarkupArg,

    /// What to do when two inputs share a base name.
    #[arg(long, env = "MD2PDF_COLLISION", value_enum, default_value = "overwrite")]
    collision: CollisionArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    Letter,
    A4,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::Letter => PageSize::Letter,
            PageSizeArg::A4 => PageSize::A4,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum MarkupArg {
    Literal,
    Inline,
}

impl From<MarkupArg> for MarkupMode {
    fn from(v: MarkupArg) -> Self {
        match v {
            MarkupArg::Literal => MarkupMode::Literal,
            MarkupArg::Inline => MarkupMode::Inline,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CollisionArg {
    Overwrite,
    Rename,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(v: CollisionArg) -> Self {
        match v {
            CollisionArg::Overwrite => CollisionPolicy::Overwrite,
            CollisionArg::Rename => CollisionPolicy::Rename,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs during `convert`; `serve` logs
    // every request batch at INFO.
    let show_progress = match &cli.command {
        Command::Convert {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
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

    match cli.command {
        Command::Convert {
            files,
            output_dir,
            json,
            conversion,
            ..
        } => {
            let observer: Option<Arc<dyn ConversionObserver>> = if show_progress {
                Some(CliObserver::new() as Arc<dyn ConversionObserver>)
            } else {
                None
            };
            let config = build_config(&conversion, observer)?;
            run_convert(files, output_dir, json, cli.quiet, &config).await
        }
        Command::Serve {
            bind,
            max_upload_mb,
            store_capacity,
            conversion,
        } => {
            let config = build_config(&conversion, None)?;
            let options = ServerOptions {
                bind,
                max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
                store_capacity,
            };
            if !cli.quiet {
                eprintln!("{} Upload page at {}", cyan("◆"), bold(&format!("http://{bind}")));
            }
            server::serve(config, options)
                .await
                .context("HTTP server stopped")
        }
    }
}

async fn run_convert(
    files: Vec<PathBuf>,
    output_dir: PathBuf,
    json: bool,
    quiet: bool,
    config: &ConversionConfig,
) -> Result<()> {
    let mut uploads = Vec::with_capacity(files.len());
    let mut unreadable = 0usize;
    for path in &files {
        match tokio::fs::read(path).await {
            Ok(bytes) => uploads.push(Upload::new(path.to_string_lossy(), bytes)),
            Err(e) => {
                unreadable += 1;
                eprintln!("{} {}: {}", red("✗"), path.display(), e);
            }
        }
    }

    let report = convert_batch(uploads, config)
        .await
        .context("Conversion failed")?;

    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;
    let written = write_pdfs(&report, &output_dir).await?;

    if json {
        let out = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{out}");
    } else if !quiet {
        print_summary(&report, written, &output_dir);
    }

    let failed = report.failed_count() + unreadable;
    if failed > 0 {
        anyhow::bail!("{} of {} files could not be converted", failed, files.len());
    }
    Ok(())
}

/// Write every converted document into `output_dir`; returns how many were written.
async fn write_pdfs(report: &BatchReport, output_dir: &std::path::Path) -> Result<usize> {
    let mut written = 0;
    for doc in &report.documents {
        if let DocumentResult::Converted { pdf_name, pdf, .. } = &doc.result {
            let path = output_dir.join(pdf_name);
            tokio::fs::write(&path, pdf)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            written += 1;
        }
    }
    Ok(written)
}

fn print_summary(report: &BatchReport, written: usize, output_dir: &std::path::Path) {
    for doc in &report.documents {
        match &doc.result {
            DocumentResult::Converted {
                pdf_name,
                backend,
                collision,
                ..
            } => {
                let note = if *collision {
                    red(" (overwrote an earlier file with the same name)")
                } else {
                    String::new()
                };
                eprintln!(
                    "{} {} → {}  {}{}",
                    green("✓"),
                    doc.file_name,
                    pdf_name,
                    dim(&backend.to_string()),
                    note
                );
            }
            DocumentResult::Failed { message } => {
                eprintln!("{} {}", red("✗"), message);
            }
        }
    }
    eprintln!(
        "{}  {}/{} files  {}ms  →  {}",
        if report.failed_count() == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        written,
        report.documents.len(),
        report.total_duration_ms,
        bold(&output_dir.display().to_string()),
    );
}

/// Map CLI args to `ConversionConfig`.
fn build_config(
    args: &ConversionArgs,
    observer: Option<Arc<dyn ConversionObserver>>,
) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .use_external(!args.no_external)
        .pandoc_path(args.pandoc_path.clone())
        .pandoc_args(args.pandoc_args.iter().filter(|a| !a.is_empty()).cloned())
        .external_timeout_secs(args.timeout_secs)
        .page_size(args.page_size.into())
        .margin_pt(args.margin_pt)
        .markup(args.markup.into())
        .collision(args.collision.into());

    if let Some(ref engine) = args.pdf_engine {
        builder = builder.pdf_engine(engine.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}
