//! # mdpdfusion
//!
//! Convert Markdown documents to PDF.
//!
//! Each document is first handed to an external Markdown engine (pandoc,
//! which produces properly typeset output). When pandoc is missing, times
//! out, or rejects the document, a built-in line renderer takes over and
//! draws the text with the standard PDF fonts: `# ` lines become a centred
//! title, `## ` lines a section heading, everything else body text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .md
//!  │
//!  ├─ 1. Input     read UTF-8 source, derive <out_dir>/<stem>.pdf
//!  ├─ 2. External  pandoc --from markdown --output <pdf>   (bounded by a timeout)
//!  │      └─ on Unavailable / Failed:
//!  ├─ 3. Blocks    classify each line: Title / Heading2 / Normal
//!  ├─ 4. Markup    literal text, or validated inline paragraph markup
//!  ├─ 5. Layout    word wrap + pagination (Letter or A4, 1 in margins)
//!  └─ 6. Render    printpdf, built-in Helvetica faces (spawn_blocking)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpdfusion::{convert_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let outcome = convert_file("notes.md", "out/", &config).await?;
//!     match outcome.path() {
//!         Some(pdf) => println!("wrote {}", pdf.display()),
//!         None => eprintln!("could not convert notes.md: {outcome:?}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum upload/download front end ([`server`]) |
//! | `cli`    | on      | The `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! mdpdfusion = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{convert_batch, Upload};
pub use config::{CollisionPolicy, ConversionConfig, ConversionConfigBuilder, MarkupMode, PageSize};
pub use convert::{convert_file, convert_file_sync, convert_text};
pub use error::{Md2PdfError, RenderError};
pub use output::{
    Artifact, Backend, BatchReport, ConversionOutcome, DocumentReport, DocumentResult,
    RenderSummary,
};
pub use pipeline::blocks::BlockStyle;
pub use pipeline::external::{ExternalConverter, ExternalOutcome, PandocConverter};
pub use progress::{ConversionObserver, NoopObserver, ObserverRef};
