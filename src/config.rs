//! Configuration types for Markdown-to-PDF conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct carries both backends'
//! knobs so the HTTP front end and the CLI can share a single value, and so
//! a log line of the config explains why two runs differ.

use crate::error::Md2PdfError;
use crate::pipeline::external::ExternalConverter;
use crate::progress::ObserverRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a Markdown-to-PDF conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use mdpdfusion::{ConversionConfig, MarkupMode, PageSize};
///
/// let config = ConversionConfig::builder()
///     .pdf_engine("xelatex")
///     .external_timeout_secs(60)
///     .page_size(PageSize::A4)
///     .markup(MarkupMode::Literal)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Try the external converter before the built-in renderer. Default: true.
    ///
    /// When false the external step reports `Unavailable` without spawning
    /// anything, and every document goes straight to the fallback renderer.
    pub use_external: bool,

    /// Program used as the external converter. Default: `pandoc` (looked up on `PATH`).
    pub pandoc_path: PathBuf,

    /// Value for pandoc's `--pdf-engine`. If None, pandoc picks its default (pdflatex).
    pub pdf_engine: Option<String>,

    /// Extra arguments appended to the pandoc command line.
    pub pandoc_args: Vec<String>,

    /// Upper bound on one external conversion, in seconds. Default: 120.
    ///
    /// LaTeX engines occasionally hang on pathological input; the child is
    /// killed when the bound is hit and the document falls back to the
    /// built-in renderer.
    pub external_timeout_secs: u64,

    /// Page size of documents produced by the built-in renderer. Default: Letter.
    pub page_size: PageSize,

    /// Page margin on all four sides, in points. Default: 72 (one inch).
    pub margin_pt: f32,

    /// How the built-in renderer treats markup characters in a line. Default: Literal.
    pub markup: MarkupMode,

    /// What the batch runner does when two uploads share a base name. Default: Overwrite.
    pub collision: CollisionPolicy,

    /// Pre-constructed external converter. Takes precedence over `pandoc_path`.
    pub external_converter: Option<Arc<dyn ExternalConverter>>,

    /// Receives per-document events. If None, no events are emitted.
    pub observer: Option<ObserverRef>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            use_external: true,
            pandoc_path: PathBuf::from("pandoc"),
            pdf_engine: None,
            pandoc_args: Vec::new(),
            external_timeout_secs: 120,
            page_size: PageSize::default(),
            margin_pt: 72.0,
            markup: MarkupMode::default(),
            collision: CollisionPolicy::default(),
            external_converter: None,
            observer: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("use_external", &self.use_external)
            .field("pandoc_path", &self.pandoc_path)
            .field("pdf_engine", &self.pdf_engine)
            .field("pandoc_args", &self.pandoc_args)
            .field("external_timeout_secs", &self.external_timeout_secs)
            .field("page_size", &self.page_size)
            .field("margin_pt", &self.margin_pt)
            .field("markup", &self.markup)
            .field("collision", &self.collision)
            .field(
                "external_converter",
                &self
                    .external_converter
                    .as_ref()
                    .map(|c| format!("<dyn ExternalConverter: {}>", c.name())),
            )
            .field("observer", &self.observer.as_ref().map(|_| "<dyn ConversionObserver>"))
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn use_external(mut self, v: bool) -> Self {
        self.config.use_external = v;
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pdf_engine = Some(engine.into());
        self
    }

    pub fn pandoc_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.pandoc_args.push(arg.into());
        self
    }

    pub fn pandoc_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.pandoc_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn external_timeout_secs(mut self, secs: u64) -> Self {
        self.config.external_timeout_secs = secs;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn margin_pt(mut self, margin: f32) -> Self {
        self.config.margin_pt = margin;
        self
    }

    pub fn markup(mut self, mode: MarkupMode) -> Self {
        self.config.markup = mode;
        self
    }

    pub fn collision(mut self, policy: CollisionPolicy) -> Self {
        self.config.collision = policy;
        self
    }

    pub fn external_converter(mut self, converter: Arc<dyn ExternalConverter>) -> Self {
        self.config.external_converter = Some(converter);
        self
    }

    pub fn observer(mut self, observer: ObserverRef) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.external_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "External timeout must be ≥ 1 second".into(),
            ));
        }
        if !c.margin_pt.is_finite() || c.margin_pt < 0.0 || c.margin_pt > 200.0 {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Margin must be 0–200 pt, got {}",
                c.margin_pt
            )));
        }
        if c.pandoc_path.as_os_str().is_empty() {
            return Err(Md2PdfError::InvalidConfig(
                "pandoc path must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Fixed page size used by the built-in renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    /// US Letter, 8.5 × 11 in. (default)
    #[default]
    Letter,
    /// ISO A4, 210 × 297 mm.
    A4,
}

impl PageSize {
    /// Page dimensions in points, `(width, height)`.
    pub fn dimensions_pt(self) -> (f32, f32) {
        match self {
            PageSize::Letter => (612.0, 792.0),
            PageSize::A4 => (595.28, 841.89),
        }
    }
}

/// How the built-in renderer treats markup-significant characters.
///
/// `Literal` draws the text exactly as written. `Inline` treats each line as
/// rich-text paragraph markup, so a stray `<` or `&` aborts the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MarkupMode {
    /// Draw every character verbatim. (default)
    #[default]
    Literal,
    /// Parse paragraph markup (`<b>`, `&amp;`, `<br/>`, …); reject malformed lines.
    Inline,
}

/// Behaviour when two uploads in one batch share a base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// The later document's PDF replaces the earlier one on disk. (default)
    ///
    /// Each batch report still carries its own bytes, read right after the
    /// document converted; the report is flagged as a collision.
    #[default]
    Overwrite,
    /// Append `-2`, `-3`, … to the output base name until it is unique.
    Rename,
}
