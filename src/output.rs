//! Result types returned by the orchestrator and the batch runner.

use crate::error::RenderError;
use crate::pipeline::blocks::BlockStyle;
use crate::pipeline::external::ExternalOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which backend produced a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// The external converter (pandoc by default).
    External,
    /// The built-in line renderer.
    Renderer,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::External => f.write_str("external converter"),
            Backend::Renderer => f.write_str("built-in renderer"),
        }
    }
}

/// What the built-in renderer produced for one document.
///
/// Two renders of the same text always yield equal summaries, which is the
/// property to compare instead of PDF bytes (printpdf stamps creation dates).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSummary {
    /// One entry per source line, in line order.
    pub styles: Vec<BlockStyle>,
    /// Pages in the written PDF.
    pub page_count: usize,
}

impl RenderSummary {
    pub fn block_count(&self) -> usize {
        self.styles.len()
    }
}

/// A PDF that exists on disk after a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// `<output_dir>/<source_basename_without_extension>.pdf`
    pub path: PathBuf,
    /// Backend that wrote `path`.
    pub backend: Backend,
    /// Why the external converter did not produce the PDF, when the renderer did.
    pub fallback_reason: Option<ExternalOutcome>,
    /// Present when the built-in renderer ran.
    pub render: Option<RenderSummary>,
    /// Wall-clock time for the whole conversion.
    pub duration_ms: u64,
}

/// Result of converting one readable document.
///
/// Input errors are reported separately as `Err(Md2PdfError)`; this type
/// only describes what happened once the text was in hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConversionOutcome {
    /// One backend produced the PDF.
    Converted(Artifact),
    /// Both backends gave up; nothing exists at the derived output path.
    Failed {
        external: ExternalOutcome,
        renderer: RenderError,
    },
}

impl ConversionOutcome {
    /// Path of the produced PDF, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConversionOutcome::Converted(a) => Some(&a.path),
            ConversionOutcome::Failed { .. } => None,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }

    /// Backend that produced the PDF, if any.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            ConversionOutcome::Converted(a) => Some(a.backend),
            ConversionOutcome::Failed { .. } => None,
        }
    }
}

/// Per-upload entry of a [`BatchReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    /// File name as uploaded (reduced to its final path component).
    pub file_name: String,
    #[serde(flatten)]
    pub result: DocumentResult,
}

impl DocumentReport {
    pub fn is_converted(&self) -> bool {
        matches!(self.result, DocumentResult::Converted { .. })
    }
}

/// Converted download or user-facing error for one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentResult {
    Converted {
        /// Download name, `<basename>.pdf` (or the renamed variant).
        pdf_name: String,
        backend: Backend,
        /// A later upload with the same base name overwrote this PDF on disk.
        collision: bool,
        /// PDF bytes, read before the batch's temporary directory was removed.
        #[serde(skip)]
        pdf: Vec<u8>,
        size_bytes: usize,
    },
    Failed {
        /// Message suitable for showing to the person who uploaded the file.
        message: String,
    },
}

/// Outcome of one batch of uploads, in upload order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub total_duration_ms: u64,
}

impl BatchReport {
    pub fn converted_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_converted()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.documents.len() - self.converted_count()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
