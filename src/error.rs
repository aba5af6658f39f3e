//! Error types for the mdpdfusion library.
//!
//! Two error types reflect two failure scopes:
//!
//! * [`Md2PdfError`] — the document (or the whole call) cannot be processed:
//!   unreadable input, bad upload name, invalid configuration. Returned as
//!   `Err(Md2PdfError)` from the `convert*` functions.
//!
//! * [`RenderError`] — the built-in renderer failed on one document. It never
//!   escapes the orchestrator; it is carried inside
//!   [`crate::output::ConversionOutcome::Failed`] so the caller still learns
//!   why both backends gave up.
//!
//! The external converter does not have an error type at all: it reports a
//! tagged [`crate::pipeline::external::ExternalOutcome`], because "pandoc is
//! not installed" is an expected condition rather than a fault.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a document (or a call) before any backend runs.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was read but its bytes are not valid UTF-8.
    #[error("File '{path}' is not valid UTF-8 text: {detail}")]
    NotUtf8 { path: PathBuf, detail: String },

    /// Any other I/O failure while reading the source.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Upload errors ─────────────────────────────────────────────────────
    /// The uploaded file name has no usable final component.
    #[error("Invalid upload file name '{name}'")]
    InvalidFileName { name: String },

    /// Only `.md` uploads are accepted.
    #[error("Unsupported file '{name}': only .md files can be converted")]
    UnsupportedExtension { name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a staged upload or an output file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Server errors ─────────────────────────────────────────────────────
    /// The HTTP front end could not bind or stopped with an I/O error.
    #[error("HTTP server on {addr} failed: {source}")]
    Server {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// True for errors caused by the source document itself rather than by
    /// the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Md2PdfError::FileNotFound { .. }
                | Md2PdfError::PermissionDenied { .. }
                | Md2PdfError::NotUtf8 { .. }
                | Md2PdfError::ReadFailed { .. }
                | Md2PdfError::InvalidFileName { .. }
                | Md2PdfError::UnsupportedExtension { .. }
        )
    }
}

/// A failure of the built-in line renderer.
///
/// Any of these aborts the whole document; the renderer never leaves a
/// partial PDF at the output path.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RenderError {
    /// A line contains paragraph markup the inline parser rejects.
    #[error("Line {line}: malformed paragraph markup: {detail}")]
    Markup { line: usize, detail: String },

    /// A built-in font could not be registered with the document.
    #[error("Font registration failed: {0}")]
    Font(String),

    /// printpdf failed to serialise the document.
    #[error("PDF serialisation failed: {0}")]
    Pdf(String),

    /// The finished PDF could not be written to disk.
    #[error("Failed to write PDF '{path}': {detail}")]
    Write { path: PathBuf, detail: String },

    /// The render task died.
    #[error("Internal render error: {0}")]
    Internal(String),
}
