//! Input handling: read Markdown sources and name their outputs.
//!
//! Sources arrive either as paths (CLI, library callers) or as uploaded
//! bytes that the batch runner stages into a temporary directory. Either
//! way the orchestrator needs the text as UTF-8 and a PDF path derived from
//! the base name, and both steps live here so their error mapping is shared.

use crate::error::Md2PdfError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension accepted for uploads, compared case-insensitively.
pub const MARKDOWN_EXTENSION: &str = "md";

/// Read a source file as UTF-8 text.
///
/// # Errors
/// `FileNotFound`, `PermissionDenied`, `NotUtf8`, or `ReadFailed` for any
/// other I/O problem.
pub async fn read_source(path: &Path) -> Result<String, Md2PdfError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => Md2PdfError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => Md2PdfError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => Md2PdfError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let text = String::from_utf8(bytes).map_err(|e| Md2PdfError::NotUtf8 {
        path: path.to_path_buf(),
        detail: e.utf8_error().to_string(),
    })?;

    debug!("Read {} bytes from {}", text.len(), path.display());
    Ok(text)
}

/// `<output_dir>/<basename_without_extension>.pdf`
///
/// Only the last extension is replaced: `notes.v2.md` becomes `notes.v2.pdf`.
/// A name without an extension simply gains `.pdf`.
pub fn output_path_for(source: &Path, output_dir: &Path) -> Result<PathBuf, Md2PdfError> {
    let stem = source
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Md2PdfError::InvalidFileName {
            name: source.display().to_string(),
        })?;
    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(output_dir.join(name))
}

/// Reduce an uploaded file name to a safe final path component.
///
/// Browsers may send full client paths (`C:\Users\me\notes.md`); anything
/// before the last separator is discarded so an upload can never be staged
/// outside the batch directory.
pub fn sanitize_upload_name(name: &str) -> Result<String, Md2PdfError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." || base.contains('\0') {
        return Err(Md2PdfError::InvalidFileName {
            name: name.to_string(),
        });
    }
    Ok(base.to_string())
}

/// True when `name` carries the `.md` extension (any case) and a non-empty stem.
pub fn has_markdown_extension(name: &str) -> bool {
    let path = Path::new(name);
    let ext_ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MARKDOWN_EXTENSION));
    let stem_ok = path.file_stem().is_some_and(|s| !s.is_empty());
    ext_ok && stem_ok
}

/// Write an upload's bytes verbatim to `<dir>/<name>`.
pub async fn stage_upload(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, Md2PdfError> {
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| Md2PdfError::OutputWriteFailed {
            path: path.clone(),
            source: e,
        })?;
    debug!("Staged upload {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}
