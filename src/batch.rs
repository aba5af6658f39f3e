//! Batch runner shared by the HTTP front end and the CLI.
//!
//! A batch is a list of uploaded files. Each one is staged into a temporary
//! directory owned by the batch, converted by the orchestrator, and its PDF
//! bytes are read back into the report before the directory is dropped.
//! Documents are processed one after another; a failure (or a panic) in one
//! document becomes a per-file message and the loop moves on.

use crate::config::{CollisionPolicy, ConversionConfig};
use crate::convert;
use crate::error::Md2PdfError;
use crate::output::{BatchReport, ConversionOutcome, DocumentReport, DocumentResult};
use crate::pipeline::input;
use futures::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// One uploaded file: the name the client sent and its raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-file message shown when a document produced no PDF.
pub fn failure_message(name: &str, detail: &str) -> String {
    format!("Could not convert {name} to PDF. Please check the input file. ({detail})")
}

/// Convert every upload in order and collect one report entry per upload.
///
/// An empty list returns an empty report without touching the file system.
///
/// # Errors
/// Only when the batch's temporary directory cannot be created. Problems
/// with individual documents are reported inside the [`BatchReport`].
pub async fn convert_batch(
    uploads: Vec<Upload>,
    config: &ConversionConfig,
) -> Result<BatchReport, Md2PdfError> {
    if uploads.is_empty() {
        info!("No uploads in batch");
        return Ok(BatchReport::default());
    }

    let start = Instant::now();
    let total = uploads.len();
    let workdir = tempfile::Builder::new()
        .prefix("md2pdf-")
        .tempdir()
        .map_err(|e| Md2PdfError::Internal(format!("Cannot create batch directory: {e}")))?;

    info!("Converting batch of {} uploads in {}", total, workdir.path().display());
    if let Some(ref obs) = config.observer {
        obs.on_batch_start(total);
    }

    let mut used_names = HashSet::new();
    let mut documents = Vec::with_capacity(total);

    for upload in uploads {
        let shown_name = input::sanitize_upload_name(&upload.file_name)
            .unwrap_or_else(|_| upload.file_name.clone());

        let attempt = AssertUnwindSafe(convert_one(
            &upload,
            workdir.path(),
            config,
            &mut used_names,
        ))
        .catch_unwind()
        .await;

        let result = match attempt {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                error!("Unexpected failure converting {}: {}", shown_name, detail);
                DocumentResult::Failed {
                    message: failure_message(&shown_name, "unexpected internal error"),
                }
            }
        };

        if let (DocumentResult::Failed { message }, Some(obs)) = (&result, &config.observer) {
            obs.on_document_failed(&shown_name, message);
        }
        documents.push(DocumentReport {
            file_name: shown_name,
            result,
        });
    }

    let report = BatchReport {
        documents,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} converted in {}ms",
        report.converted_count(),
        total,
        report.total_duration_ms
    );
    if let Some(ref obs) = config.observer {
        obs.on_batch_complete(total, report.converted_count());
    }
    Ok(report)
}

async fn convert_one(
    upload: &Upload,
    workdir: &Path,
    config: &ConversionConfig,
    used_names: &mut HashSet<String>,
) -> DocumentResult {
    // ── Validate name ────────────────────────────────────────────────────
    let name = match input::sanitize_upload_name(&upload.file_name) {
        Ok(name) => name,
        Err(e) => {
            warn!("Rejected upload: {}", e);
            return failed(&upload.file_name, &e);
        }
    };
    if !input::has_markdown_extension(&name) {
        let e = Md2PdfError::UnsupportedExtension { name: name.clone() };
        warn!("Rejected upload: {}", e);
        return failed(&name, &e);
    }

    // ── Stage and read ───────────────────────────────────────────────────
    let text = match stage_and_read(workdir, &name, &upload.bytes).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Cannot read {}: {}", name, e);
            return failed(&name, &e);
        }
    };

    // ── Pick the output name ─────────────────────────────────────────────
    let planned = match input::output_path_for(Path::new(&name), workdir) {
        Ok(p) => p,
        Err(e) => return failed(&name, &e),
    };
    let planned_name = file_name_of(&planned);
    let (pdf_name, collision) = match config.collision {
        CollisionPolicy::Overwrite => {
            let collision = !used_names.insert(planned_name.clone());
            if collision {
                warn!("{} overwrites an earlier {} in this batch", name, planned_name);
            }
            (planned_name, collision)
        }
        CollisionPolicy::Rename => {
            let unique = unique_name(&planned_name, used_names);
            used_names.insert(unique.clone());
            (unique, false)
        }
    };
    let output = workdir.join(&pdf_name);

    // ── Convert ──────────────────────────────────────────────────────────
    match convert::convert_named(&text, &output, config, &name).await {
        ConversionOutcome::Converted(artifact) => match tokio::fs::read(&artifact.path).await {
            Ok(pdf) => DocumentResult::Converted {
                pdf_name,
                backend: artifact.backend,
                collision,
                size_bytes: pdf.len(),
                pdf,
            },
            Err(e) => {
                error!("Converted PDF vanished: {}: {}", artifact.path.display(), e);
                DocumentResult::Failed {
                    message: failure_message(&name, &e.to_string()),
                }
            }
        },
        ConversionOutcome::Failed { external, renderer } => DocumentResult::Failed {
            message: failure_message(&name, &format!("{external}; {renderer}")),
        },
    }
}

async fn stage_and_read(workdir: &Path, name: &str, bytes: &[u8]) -> Result<String, Md2PdfError> {
    let staged = input::stage_upload(workdir, name, bytes).await?;
    input::read_source(&staged).await
}

fn failed(name: &str, err: &Md2PdfError) -> DocumentResult {
    DocumentResult::Failed {
        message: failure_message(name, &err.to_string()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `notes.pdf`, then `notes-2.pdf`, `notes-3.pdf`, …
fn unique_name(candidate: &str, used: &HashSet<String>) -> String {
    if !used.contains(candidate) {
        return candidate.to_string();
    }
    let stem = candidate.strip_suffix(".pdf").unwrap_or(candidate);
    (2..)
        .map(|n| format!("{stem}-{n}.pdf"))
        .find(|name| !used.contains(name))
        .unwrap_or_else(|| candidate.to_string())
}

fn panic_detail(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
