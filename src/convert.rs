//! Conversion orchestrator: external converter first, built-in renderer second.
//!
//! Per document the orchestrator walks a fixed path and never revisits a
//! state:
//!
//! ```text
//! Unconverted ─▶ ExternalAttempted ─┬─▶ Success
//!                                   └─▶ RendererAttempted ─┬─▶ Success
//!                                                          └─▶ Failed
//! ```
//!
//! There are no retries; the fallback is the only resilience mechanism.
//! When the external converter succeeds the renderer is not touched, and
//! when both fail nothing is left at the derived output path.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::output::{Artifact, Backend, ConversionOutcome};
use crate::pipeline::external::{self, ExternalConverter, ExternalOutcome, PandocConverter};
use crate::pipeline::{input, render};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Convert one Markdown file into `<output_dir>/<stem>.pdf`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ConversionOutcome)` once the text could be read, whether or not a
/// backend produced a PDF (check [`ConversionOutcome::path`]).
///
/// # Errors
/// Returns `Err(Md2PdfError)` only when the document cannot be attempted:
/// - source missing, unreadable, or not UTF-8
/// - source path has no file name
/// - output directory cannot be created
pub async fn convert_file(
    source: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutcome, Md2PdfError> {
    let source = source.as_ref();
    let output_dir = output_dir.as_ref();
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());

    let span = info_span!("convert", file = %name);
    async move {
        info!("Starting conversion: {}", source.display());

        // ── Step 1: Read source ──────────────────────────────────────────
        let text = input::read_source(source).await.inspect_err(|e| {
            error!("Cannot read source: {}", e);
        })?;

        // ── Step 2: Derive output path ───────────────────────────────────
        let output = input::output_path_for(source, output_dir)?;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| Md2PdfError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        // ── Steps 3–5: Backends ──────────────────────────────────────────
        Ok(run_backends(&text, &output, config, &name).await)
    }
    .instrument(span)
    .await
}

/// Convert Markdown text that is already in memory into a PDF at `output`.
///
/// The parent directory of `output` must exist.
pub async fn convert_text(
    markdown: &str,
    output: impl AsRef<Path>,
    config: &ConversionConfig,
) -> ConversionOutcome {
    let output = output.as_ref();
    let name = output
        .file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    convert_named(markdown, output, config, &name).await
}

/// [`convert_text`] with an explicit document name for logs and observer events.
pub(crate) async fn convert_named(
    markdown: &str,
    output: &Path,
    config: &ConversionConfig,
    name: &str,
) -> ConversionOutcome {
    run_backends(markdown, output, config, name)
        .instrument(info_span!("convert", file = %name))
        .await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally; do not call it from inside
/// an async context.
pub fn convert_file_sync(
    source: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutcome, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(source, output_dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The external converter configured for this run, if any.
///
/// A pre-built converter in the config wins over the pandoc settings.
fn resolve_external(config: &ConversionConfig) -> Option<Arc<dyn ExternalConverter>> {
    if !config.use_external {
        return None;
    }
    if let Some(ref converter) = config.external_converter {
        return Some(Arc::clone(converter));
    }
    Some(Arc::new(PandocConverter::from_config(config)))
}

async fn run_backends(
    markdown: &str,
    output: &Path,
    config: &ConversionConfig,
    name: &str,
) -> ConversionOutcome {
    let start = Instant::now();
    if let Some(ref obs) = config.observer {
        obs.on_document_start(name);
    }

    // ── External converter ───────────────────────────────────────────────
    let external_outcome = match resolve_external(config) {
        Some(converter) => {
            let outcome = converter.convert(markdown, output).await;
            match &outcome {
                ExternalOutcome::Converted => {
                    info!("Converted with {} → {}", converter.name(), output.display());
                    if let Some(ref obs) = config.observer {
                        obs.on_document_converted(name, Backend::External);
                    }
                    return ConversionOutcome::Converted(Artifact {
                        path: output.to_path_buf(),
                        backend: Backend::External,
                        fallback_reason: None,
                        render: None,
                        duration_ms: start.elapsed().as_millis() as u64,
                    });
                }
                ExternalOutcome::Unavailable { reason } => {
                    warn!("{} is unavailable, using built-in renderer: {}", converter.name(), reason);
                }
                ExternalOutcome::Failed { detail } => {
                    warn!("{} failed, using built-in renderer: {}", converter.name(), detail);
                }
            }
            // Injected converters are not bound by PandocConverter's cleanup.
            external::remove_partial_output(output).await;
            outcome
        }
        None => {
            info!("External converter disabled, using built-in renderer");
            ExternalOutcome::Unavailable {
                reason: "disabled by configuration".into(),
            }
        }
    };

    if let Some(ref obs) = config.observer {
        obs.on_backend_failed(name, Backend::External, &external_outcome.to_string());
    }

    // ── Built-in renderer ────────────────────────────────────────────────
    match render::render_to_file(markdown, output, config).await {
        Ok(summary) => {
            info!("Converted with built-in renderer → {}", output.display());
            if let Some(ref obs) = config.observer {
                obs.on_document_converted(name, Backend::Renderer);
            }
            ConversionOutcome::Converted(Artifact {
                path: output.to_path_buf(),
                backend: Backend::Renderer,
                fallback_reason: Some(external_outcome),
                render: Some(summary),
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        Err(render_err) => {
            error!(
                "All conversions failed (external: {}; renderer: {})",
                external_outcome, render_err
            );
            if let Some(ref obs) = config.observer {
                obs.on_backend_failed(name, Backend::Renderer, &render_err.to_string());
            }
            ConversionOutcome::Failed {
                external: external_outcome,
                renderer: render_err,
            }
        }
    }
}
