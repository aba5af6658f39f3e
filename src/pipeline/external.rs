//! External converter: hand the whole document to a full Markdown engine.
//!
//! The preferred backend. [`PandocConverter`] pipes the Markdown into
//! `pandoc --from markdown --output <path>` and lets pandoc (and its LaTeX
//! engine) do real Markdown rendering. The result is a tagged
//! [`ExternalOutcome`] rather than an error: a missing pandoc binary is an
//! ordinary deployment situation, and the orchestrator must be able to tell
//! it apart from pandoc rejecting a document.
//!
//! ## Timeout
//!
//! A LaTeX run can hang on pathological input. The child is spawned with
//! `kill_on_drop`, so when [`tokio::time::timeout`] gives up the process is
//! killed rather than left running in the background.

use crate::config::ConversionConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Tagged result of one external conversion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExternalOutcome {
    /// A PDF now exists at the output path.
    Converted,
    /// The converter is not installed, not executable, or disabled.
    Unavailable { reason: String },
    /// The converter ran and did not produce a PDF.
    Failed { detail: String },
}

impl ExternalOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, ExternalOutcome::Converted)
    }
}

impl fmt::Display for ExternalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalOutcome::Converted => f.write_str("converted"),
            ExternalOutcome::Unavailable { reason } => write!(f, "unavailable: {reason}"),
            ExternalOutcome::Failed { detail } => write!(f, "conversion error: {detail}"),
        }
    }
}

/// A Markdown→PDF engine living outside this process.
///
/// Implementations must never panic on bad input and must not leave a
/// partial file at `output` unless they return [`ExternalOutcome::Converted`].
#[async_trait]
pub trait ExternalConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Convert `markdown` into a PDF at `output`.
    async fn convert(&self, markdown: &str, output: &Path) -> ExternalOutcome;
}

/// Runs the pandoc command-line tool.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: PathBuf,
    pdf_engine: Option<String>,
    extra_args: Vec<String>,
    timeout: Duration,
}

impl PandocConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            pdf_engine: None,
            extra_args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Build a converter from the pandoc settings in `config`.
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            program: config.pandoc_path.clone(),
            pdf_engine: config.pdf_engine.clone(),
            extra_args: config.pandoc_args.clone(),
            timeout: Duration::from_secs(config.external_timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Command-line arguments for converting into `output`.
    pub fn args(&self, output: &Path) -> Vec<String> {
        let mut args = vec![
            "--from".to_string(),
            "markdown".to_string(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
        ];
        if let Some(ref engine) = self.pdf_engine {
            args.push(format!("--pdf-engine={engine}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    async fn run(&self, markdown: &str, output: &Path) -> ExternalOutcome {
        let mut child = match Command::new(&self.program)
            .args(self.args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return ExternalOutcome::Unavailable {
                    reason: format!("cannot run '{}': {e}", self.program.display()),
                };
            }
            Err(e) => {
                return ExternalOutcome::Failed {
                    detail: format!("failed to start '{}': {e}", self.program.display()),
                };
            }
        };

        // Feed stdin then close it so pandoc sees EOF. A write error means
        // the child already exited; its status explains why. The write sits
        // inside the timeout too: a child that never reads would block it.
        let io = async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(markdown.as_bytes()).await {
                    debug!("pandoc stdin closed early: {}", e);
                }
            }
            child.wait_with_output().await
        };

        let waited = timeout(self.timeout, io).await;
        let output_result = match waited {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                return ExternalOutcome::Failed {
                    detail: format!("waiting for pandoc failed: {e}"),
                }
            }
            Err(_) => {
                return ExternalOutcome::Failed {
                    detail: format!("timed out after {}s", self.timeout.as_secs()),
                }
            }
        };

        if !output_result.status.success() {
            let stderr = String::from_utf8_lossy(&output_result.stderr);
            let stderr = stderr.trim();
            return ExternalOutcome::Failed {
                detail: if stderr.is_empty() {
                    format!("pandoc exited with {}", output_result.status)
                } else {
                    format!("pandoc exited with {}: {}", output_result.status, stderr)
                },
            };
        }

        if !output.is_file() {
            return ExternalOutcome::Failed {
                detail: "pandoc reported success but wrote no output".into(),
            };
        }

        ExternalOutcome::Converted
    }
}

#[async_trait]
impl ExternalConverter for PandocConverter {
    fn name(&self) -> &str {
        "pandoc"
    }

    async fn convert(&self, markdown: &str, output: &Path) -> ExternalOutcome {
        let outcome = self.run(markdown, output).await;
        if !outcome.is_converted() {
            remove_partial_output(output).await;
        }
        outcome
    }
}

/// Delete whatever a failed converter left at `output`.
pub(crate) async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!("Removed partial output {}", output.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
    }
}
