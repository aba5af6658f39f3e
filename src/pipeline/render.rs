//! Built-in line renderer: Markdown text → PDF via printpdf.
//!
//! The fallback backend. It never shells out and never needs fonts on disk:
//! text is classified line by line ([`crate::pipeline::blocks`]), resolved
//! through the configured markup mode ([`crate::pipeline::markup`]), laid
//! out ([`crate::pipeline::layout`]) and drawn with the built-in Helvetica
//! faces.
//!
//! ## Why spawn_blocking?
//!
//! Layout and PDF serialisation are CPU-bound and printpdf is synchronous.
//! [`render_to_file`] moves the work onto tokio's blocking pool so a large
//! document does not stall the HTTP server's worker threads.

use crate::config::ConversionConfig;
use crate::error::RenderError;
use crate::output::RenderSummary;
use crate::pipeline::blocks::{self, BlockStyle};
use crate::pipeline::layout::{self, FontFace, Layout, PageGeometry};
use crate::pipeline::markup;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

const LAYER_NAME: &str = "Layer 1";

/// A rendered document held in memory.
#[derive(Debug)]
pub struct RenderedPdf {
    pub bytes: Vec<u8>,
    pub summary: RenderSummary,
}

/// Render `text` to PDF bytes.
///
/// # Errors
/// Malformed markup in any line (in `Inline` mode) aborts the whole document.
pub fn render_document(
    text: &str,
    title: &str,
    config: &ConversionConfig,
) -> Result<RenderedPdf, RenderError> {
    let blocks = blocks::classify(text);

    let paragraphs = blocks
        .iter()
        .enumerate()
        .map(|(idx, block)| {
            markup::resolve(&block.text, config.markup)
                .map(|resolved| (block.style, resolved))
                .map_err(|detail| RenderError::Markup {
                    line: idx + 1,
                    detail,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let geometry = PageGeometry::new(config.page_size, config.margin_pt);
    let laid_out = layout::layout(&paragraphs, geometry);
    debug!(
        "Laid out {} blocks on {} pages",
        blocks.len(),
        laid_out.page_count()
    );

    let bytes = write_pdf(&laid_out, title)?;

    Ok(RenderedPdf {
        bytes,
        summary: RenderSummary {
            styles: blocks.iter().map(|b| b.style).collect(),
            page_count: laid_out.page_count(),
        },
    })
}

/// Render `text` and write the PDF to `output`.
///
/// Runs inside `spawn_blocking`. The PDF is written to a temporary sibling
/// and renamed into place, so `output` either holds a complete PDF or is
/// untouched.
pub async fn render_to_file(
    text: &str,
    output: &Path,
    config: &ConversionConfig,
) -> Result<RenderSummary, RenderError> {
    let text = text.to_string();
    let output = output.to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || render_to_file_blocking(&text, &output, &config))
        .await
        .map_err(|e| RenderError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of [`render_to_file`].
pub fn render_to_file_blocking(
    text: &str,
    output: &Path,
    config: &ConversionConfig,
) -> Result<RenderSummary, RenderError> {
    let title = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    let rendered = render_document(text, &title, config)?;
    write_atomically(output, &rendered.bytes)?;

    info!(
        "Rendered {} blocks on {} pages → {}",
        rendered.summary.block_count(),
        rendered.summary.page_count,
        output.display()
    );
    Ok(rendered.summary)
}

fn write_atomically(output: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let write_err = |detail: String| RenderError::Write {
        path: output.to_path_buf(),
        detail,
    };

    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| write_err(e.to_string()))?;
    tmp.persist(output).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Draw a laid-out document with the built-in fonts.
fn write_pdf(laid_out: &Layout, title: &str) -> Result<Vec<u8>, RenderError> {
    let width = Mm(pt_to_mm(laid_out.geometry.width));
    let height = Mm(pt_to_mm(laid_out.geometry.height));

    let (doc, first_page, first_layer) =
        PdfDocument::new(title.to_string(), width, height, LAYER_NAME.to_string());
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Font(format!("Helvetica: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Font(format!("Helvetica-Bold: {e}")))?;

    for (idx, page) in laid_out.pages.iter().enumerate() {
        let (page_idx, layer_idx) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(width, height, LAYER_NAME.to_string())
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);

        for line in page.lines.iter().filter(|l| !l.text.is_empty()) {
            let spec = layout::style_spec(line.style);
            let font: &IndirectFontRef = match spec.face {
                FontFace::Helvetica => &regular,
                FontFace::HelveticaBold => &bold,
            };
            layer.use_text(
                line.text.clone(),
                spec.size,
                Mm(pt_to_mm(line.x)),
                Mm(pt_to_mm(line.y)),
                font,
            );
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| RenderError::Pdf(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| RenderError::Pdf(format!("buffer: {e}")))
}

fn pt_to_mm(pt: f32) -> f32 {
    pt * 25.4 / 72.0
}

/// Style sequence of `text` without rendering it.
pub fn block_styles(text: &str) -> Vec<BlockStyle> {
    blocks::classify(text).iter().map(|b| b.style).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarkupMode;

    const NOTES: &str = "# My Notes\n## Section One\nSome plain text.";

    #[test]
    fn renders_pdf_bytes() {
        let pdf = render_document(NOTES, "notes", &ConversionConfig::default()).unwrap();
        assert!(pdf.bytes.starts_with(b"%PDF"));
        assert_eq!(
            pdf.summary.styles,
            vec![BlockStyle::Title, BlockStyle::Heading2, BlockStyle::Normal]
        );
        assert_eq!(pdf.summary.page_count, 1);
    }

    #[test]
    fn rendering_is_repeatable() {
        let config = ConversionConfig::default();
        let a = render_document(NOTES, "notes", &config).unwrap();
        let b = render_document(NOTES, "notes", &config).unwrap();
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn literal_mode_accepts_markup_characters() {
        let pdf = render_document("Fish & chips < 3", "x", &ConversionConfig::default()).unwrap();
        assert_eq!(pdf.summary.block_count(), 1);
    }

    #[test]
    fn inline_mode_rejects_malformed_line() {
        let config = ConversionConfig::builder()
            .markup(MarkupMode::Inline)
            .build()
            .unwrap();
        let err = render_document("ok\nFish & chips", "x", &config).unwrap_err();
        match err {
            RenderError::Markup { line, .. } => assert_eq!(line, 2),
            other => panic!("expected markup error, got {other:?}"),
        }
    }

    #[test]
    fn long_documents_paginate() {
        let text = (0..200).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let pdf = render_document(&text, "long", &ConversionConfig::default()).unwrap();
        assert_eq!(pdf.summary.block_count(), 200);
        assert!(pdf.summary.page_count >= 4);
    }

    #[test]
    fn writes_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("notes.pdf");
        let summary = render_to_file_blocking(NOTES, &out, &ConversionConfig::default()).unwrap();
        assert_eq!(summary.block_count(), 3);
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // Only the PDF remains; the temporary sibling was renamed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_render_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bad.pdf");
        let config = ConversionConfig::builder()
            .markup(MarkupMode::Inline)
            .build()
            .unwrap();
        assert!(render_to_file_blocking("<oops", &out, &config).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn block_styles_matches_classification() {
        assert_eq!(
            block_styles("# a\n\n## b"),
            vec![BlockStyle::Title, BlockStyle::Normal, BlockStyle::Heading2]
        );
    }
}
