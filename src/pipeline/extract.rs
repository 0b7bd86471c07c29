//! Raw text extraction: drive the rendering and OCR engines page by page.
//!
//! Two modes produce the same thing, one `String` of raw text with a newline
//! after every page:
//!
//! * **Direct** ([`extract_direct`]) reads the text layer and stitches
//!   fragments back together with [`assemble_page_text`].
//! * **OCR** ([`extract_ocr`]) rasterises each page and runs it through an
//!   [`OcrHandle`].
//!
//! Pages are processed strictly in order, one at a time. The OCR handle is a
//! single mutable resource and per-page progress must arrive without gaps or
//! reordering.

use crate::engine::{OcrHandle, PageSource, TextFragment};
use crate::error::ConvertError;
use crate::progress::{ProgressReport, Reporter, Stage};
use tracing::debug;

/// Fragments whose horizontal gap is below this are overlapping, not adjacent.
const GAP_TOLERANCE: f32 = -0.5;

/// Whether a space must be inferred between two adjacent fragments on the
/// same visual line.
fn needs_space(prev: &TextFragment, cur: &TextFragment) -> bool {
    if prev.text.ends_with(' ') || cur.text.starts_with(' ') {
        return false;
    }
    let same_line = (prev.y - cur.y).abs() < cur.height / 2.0;
    let gap = cur.x - prev.right();
    same_line && gap >= GAP_TOLERANCE
}

/// Rebuild one page of text from its fragments.
pub fn assemble_page_text(fragments: &[TextFragment]) -> String {
    let mut out = String::new();
    let mut prev: Option<&TextFragment> = None;

    for frag in fragments {
        if let Some(p) = prev {
            if !p.end_of_line && needs_space(p, frag) {
                out.push(' ');
            }
        }
        out.push_str(&frag.text);
        if frag.end_of_line {
            out.push('\n');
        }
        prev = Some(frag);
    }

    out
}

/// Read the text layer of every page.
pub async fn extract_direct(
    source: &mut dyn PageSource,
    reporter: &Reporter,
) -> Result<String, ConvertError> {
    let total = source.page_count();
    let mut raw = String::new();

    for idx in 0..total {
        let page_num = idx + 1;
        let fragments = source
            .page_fragments(idx)
            .await
            .map_err(|e| reporter.fail(Stage::Extract, e))?;

        let text = assemble_page_text(&fragments);
        debug!("Page {}: {} fragments → {} bytes", page_num, fragments.len(), text.len());
        raw.push_str(&text);
        raw.push('\n');

        reporter.emit(
            ProgressReport::new(Stage::Extract, format!("Extracted page {page_num}/{total}"))
                .with_page(page_num, total)
                .with_progress(page_num as f32 / total as f32),
        );
    }

    Ok(raw)
}

/// Rasterise and recognise every page with an already-created OCR handle.
///
/// The caller owns `handle` and terminates it whatever this returns.
pub async fn extract_ocr(
    source: &mut dyn PageSource,
    handle: &mut dyn OcrHandle,
    scale: f32,
    reporter: &Reporter,
) -> Result<String, ConvertError> {
    let total = source.page_count();
    let mut raw = String::new();

    for idx in 0..total {
        let page_num = idx + 1;

        reporter.emit(
            ProgressReport::new(Stage::Render, format!("Rendering page {page_num}/{total}"))
                .with_page(page_num, total),
        );
        let image = source
            .render_page(idx, scale)
            .await
            .map_err(|e| reporter.fail(Stage::Render, e))?;

        reporter.emit(
            ProgressReport::new(Stage::Recognize, format!("Recognising page {page_num}/{total}"))
                .with_page(page_num, total)
                .with_progress(idx as f32 / total as f32),
        );
        let text = handle
            .recognize(&image)
            .await
            .map_err(|e| reporter.fail(Stage::Recognize, into_recognition_failure(e, page_num)))?;

        debug!(
            "Page {}: {}x{} px → {} bytes of OCR text",
            page_num,
            image.width(),
            image.height(),
            text.len()
        );
        raw.push_str(&text);
        raw.push('\n');
    }

    Ok(raw)
}

/// Attach the page number to an OCR error that was raised without one.
fn into_recognition_failure(err: ConvertError, page: usize) -> ConvertError {
    match err {
        ConvertError::RecognitionFailure { detail, .. } => {
            ConvertError::RecognitionFailure { page, detail }
        }
        other => ConvertError::RecognitionFailure {
            page,
            detail: other.to_string(),
        },
    }
}
