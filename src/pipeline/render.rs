//! pdfium-backed [`DocumentRenderer`]: text segments and page rasters.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! Every pdfium call runs inside `tokio::task::spawn_blocking`, which binds
//! the library, opens the document from the shared byte buffer and does one
//! unit of work. Documents are reopened per page so no pdfium object ever
//! crosses a thread boundary.
//!
//! ## Library resolution
//!
//! 1. [`PdfiumRenderer::with_library_path`]
//! 2. `PDFIUM_LIB_PATH`
//! 3. the system library search path

use crate::engine::{DocumentRenderer, PageSource, TextFragment};
use crate::error::ConvertError;
use crate::pipeline::input::check_magic;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Opens PDF documents through pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind this exact pdfium shared library instead of searching for one.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// User password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

#[async_trait]
impl DocumentRenderer for PdfiumRenderer {
    async fn open_document(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, ConvertError> {
        check_magic(&bytes, "payload")?;

        let doc = PdfiumDocument {
            bytes: Arc::new(bytes),
            library_path: self
                .library_path
                .clone()
                .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)),
            password: self.password.clone(),
            page_count: 0,
        };

        let page_count = doc
            .blocking(|document| Ok(document.pages().len() as usize))
            .await?;
        info!("PDF loaded: {} pages", page_count);

        Ok(Box::new(PdfiumDocument { page_count, ..doc }))
    }
}

/// An opened PDF. Holds the raw bytes; pdfium objects only live inside
/// blocking tasks.
struct PdfiumDocument {
    bytes: Arc<Vec<u8>>,
    library_path: Option<PathBuf>,
    password: Option<String>,
    page_count: usize,
}

impl PdfiumDocument {
    /// Run `f` against a freshly opened document on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, ConvertError>
    where
        T: Send + 'static,
        F: FnOnce(&PdfDocument<'_>) -> Result<T, ConvertError> + Send + 'static,
    {
        let bytes = Arc::clone(&self.bytes);
        let library_path = self.library_path.clone();
        let password = self.password.clone();

        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(library_path.as_deref())?;
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, password.as_deref())
                .map_err(|e| classify_load_error(e, password.is_some()))?;
            f(&document)
        })
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
    }
}

#[async_trait]
impl PageSource for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn page_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ConvertError> {
        self.blocking(move |document| {
            let page = document
                .pages()
                .get(pdfium_index(page_index)?)
                .map_err(|e| render_failed(page_index, e))?;
            let text = page.text().map_err(|e| render_failed(page_index, e))?;

            let mut fragments: Vec<TextFragment> = text
                .segments()
                .iter()
                .map(|segment| {
                    let bounds = segment.bounds();
                    TextFragment::new(
                        segment.text(),
                        bounds.left().value,
                        bounds.bottom().value,
                        bounds.width().value,
                        bounds.height().value,
                    )
                })
                .collect();
            mark_line_ends(&mut fragments);

            debug!("Page {}: {} text segments", page_index + 1, fragments.len());
            Ok(fragments)
        })
        .await
    }

    async fn render_page(&mut self, page_index: usize, scale: f32) -> Result<DynamicImage, ConvertError> {
        self.blocking(move |document| {
            let page = document
                .pages()
                .get(pdfium_index(page_index)?)
                .map_err(|e| render_failed(page_index, e))?;

            let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| render_failed(page_index, e))?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} at {}x → {}x{} px",
                page_index + 1,
                scale,
                image.width(),
                image.height()
            );
            Ok(image)
        })
        .await
    }
}

/// pdfium segments carry no line-break flag. A segment ends a line when the
/// next one sits on a different baseline (same half-height test the
/// assembler uses), and the last segment of the page always ends one.
fn mark_line_ends(fragments: &mut [TextFragment]) {
    let n = fragments.len();
    for i in 0..n {
        fragments[i].end_of_line = match fragments.get(i + 1) {
            Some(next) => (fragments[i].y - next.y).abs() >= next.height / 2.0,
            None => true,
        };
    }
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match library_path {
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| {
        ConvertError::engine_init(
            "pdfium",
            format!(
                "{:?}\nSet PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.",
                e
            ),
        )
    })?;
    Ok(Pdfium::new(bindings))
}

fn classify_load_error(e: PdfiumError, had_password: bool) -> ConvertError {
    let err_str = format!("{:?}", e);
    let reason = if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            "wrong password for encrypted PDF".to_string()
        } else {
            "PDF is encrypted and requires a password".to_string()
        }
    } else {
        format!("PDF is corrupt: {}", err_str)
    };
    ConvertError::InvalidInput { reason }
}

/// pdfium addresses pages with a `u16`.
fn pdfium_index(page_index: usize) -> Result<u16, ConvertError> {
    u16::try_from(page_index).map_err(|_| ConvertError::RenderFailed {
        page: page_index + 1,
        detail: format!("page index {} exceeds pdfium's limit of {}", page_index, u16::MAX),
    })
}

fn render_failed(page_index: usize, e: PdfiumError) -> ConvertError {
    ConvertError::RenderFailed {
        page: page_index + 1,
        detail: format!("{:?}", e),
    }
}
