//! Conversion entry points.
//!
//! A [`Converter`] owns one renderer, one OCR engine factory and one rewrite
//! orchestrator. Its three entry points share the same shape, a payload plus
//! [`CallOptions`], and all return text:
//!
//! | Entry point | Pipeline |
//! |-------------|----------|
//! | [`Converter::convert_fast`] | open → text layer → normalise → reconstruct |
//! | [`Converter::convert_ocr`] | open → OCR init → render + recognise → normalise → reconstruct |
//! | [`Converter::rewrite`] | engine lifecycle → generate |
//!
//! Every entry point takes the converter's conversion lock first, so calls on
//! one instance run one at a time and never share an OCR handle or engine.

use crate::config::{validate_render_scale, CallOptions, ConversionConfig};
use crate::engine::{DocumentRenderer, GenerativeBackend, OcrEngine, PageSource};
use crate::error::ConvertError;
use crate::pipeline::extract::{extract_direct, extract_ocr};
use crate::pipeline::input::{self, DEFAULT_DOWNLOAD_TIMEOUT_SECS};
use crate::pipeline::llm::LlmBackend;
use crate::pipeline::normalize::RuleEngine;
use crate::pipeline::ocr::TesseractOcr;
use crate::pipeline::reconstruct::{reconstruct, render_markdown, MarkdownBlock};
use crate::pipeline::render::PdfiumRenderer;
use crate::progress::{ProgressReport, Reporter, Stage};
use crate::rewrite::{EngineLifecycleState, RewriteOrchestrator};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::info;

/// How raw text is obtained from the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Read the embedded text layer.
    Direct,
    /// Rasterise pages and run OCR.
    Ocr,
}

/// Document-to-Markdown converter.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdftext2md::{CallOptions, ConversionConfig, Converter};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let converter = Converter::new(ConversionConfig::default());
/// let bytes = std::fs::read("invoice.pdf")?;
/// let markdown = converter.convert_fast(bytes, &CallOptions::new()).await?;
/// let polished = converter.rewrite(&markdown, &CallOptions::new()).await?;
/// println!("{}", polished);
/// # Ok(())
/// # }
/// ```
pub struct Converter {
    renderer: Arc<dyn DocumentRenderer>,
    ocr: Arc<dyn OcrEngine>,
    rewriter: RewriteOrchestrator,
    config: ConversionConfig,
    rule_engine: RuleEngine,
    lock: Mutex<()>,
}

impl Converter {
    /// Converter backed by pdfium, the `tesseract` binary and edgequake-llm.
    pub fn new(config: ConversionConfig) -> Self {
        Self::with_engines(
            config,
            Arc::new(PdfiumRenderer::new()),
            Arc::new(TesseractOcr::new()),
            Arc::new(LlmBackend::new()),
        )
    }

    /// Converter backed by caller-supplied engines.
    pub fn with_engines(
        config: ConversionConfig,
        renderer: Arc<dyn DocumentRenderer>,
        ocr: Arc<dyn OcrEngine>,
        backend: Arc<dyn GenerativeBackend>,
    ) -> Self {
        let rule_engine = RuleEngine::new(&config.post_process_rules, config.split_camel_case);
        Self {
            renderer,
            ocr,
            rewriter: RewriteOrchestrator::new(backend),
            config,
            rule_engine,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Fast path: read the document's text layer.
    pub async fn convert_fast(&self, bytes: Vec<u8>, options: &CallOptions) -> Result<String, ConvertError> {
        self.convert(bytes, ExtractionMode::Direct, options).await
    }

    /// OCR path: rasterise and recognise every page.
    pub async fn convert_ocr(&self, bytes: Vec<u8>, options: &CallOptions) -> Result<String, ConvertError> {
        self.convert(bytes, ExtractionMode::Ocr, options).await
    }

    /// Convert with either mode and serialise the result.
    pub async fn convert(
        &self,
        bytes: Vec<u8>,
        mode: ExtractionMode,
        options: &CallOptions,
    ) -> Result<String, ConvertError> {
        let blocks = self.convert_to_blocks(bytes, mode, options).await?;
        Ok(render_markdown(&blocks))
    }

    /// Convert with either mode, stopping before serialisation.
    pub async fn convert_to_blocks(
        &self,
        bytes: Vec<u8>,
        mode: ExtractionMode,
        options: &CallOptions,
    ) -> Result<Vec<MarkdownBlock>, ConvertError> {
        let _guard = self.lock.lock().await;
        let reporter = self.reporter(options);
        let start = Instant::now();

        // ── Step 1: Open document ────────────────────────────────────────────
        let mut source = self
            .renderer
            .open_document(bytes)
            .await
            .map_err(|e| reporter.fail(Stage::Start, e))?;
        let total_pages = source.page_count();
        info!("Starting {:?} conversion: {} pages", mode, total_pages);
        reporter.emit(ProgressReport {
            total_pages: Some(total_pages),
            ..ProgressReport::new(Stage::Start, format!("Opened document with {total_pages} pages"))
        });

        // ── Step 2: Extract raw text ─────────────────────────────────────────
        let raw = match mode {
            ExtractionMode::Direct => extract_direct(source.as_mut(), &reporter).await?,
            ExtractionMode::Ocr => self.extract_with_ocr(source.as_mut(), options, &reporter).await?,
        };

        // ── Step 3: Normalise ────────────────────────────────────────────────
        reporter.emit(ProgressReport::new(
            Stage::Normalize,
            format!("Normalising {} bytes", raw.len()),
        ));
        let text = self.rule_engine.normalize(&raw, &options.post_process_rules);

        // ── Step 4: Reconstruct ──────────────────────────────────────────────
        reporter.emit(ProgressReport::new(Stage::Reconstruct, "Reconstructing structure"));
        let blocks = reconstruct(&text);

        info!(
            "Conversion complete: {} pages → {} blocks in {}ms",
            total_pages,
            blocks.len(),
            start.elapsed().as_millis()
        );
        reporter.emit(
            ProgressReport::new(Stage::Complete, format!("Converted {total_pages} pages"))
                .with_progress(1.0),
        );
        Ok(blocks)
    }

    /// Refine Markdown with the generative engine.
    ///
    /// The engine is initialised on first use and kept loaded for subsequent
    /// calls with the same model.
    pub async fn rewrite(&self, text: &str, options: &CallOptions) -> Result<String, ConvertError> {
        let _guard = self.lock.lock().await;
        let reporter = self.reporter(options);

        let model_id = options.model_id.as_deref().unwrap_or(&self.config.model_id);
        let prompt_builder = options
            .prompt_builder
            .as_ref()
            .or(self.config.prompt_builder.as_ref());
        let engine_options = options
            .engine_options
            .as_ref()
            .unwrap_or(&self.config.engine_options);

        self.rewriter
            .rewrite(text, model_id, prompt_builder, engine_options, &reporter)
            .await
    }

    /// Release the generative engine, if one is loaded.
    pub async fn unload(&self) {
        let _guard = self.lock.lock().await;
        self.rewriter.unload().await;
    }

    pub async fn engine_state(&self) -> EngineLifecycleState {
        self.rewriter.state().await
    }

    /// Resolve `input` (path or URL) and convert it.
    pub async fn convert_file(
        &self,
        input_str: impl AsRef<str>,
        mode: ExtractionMode,
        options: &CallOptions,
    ) -> Result<String, ConvertError> {
        let bytes = input::resolve_input(input_str.as_ref(), DEFAULT_DOWNLOAD_TIMEOUT_SECS)
            .await
            .map_err(|e| self.reporter(options).fail(Stage::Start, e))?;
        self.convert(bytes, mode, options).await
    }

    /// Synchronous wrapper around [`Converter::convert`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn convert_sync(
        &self,
        bytes: Vec<u8>,
        mode: ExtractionMode,
        options: &CallOptions,
    ) -> Result<String, ConvertError> {
        tokio::runtime::Runtime::new()
            .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
            .block_on(self.convert(bytes, mode, options))
    }

    // ── Internal helpers ──────────────────────────────────────────────────

    /// Call-level callback wins over the instance default.
    fn reporter(&self, options: &CallOptions) -> Reporter {
        Reporter::new(
            options
                .progress
                .clone()
                .or_else(|| self.config.progress_callback.clone()),
        )
    }

    /// One OCR handle for the whole document, terminated on every exit path.
    async fn extract_with_ocr(
        &self,
        source: &mut dyn PageSource,
        options: &CallOptions,
        reporter: &Reporter,
    ) -> Result<String, ConvertError> {
        let language = options
            .ocr_language
            .as_deref()
            .unwrap_or(&self.config.ocr_language);
        let ocr_options = options
            .ocr_options
            .as_ref()
            .unwrap_or(&self.config.ocr_options);
        let scale = options.render_scale.unwrap_or(self.config.render_scale);
        validate_render_scale(scale).map_err(|e| reporter.fail(Stage::OcrInit, e))?;

        reporter.emit(ProgressReport::new(
            Stage::OcrInit,
            format!("Starting OCR worker ({language})"),
        ));
        let mut handle = self
            .ocr
            .create_handle(language, ocr_options)
            .await
            .map_err(|e| reporter.fail(Stage::OcrInit, e))?;

        let result = extract_ocr(source, handle.as_mut(), scale, reporter).await;
        handle.terminate().await;
        result
    }
}

/// Write Markdown to `path` atomically (temp file + rename), creating parent
/// directories as needed.
pub async fn write_output(path: impl AsRef<Path>, markdown: &str) -> Result<(), ConvertError> {
    let path = path.as_ref();
    let write_failed = |e: std::io::Error| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown)
        .await
        .map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_failed)?;

    info!("Wrote {} bytes to {}", markdown.len(), path.display());
    Ok(())
}
