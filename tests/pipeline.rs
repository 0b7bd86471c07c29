//! Integration tests for the conversion and rewrite pipelines.
//!
//! Every external engine is replaced by an in-memory fake, so these run
//! without pdfium, tesseract or an API key:
//!
//!   cargo test --test pipeline

use async_trait::async_trait;
use edgequake_pdftext2md::{
    CallOptions, ConversionConfig, ConvertError, Converter, DocumentRenderer, EngineInit,
    EngineLifecycleState, EngineOptions, GenerativeBackend, GenerativeEngine, InitProgress,
    MarkdownBlock, NormalizationRule, OcrEngine, OcrHandle, OcrOptions, PageSource,
    ProgressCallback, ProgressReport, PromptBuilder, Stage, TextFragment, DEFAULT_MODEL_ID,
    ExtractionMode,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PDF: &[u8] = b"%PDF-1.7 fake";

// ── Fake rendering engine ────────────────────────────────────────────────────

#[derive(Default)]
struct Concurrency {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

#[derive(Clone, Default)]
struct FakeRenderer {
    pages: Vec<Vec<TextFragment>>,
    fail_page: Option<usize>,
    delay: Option<Duration>,
    concurrency: Arc<Concurrency>,
}

impl FakeRenderer {
    fn with_pages(pages: Vec<Vec<TextFragment>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    /// `n` pages with no text layer, for OCR runs.
    fn blank(n: usize) -> Self {
        Self::with_pages(vec![Vec::new(); n])
    }
}

struct FakePages(FakeRenderer);

#[async_trait]
impl DocumentRenderer for FakeRenderer {
    async fn open_document(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, ConvertError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(ConvertError::InvalidInput {
                reason: "not a PDF".into(),
            });
        }
        Ok(Box::new(FakePages(self.clone())))
    }
}

#[async_trait]
impl PageSource for FakePages {
    fn page_count(&self) -> usize {
        self.0.pages.len()
    }

    async fn page_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ConvertError> {
        let c = &self.0.concurrency;
        let now = c.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        c.max_seen.fetch_max(now, Ordering::SeqCst);
        if let Some(d) = self.0.delay {
            tokio::time::sleep(d).await;
        }
        c.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.0.fail_page == Some(page_index + 1) {
            return Err(ConvertError::RenderFailed {
                page: page_index + 1,
                detail: "corrupt content stream".into(),
            });
        }
        Ok(self.0.pages[page_index].clone())
    }

    /// The raster's width carries the 1-based page number for the fake OCR.
    async fn render_page(&mut self, page_index: usize, _scale: f32) -> Result<DynamicImage, ConvertError> {
        Ok(DynamicImage::new_luma8(page_index as u32 + 1, 1))
    }
}

// ── Fake OCR engine ──────────────────────────────────────────────────────────

#[derive(Default)]
struct OcrStats {
    created: AtomicUsize,
    terminated: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

struct FakeOcr {
    texts: Vec<String>,
    fail_page: Option<usize>,
    fail_create: bool,
    stats: Arc<OcrStats>,
}

impl FakeOcr {
    fn new(texts: &[&str]) -> Self {
        Self {
            texts: texts.iter().map(|t| t.to_string()).collect(),
            fail_page: None,
            fail_create: false,
            stats: Arc::new(OcrStats::default()),
        }
    }
}

struct FakeOcrHandle {
    texts: Vec<String>,
    fail_page: Option<usize>,
    stats: Arc<OcrStats>,
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn create_handle(
        &self,
        language: &str,
        _options: &OcrOptions,
    ) -> Result<Box<dyn OcrHandle>, ConvertError> {
        if self.fail_create {
            return Err(ConvertError::EngineInitFailure {
                engine: "ocr".into(),
                detail: format!("traineddata for '{language}' missing"),
            });
        }
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        self.stats.languages.lock().unwrap().push(language.to_string());
        Ok(Box::new(FakeOcrHandle {
            texts: self.texts.clone(),
            fail_page: self.fail_page,
            stats: Arc::clone(&self.stats),
        }))
    }
}

#[async_trait]
impl OcrHandle for FakeOcrHandle {
    async fn recognize(&mut self, image: &DynamicImage) -> Result<String, ConvertError> {
        let page = image.width() as usize;
        if self.fail_page == Some(page) {
            return Err(ConvertError::Internal("worker crashed".into()));
        }
        Ok(self.texts[page - 1].clone())
    }

    async fn terminate(self: Box<Self>) {
        self.stats.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Fake generative engine ───────────────────────────────────────────────────

#[derive(Default)]
struct GenStats {
    inits: AtomicUsize,
    unloads: AtomicUsize,
    locations: Mutex<Vec<String>>,
}

#[derive(Default)]
struct FakeBackend {
    stats: Arc<GenStats>,
    fail_generate: bool,
}

struct FakeEngine {
    model_id: String,
    fail: bool,
    stats: Arc<GenStats>,
}

#[async_trait]
impl GenerativeBackend for FakeBackend {
    async fn create_engine(
        &self,
        init: &EngineInit,
        progress: InitProgress<'_>,
    ) -> Result<Box<dyn GenerativeEngine>, ConvertError> {
        self.stats.inits.fetch_add(1, Ordering::SeqCst);
        self.stats
            .locations
            .lock()
            .unwrap()
            .push(init.model_location.clone());
        progress(0.25, "downloading weights");
        progress(0.75, "compiling");
        progress(1.0, "ready");
        Ok(Box::new(FakeEngine {
            model_id: init.model_id.clone(),
            fail: self.fail_generate,
            stats: Arc::clone(&self.stats),
        }))
    }
}

#[async_trait]
impl GenerativeEngine for FakeEngine {
    async fn generate(&self, prompt: &str) -> Result<String, ConvertError> {
        if self.fail {
            return Err(ConvertError::GenerationFailure {
                model_id: self.model_id.clone(),
                detail: "context length exceeded".into(),
            });
        }
        Ok(format!("[{}] {}", self.model_id, prompt))
    }

    async fn unload(self: Box<Self>) {
        self.stats.unloads.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn line(text: &str, y: f32) -> TextFragment {
    TextFragment::new(text, 0.0, y, text.len() as f32 * 5.0, 10.0).with_end_of_line()
}

fn word(text: &str, x: f32, y: f32) -> TextFragment {
    TextFragment::new(text, x, y, text.len() as f32 * 5.0, 10.0)
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressReport>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cb: ProgressCallback = Arc::new(move |r: &ProgressReport| sink.lock().unwrap().push(r.clone()));
    (cb, seen)
}

fn stages(reports: &[ProgressReport]) -> Vec<Stage> {
    reports.iter().map(|r| r.stage).collect()
}

fn converter(renderer: FakeRenderer, ocr: FakeOcr, backend: FakeBackend) -> Converter {
    Converter::with_engines(
        ConversionConfig::default(),
        Arc::new(renderer),
        Arc::new(ocr),
        Arc::new(backend),
    )
}

fn invoice_pages() -> Vec<Vec<TextFragment>> {
    vec![
        vec![word("TOTAL", 0.0, 700.0), word("DUE", 28.0, 700.0).with_end_of_line()],
        vec![
            line("Payment is due in \u{FB01}ve days.", 700.0),
            line("Thank you for your \u{201C}business\u{201D}.", 686.0),
        ],
    ]
}

// ── Direct extraction ────────────────────────────────────────────────────────

#[tokio::test]
async fn fast_conversion_end_to_end() {
    let conv = converter(
        FakeRenderer::with_pages(invoice_pages()),
        FakeOcr::new(&[]),
        FakeBackend::default(),
    );
    let md = conv.convert_fast(PDF.to_vec(), &CallOptions::new()).await.unwrap();
    assert_eq!(
        md,
        "## TOTAL DUE\n\nPayment is due in five days. Thank you for your \"business\"."
    );
}

#[tokio::test]
async fn fast_conversion_reports_in_pipeline_order() {
    let (cb, seen) = recorder();
    let conv = converter(
        FakeRenderer::with_pages(invoice_pages()),
        FakeOcr::new(&[]),
        FakeBackend::default(),
    );
    conv.convert_fast(PDF.to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap();

    let reports = seen.lock().unwrap();
    assert_eq!(
        stages(&reports),
        vec![
            Stage::Start,
            Stage::Extract,
            Stage::Extract,
            Stage::Normalize,
            Stage::Reconstruct,
            Stage::Complete
        ]
    );
    assert_eq!(reports[0].total_pages, Some(2));
    let pages: Vec<_> = reports.iter().filter_map(|r| r.current_page).collect();
    assert_eq!(pages, vec![1, 2]);
    assert!(reports.iter().all(|r| !r.is_error()));
}

#[tokio::test]
async fn instance_callback_used_when_call_has_none() {
    let (cb, seen) = recorder();
    let config = ConversionConfig::builder().progress_callback(cb).build().unwrap();
    let conv = Converter::with_engines(
        config,
        Arc::new(FakeRenderer::with_pages(invoice_pages())),
        Arc::new(FakeOcr::new(&[])),
        Arc::new(FakeBackend::default()),
    );
    conv.convert_fast(PDF.to_vec(), &CallOptions::new()).await.unwrap();
    assert_eq!(seen.lock().unwrap().last().map(|r| r.stage), Some(Stage::Complete));
}

#[tokio::test]
async fn caller_rules_run_after_instance_rules() {
    let config = ConversionConfig::builder()
        .rule(NormalizationRule::new("TOTAL DUE", "AMOUNT DUE"))
        .build()
        .unwrap();
    let conv = Converter::with_engines(
        config,
        Arc::new(FakeRenderer::with_pages(invoice_pages())),
        Arc::new(FakeOcr::new(&[])),
        Arc::new(FakeBackend::default()),
    );
    let opts = CallOptions::new().rule(NormalizationRule::new("AMOUNT", "BALANCE"));
    let md = conv.convert_fast(PDF.to_vec(), &opts).await.unwrap();
    assert!(md.starts_with("## BALANCE DUE\n\n"), "got {md:?}");
}

#[tokio::test]
async fn non_pdf_payload_is_invalid_input_and_reported() {
    let (cb, seen) = recorder();
    let conv = converter(FakeRenderer::blank(1), FakeOcr::new(&[""]), FakeBackend::default());
    let err = conv
        .convert_fast(b"<html>".to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::InvalidInput { .. }));

    let reports = seen.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stage, Stage::Start);
    assert!(reports[0].is_error());
}

#[tokio::test]
async fn extraction_failure_aborts_without_partial_output() {
    let (cb, seen) = recorder();
    let renderer = FakeRenderer {
        fail_page: Some(2),
        ..FakeRenderer::with_pages(invoice_pages())
    };
    let conv = converter(renderer, FakeOcr::new(&[]), FakeBackend::default());
    let err = conv
        .convert_fast(PDF.to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::RenderFailed { page: 2, .. }), "got {err:?}");

    let reports = seen.lock().unwrap();
    let errors: Vec<_> = reports.iter().filter(|r| r.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].stage, Stage::Extract);
    assert!(!stages(&reports).contains(&Stage::Normalize));
}

#[tokio::test]
async fn blocks_are_available_before_serialisation() {
    let conv = converter(
        FakeRenderer::with_pages(invoice_pages()),
        FakeOcr::new(&[]),
        FakeBackend::default(),
    );
    let blocks = conv
        .convert_to_blocks(PDF.to_vec(), ExtractionMode::Direct, &CallOptions::new())
        .await
        .unwrap();
    assert_eq!(blocks[0], MarkdownBlock::Heading("TOTAL DUE".into()));
    assert_eq!(blocks.len(), 2);
}

#[tokio::test]
async fn convert_file_reads_local_pdf() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invoice.pdf");
    std::fs::write(&path, PDF).unwrap();

    let conv = converter(
        FakeRenderer::with_pages(invoice_pages()),
        FakeOcr::new(&[]),
        FakeBackend::default(),
    );
    let md = conv
        .convert_file(path.to_str().unwrap(), ExtractionMode::Direct, &CallOptions::new())
        .await
        .unwrap();
    assert!(md.starts_with("## TOTAL DUE\n\n"), "got {md:?}");
}

#[tokio::test]
async fn convert_file_missing_path_reported_at_start() {
    let (cb, seen) = recorder();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.pdf");

    let conv = converter(FakeRenderer::blank(1), FakeOcr::new(&[]), FakeBackend::default());
    let err = conv
        .convert_file(
            missing.to_str().unwrap(),
            ExtractionMode::Direct,
            &CallOptions::new().progress(cb),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::FileNotFound { .. }), "got {err:?}");

    let reports = seen.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stage, Stage::Start);
    assert!(reports[0].is_error());
}

#[test]
fn convert_sync_matches_async_result() {
    let conv = converter(
        FakeRenderer::with_pages(invoice_pages()),
        FakeOcr::new(&[]),
        FakeBackend::default(),
    );
    let md = conv
        .convert_sync(PDF.to_vec(), ExtractionMode::Direct, &CallOptions::new())
        .unwrap();
    assert_eq!(
        md,
        "## TOTAL DUE\n\nPayment is due in five days. Thank you for your \"business\"."
    );
}

// ── OCR extraction ───────────────────────────────────────────────────────────

fn ocr_invoice() -> FakeOcr {
    FakeOcr::new(&[
        "INVOICE\n\nItem  Price\nApple  1.50",
        "Thank you for your order.",
    ])
}

#[tokio::test]
async fn ocr_conversion_end_to_end() {
    let ocr = ocr_invoice();
    let stats = Arc::clone(&ocr.stats);
    let conv = converter(FakeRenderer::blank(2), ocr, FakeBackend::default());

    let md = conv.convert_ocr(PDF.to_vec(), &CallOptions::new()).await.unwrap();
    assert_eq!(
        md,
        "## INVOICE\n\n```\nItem  Price\nApple  1.50\n```\n\nThank you for your order."
    );
    assert_eq!(stats.created.load(Ordering::SeqCst), 1);
    assert_eq!(stats.terminated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn ocr_reports_before_render_and_recognise() {
    let (cb, seen) = recorder();
    let conv = converter(FakeRenderer::blank(2), ocr_invoice(), FakeBackend::default());
    conv.convert_ocr(PDF.to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap();

    assert_eq!(
        stages(&seen.lock().unwrap()),
        vec![
            Stage::Start,
            Stage::OcrInit,
            Stage::Render,
            Stage::Recognize,
            Stage::Render,
            Stage::Recognize,
            Stage::Normalize,
            Stage::Reconstruct,
            Stage::Complete
        ]
    );
}

#[tokio::test]
async fn ocr_handle_released_after_mid_loop_failure() {
    let (cb, seen) = recorder();
    let mut ocr = FakeOcr::new(&["page one", "page two", "page three"]);
    ocr.fail_page = Some(2);
    let stats = Arc::clone(&ocr.stats);
    let conv = converter(FakeRenderer::blank(3), ocr, FakeBackend::default());

    let err = conv
        .convert_ocr(PDF.to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ConvertError::RecognitionFailure { page: 2, .. }),
        "got {err:?}"
    );
    assert_eq!(stats.terminated.load(Ordering::SeqCst), 1);

    let reports = seen.lock().unwrap();
    let last = reports.last().unwrap();
    assert_eq!(last.stage, Stage::Recognize);
    assert!(last.error.as_deref().unwrap().contains("worker crashed"));
    assert!(reports.iter().all(|r| r.current_page.unwrap_or(0) <= 2));
}

#[tokio::test]
async fn ocr_init_failure_aborts_before_any_page() {
    let (cb, seen) = recorder();
    let mut ocr = FakeOcr::new(&["x"]);
    ocr.fail_create = true;
    let stats = Arc::clone(&ocr.stats);
    let conv = converter(FakeRenderer::blank(1), ocr, FakeBackend::default());

    let err = conv
        .convert_ocr(PDF.to_vec(), &CallOptions::new().progress(cb))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::EngineInitFailure { .. }));
    assert_eq!(stats.terminated.load(Ordering::SeqCst), 0);

    let reports = seen.lock().unwrap();
    assert_eq!(
        stages(&reports),
        vec![Stage::Start, Stage::OcrInit, Stage::OcrInit]
    );
    assert!(reports[2].is_error());
}

#[tokio::test]
async fn ocr_language_call_override_then_instance_default() {
    let ocr = FakeOcr::new(&["Hallo Welt."]);
    let stats = Arc::clone(&ocr.stats);
    let conv = converter(FakeRenderer::blank(1), ocr, FakeBackend::default());

    conv.convert_ocr(PDF.to_vec(), &CallOptions::new().ocr_language("deu"))
        .await
        .unwrap();
    conv.convert_ocr(PDF.to_vec(), &CallOptions::new()).await.unwrap();

    assert_eq!(*stats.languages.lock().unwrap(), vec!["deu", "eng"]);
}

#[tokio::test]
async fn ocr_rejects_out_of_range_scale() {
    let ocr = FakeOcr::new(&["x"]);
    let stats = Arc::clone(&ocr.stats);
    let conv = converter(FakeRenderer::blank(1), ocr, FakeBackend::default());
    let err = conv
        .convert_ocr(PDF.to_vec(), &CallOptions::new().render_scale(20.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::InvalidConfig(_)));
    assert_eq!(stats.created.load(Ordering::SeqCst), 0);
}

// ── Generative rewrite ───────────────────────────────────────────────────────

fn identity() -> PromptBuilder {
    Arc::new(|t: &str| t.to_string())
}

#[tokio::test]
async fn rewrite_lifecycle_reuses_then_swaps_engine() {
    let backend = FakeBackend::default();
    let stats = Arc::clone(&backend.stats);
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), backend);
    let opts = CallOptions::new().prompt_builder(identity());

    let out = conv.rewrite("## A", &opts).await.unwrap();
    assert_eq!(out, format!("[{DEFAULT_MODEL_ID}] ## A"));
    conv.rewrite("## B", &opts).await.unwrap();
    assert_eq!(stats.inits.load(Ordering::SeqCst), 1);
    assert_eq!(conv.engine_state().await, EngineLifecycleState::Ready);

    let other = opts.clone().model_id("llama3.2").engine_options(EngineOptions {
        model_location: Some("ollama".into()),
        ..EngineOptions::default()
    });
    let out = conv.rewrite("## C", &other).await.unwrap();
    assert_eq!(out, "[llama3.2] ## C");
    assert_eq!(stats.inits.load(Ordering::SeqCst), 2);
    assert_eq!(stats.unloads.load(Ordering::SeqCst), 1);
    assert_eq!(*stats.locations.lock().unwrap(), vec!["openai", "ollama"]);
}

#[tokio::test]
async fn rewrite_streams_init_progress_only_on_first_call() {
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), FakeBackend::default());

    let (cb, seen) = recorder();
    conv.rewrite("text", &CallOptions::new().progress(cb)).await.unwrap();
    let reports = seen.lock().unwrap().clone();
    let init: Vec<f32> = reports
        .iter()
        .filter(|r| r.stage == Stage::EngineInit)
        .filter_map(|r| r.progress)
        .collect();
    assert_eq!(init, vec![0.0, 0.25, 0.75, 1.0]);
    assert_eq!(
        stages(&reports)[reports.len() - 2..],
        [Stage::Rewrite, Stage::Complete]
    );

    let (cb, seen) = recorder();
    conv.rewrite("text", &CallOptions::new().progress(cb)).await.unwrap();
    assert_eq!(
        stages(&seen.lock().unwrap()),
        vec![Stage::Rewrite, Stage::Complete]
    );
}

#[tokio::test]
async fn rewrite_unknown_model_without_location_is_configuration_error() {
    let (cb, seen) = recorder();
    let backend = FakeBackend::default();
    let stats = Arc::clone(&backend.stats);
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), backend);

    let err = conv
        .rewrite("text", &CallOptions::new().model_id("mistral-7b").progress(cb))
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::ConfigurationError(_)), "got {err:?}");
    assert_eq!(stats.inits.load(Ordering::SeqCst), 0);

    let reports = seen.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].stage, Stage::EngineInit);
    assert!(reports[0].is_error());
}

#[tokio::test]
async fn rewrite_uses_builtin_template_without_builder() {
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), FakeBackend::default());
    let out = conv.rewrite("## TOTAL DUE", &CallOptions::new()).await.unwrap();
    assert!(out.contains("reconstructed from a PDF"));
    assert!(out.ends_with("## TOTAL DUE"));
}

#[tokio::test]
async fn generation_failure_keeps_engine_ready() {
    let backend = FakeBackend {
        fail_generate: true,
        ..FakeBackend::default()
    };
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), backend);
    let err = conv.rewrite("x", &CallOptions::new()).await.unwrap_err();
    assert!(matches!(err, ConvertError::GenerationFailure { .. }));
    assert_eq!(conv.engine_state().await, EngineLifecycleState::Ready);
}

#[tokio::test]
async fn unload_then_rewrite_reinitialises() {
    let backend = FakeBackend::default();
    let stats = Arc::clone(&backend.stats);
    let conv = converter(FakeRenderer::blank(0), FakeOcr::new(&[]), backend);

    conv.unload().await;
    assert_eq!(conv.engine_state().await, EngineLifecycleState::Uninitialized);

    conv.rewrite("x", &CallOptions::new()).await.unwrap();
    conv.unload().await;
    assert_eq!(conv.engine_state().await, EngineLifecycleState::Unloaded);

    conv.rewrite("y", &CallOptions::new()).await.unwrap();
    assert_eq!(stats.inits.load(Ordering::SeqCst), 2);
    assert_eq!(stats.unloads.load(Ordering::SeqCst), 1);
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_conversions_on_one_instance_serialise() {
    let renderer = FakeRenderer {
        delay: Some(Duration::from_millis(20)),
        ..FakeRenderer::with_pages(invoice_pages())
    };
    let concurrency = Arc::clone(&renderer.concurrency);
    let conv = Arc::new(converter(renderer, FakeOcr::new(&[]), FakeBackend::default()));

    let a = {
        let conv = Arc::clone(&conv);
        tokio::spawn(async move { conv.convert_fast(PDF.to_vec(), &CallOptions::new()).await })
    };
    let b = {
        let conv = Arc::clone(&conv);
        tokio::spawn(async move { conv.convert_fast(PDF.to_vec(), &CallOptions::new()).await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_eq!(a, b);
    assert_eq!(concurrency.max_seen.load(Ordering::SeqCst), 1);
}
