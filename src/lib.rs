//! # edgequake-pdftext2md
//!
//! Convert PDF text (from the embedded text layer or from OCR) into
//! structured Markdown, then optionally polish it with a language model.
//!
//! ## Why this crate?
//!
//! Vision models read pages well but cost a request per page. Most business
//! documents already carry a text layer, or OCR well. This crate rebuilds
//! structure from that text with deterministic heuristics: headings from
//! all-caps and short unpunctuated lines, code fences from column-aligned
//! runs, paragraphs from everything else. A single generative call can then
//! clean up what the heuristics missed.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Extract      text layer (pdfium) or render + OCR (tesseract)
//!  ├─ 2. Normalise    ligatures, quotes, dashes, whitespace, caller rules
//!  ├─ 3. Reconstruct  headings / paragraphs / fenced blocks
//!  ├─ 4. Serialise    Markdown
//!  └─ 5. Rewrite      optional, one generative call (gpt-4.1-nano / …)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdftext2md::{CallOptions, ConversionConfig, Converter, NormalizationRule};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .rule(NormalizationRule::new(r"Page \d+ of \d+", ""))
//!         .build()?;
//!     let converter = Converter::new(config);
//!
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let markdown = converter
//!         .convert_ocr(bytes, &CallOptions::new().ocr_language("deu"))
//!         .await?;
//!     println!("{}", markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Engines
//!
//! | Concern | Trait | Bundled implementation |
//! |---------|-------|------------------------|
//! | text layer + rasters | [`DocumentRenderer`] | [`PdfiumRenderer`] (`PDFIUM_LIB_PATH` or system library) |
//! | OCR | [`OcrEngine`] | [`TesseractOcr`] (`tesseract` on `PATH`) |
//! | rewrite | [`GenerativeBackend`] | [`LlmBackend`] (API key from the environment) |
//!
//! Use [`Converter::with_engines`] to substitute any of them.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdftext2md` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod rewrite;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    CallOptions, ConversionConfig, ConversionConfigBuilder, EngineOptions, OcrOptions, PromptBuilder,
    DEFAULT_MODEL_ID,
};
pub use convert::{write_output, Converter, ExtractionMode};
pub use engine::{
    DocumentRenderer, EngineInit, GenerativeBackend, GenerativeEngine, InitProgress, OcrEngine,
    OcrHandle, PageSource, TextFragment,
};
pub use error::ConvertError;
pub use pipeline::llm::LlmBackend;
pub use pipeline::normalize::{NormalizationRule, RuleEngine};
pub use pipeline::ocr::TesseractOcr;
pub use pipeline::reconstruct::{reconstruct, render_markdown, MarkdownBlock};
pub use pipeline::render::PdfiumRenderer;
pub use progress::{
    ConversionProgressCallback, NoopProgressCallback, ProgressCallback, ProgressReport, Stage,
};
pub use rewrite::{EngineLifecycleState, RewriteOrchestrator};
