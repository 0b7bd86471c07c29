//! Capability traits for the external engines the pipeline drives.
//!
//! The pipeline never talks to pdfium, Tesseract or an LLM provider directly.
//! It consumes exactly one fixed interface per engine:
//!
//! | Engine | Factory | Handle |
//! |--------|---------|--------|
//! | rendering / text layer | [`DocumentRenderer`] | [`PageSource`] |
//! | OCR | [`OcrEngine`] | [`OcrHandle`] |
//! | generative text | [`GenerativeBackend`] | [`GenerativeEngine`] |
//!
//! Bundled implementations live in [`crate::pipeline::render`],
//! [`crate::pipeline::ocr`] and [`crate::pipeline::llm`]. Tests substitute
//! in-memory fakes.
//!
//! Handles are returned as owned boxes: whoever holds the box owns the live
//! engine instance and is responsible for releasing it
//! ([`OcrHandle::terminate`], [`GenerativeEngine::unload`]).

use crate::config::{EngineOptions, OcrOptions};
use crate::error::ConvertError;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// A positioned run of text on one page.
///
/// Coordinates are in page units (PDF points for the pdfium renderer) with
/// `y` the baseline; only differences between fragments matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Horizontal start.
    pub x: f32,
    /// Baseline.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// The engine marked a line break after this fragment.
    pub end_of_line: bool,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
            end_of_line: false,
        }
    }

    pub fn with_end_of_line(mut self) -> Self {
        self.end_of_line = true;
        self
    }

    /// Horizontal end.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Opens documents for the extraction orchestrator.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Open `bytes` as a document. Fails with [`ConvertError::InvalidInput`]
    /// when the payload is not a document the engine understands.
    async fn open_document(&self, bytes: Vec<u8>) -> Result<Box<dyn PageSource>, ConvertError>;
}

/// An opened document.
#[async_trait]
pub trait PageSource: Send {
    fn page_count(&self) -> usize;

    /// Positioned text fragments of page `page_index` (0-based), in content order.
    async fn page_fragments(&mut self, page_index: usize) -> Result<Vec<TextFragment>, ConvertError>;

    /// Rasterise page `page_index` (0-based) at `scale` × its natural size.
    async fn render_page(&mut self, page_index: usize, scale: f32) -> Result<DynamicImage, ConvertError>;
}

/// Creates OCR handles.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn create_handle(
        &self,
        language: &str,
        options: &OcrOptions,
    ) -> Result<Box<dyn OcrHandle>, ConvertError>;
}

/// A live OCR worker bound to one language.
#[async_trait]
pub trait OcrHandle: Send {
    async fn recognize(&mut self, image: &DynamicImage) -> Result<String, ConvertError>;

    /// Release the worker. Consumes the handle so it cannot be used afterwards.
    async fn terminate(self: Box<Self>);
}

/// Everything a generative backend needs to bring a model up.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInit {
    pub model_id: String,
    /// Resolved artifact location (built-in for the default model).
    pub model_location: String,
    pub options: EngineOptions,
}

/// Called by a backend while it initialises: fraction in `[0, 1]` and a message.
pub type InitProgress<'a> = &'a (dyn Fn(f32, &str) + Send + Sync);

/// Creates generative engines.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn create_engine(
        &self,
        init: &EngineInit,
        progress: InitProgress<'_>,
    ) -> Result<Box<dyn GenerativeEngine>, ConvertError>;
}

/// A loaded generative model.
#[async_trait]
pub trait GenerativeEngine: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ConvertError>;

    async fn unload(self: Box<Self>);
}
