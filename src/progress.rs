//! Progress reporting for conversion and rewrite pipelines.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] (instance
//! default) or [`crate::config::CallOptions::progress`] (single call) to
//! receive a [`ProgressReport`] at every stage transition.
//!
//! Reports are delivered synchronously, from the task that runs the pipeline,
//! before the awaited result of the stage becomes visible to the caller. They
//! are never queued or buffered, so per-page reports always arrive in
//! increasing page order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdftext2md::{ConversionConfig, ProgressCallback, ProgressReport};
//! use std::sync::Arc;
//!
//! let cb: ProgressCallback = Arc::new(|report: &ProgressReport| {
//!     eprintln!("[{}] {}", report.stage, report.message);
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pipeline stage a [`ProgressReport`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Document opened, page count known.
    Start,
    /// Direct text-layer extraction of one page.
    Extract,
    /// OCR engine handle being created.
    OcrInit,
    /// Page rasterisation for OCR.
    Render,
    /// OCR recognition of one page.
    Recognize,
    /// Rule engine pass over the raw text.
    Normalize,
    /// Markdown block reconstruction.
    Reconstruct,
    /// Generative engine initialisation (download/compile/connect).
    EngineInit,
    /// Generative engine released.
    EngineUnload,
    /// Generative rewrite request in flight.
    Rewrite,
    /// Stage finished successfully.
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::Extract => "extract",
            Stage::OcrInit => "ocr-init",
            Stage::Render => "render",
            Stage::Recognize => "recognize",
            Stage::Normalize => "normalize",
            Stage::Reconstruct => "reconstruct",
            Stage::EngineInit => "engine-init",
            Stage::EngineUnload => "engine-unload",
            Stage::Rewrite => "rewrite",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One immutable progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub stage: Stage,
    pub message: String,
    /// 1-indexed page number for per-page stages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    /// Fractional completion in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
    /// Human-readable description of the failure that ended the stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressReport {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            current_page: None,
            total_pages: None,
            progress: None,
            error: None,
        }
    }

    pub fn with_page(mut self, current_page: usize, total_pages: usize) -> Self {
        self.current_page = Some(current_page);
        self.total_pages = Some(total_pages);
        self
    }

    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress.clamp(0.0, 1.0));
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Receives progress reports from the pipeline.
///
/// Implementations must be `Send + Sync` because a converter may be shared
/// across tasks. Any `Fn(&ProgressReport)` closure implements this trait.
pub trait ConversionProgressCallback: Send + Sync {
    fn on_progress(&self, report: &ProgressReport);
}

impl<F> ConversionProgressCallback for F
where
    F: Fn(&ProgressReport) + Send + Sync,
{
    fn on_progress(&self, report: &ProgressReport) {
        self(report)
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {
    fn on_progress(&self, _report: &ProgressReport) {}
}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Thin wrapper the orchestrators emit through.
///
/// Holding an `Option` keeps the "no callback configured" path free of
/// allocations and dynamic dispatch.
#[derive(Clone, Default)]
pub(crate) struct Reporter {
    callback: Option<ProgressCallback>,
}

impl Reporter {
    pub(crate) fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn emit(&self, report: ProgressReport) {
        if let Some(ref cb) = self.callback {
            cb.on_progress(&report);
        }
    }

    /// Report `err` against `stage` and hand it back for propagation.
    pub(crate) fn fail(&self, stage: Stage, err: crate::error::ConvertError) -> crate::error::ConvertError {
        tracing::warn!("{} failed: {}", stage, err);
        self.emit(ProgressReport::new(stage, format!("{stage} failed")).with_error(&err));
        err
    }
}
