//! Error types for the edgequake-pdftext2md library.
//!
//! Every failure is fatal for the conversion that raised it: the pipeline does
//! not retry locally and never returns partial Markdown. The orchestrators
//! report each error once through the progress channel (see
//! [`crate::progress::ProgressReport::error`]) and then hand it back as
//! `Err(ConvertError)`.
//!
//! The first five variants are the pipeline taxonomy; the remaining ones cover
//! input resolution, output writing and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-pdftext2md library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Pipeline taxonomy ─────────────────────────────────────────────────
    /// The payload is not a well-formed document.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// A rendering, OCR or generative engine failed to start.
    #[error("Failed to initialise {engine} engine: {detail}")]
    EngineInitFailure { engine: String, detail: String },

    /// OCR failed for a single page.
    #[error("OCR failed on page {page}: {detail}")]
    RecognitionFailure { page: usize, detail: String },

    /// The generative engine call failed.
    #[error("Generation failed with model '{model_id}': {detail}")]
    GenerationFailure { model_id: String, detail: String },

    /// The model artifact location could not be resolved.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// The rendering engine could not produce fragments or a raster for a page.
    #[error("Rendering failed for page {page}: {detail}")]
    RenderFailed { page: usize, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task, runtime failure).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub(crate) fn engine_init(engine: &str, detail: impl std::fmt::Display) -> Self {
        ConvertError::EngineInitFailure {
            engine: engine.to_string(),
            detail: detail.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognition_failure_display() {
        let e = ConvertError::RecognitionFailure {
            page: 3,
            detail: "tesseract exited with 1".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"), "got: {msg}");
        assert!(msg.contains("tesseract exited with 1"));
    }

    #[test]
    fn engine_init_helper() {
        let e = ConvertError::engine_init("ocr", "binary not found");
        assert!(matches!(e, ConvertError::EngineInitFailure { .. }));
        assert!(e.to_string().contains("ocr"));
        assert!(e.to_string().contains("binary not found"));
    }

    #[test]
    fn configuration_error_display() {
        let e = ConvertError::ConfigurationError("no location for 'phi-3'".into());
        assert!(e.to_string().contains("phi-3"));
    }

    #[test]
    fn generation_failure_display() {
        let e = ConvertError::GenerationFailure {
            model_id: "gpt-4.1-nano".into(),
            detail: "HTTP 500".into(),
        };
        assert!(e.to_string().contains("gpt-4.1-nano"));
        assert!(e.to_string().contains("HTTP 500"));
    }
}
