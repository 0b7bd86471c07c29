//! Tesseract-backed [`OcrEngine`].
//!
//! A handle is a resolved `tesseract` binary plus a private temp directory.
//! Each page raster is written there as PNG and recognised with
//!
//! ```text
//! tesseract <page.png> stdout -l <lang> --psm <n> --oem <n>
//! ```
//!
//! [`OcrHandle::terminate`] removes the directory. Dropping a handle without
//! terminating it also cleans up (via [`TempDir`]'s destructor), but the
//! orchestrator always terminates explicitly so the release is logged.

use crate::config::OcrOptions;
use crate::engine::{OcrEngine, OcrHandle};
use crate::error::ConvertError;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::path::PathBuf;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

const BINARY_NAME: &str = "tesseract";

/// Spawns the `tesseract` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr;

impl TesseractOcr {
    pub fn new() -> Self {
        Self
    }
}

fn resolve_binary(options: &OcrOptions) -> Result<PathBuf, ConvertError> {
    match options.binary_path {
        Some(ref path) if path.is_file() => Ok(path.clone()),
        Some(ref path) => Err(ConvertError::engine_init(
            "ocr",
            format!("tesseract binary not found at {}", path.display()),
        )),
        None => which::which(BINARY_NAME).map_err(|e| {
            ConvertError::engine_init(
                "ocr",
                format!("{BINARY_NAME} not found on PATH ({e}). Install tesseract-ocr."),
            )
        }),
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn create_handle(
        &self,
        language: &str,
        options: &OcrOptions,
    ) -> Result<Box<dyn OcrHandle>, ConvertError> {
        let binary = resolve_binary(options)?;
        let workdir = TempDir::new()
            .map_err(|e| ConvertError::engine_init("ocr", format!("temp dir: {e}")))?;

        info!(
            "OCR worker ready: {} (lang={}, psm={}, oem={})",
            binary.display(),
            language,
            options.page_segmentation_mode,
            options.engine_mode
        );

        Ok(Box::new(TesseractHandle {
            binary,
            language: language.to_string(),
            psm: options.page_segmentation_mode,
            oem: options.engine_mode,
            workdir,
            pages_seen: 0,
        }))
    }
}

struct TesseractHandle {
    binary: PathBuf,
    language: String,
    psm: u8,
    oem: u8,
    workdir: TempDir,
    pages_seen: usize,
}

impl TesseractHandle {
    fn args(&self, image_path: &std::path::Path) -> Vec<String> {
        vec![
            image_path.display().to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
            "--psm".to_string(),
            self.psm.to_string(),
            "--oem".to_string(),
            self.oem.to_string(),
        ]
    }
}

#[async_trait]
impl OcrHandle for TesseractHandle {
    async fn recognize(&mut self, image: &DynamicImage) -> Result<String, ConvertError> {
        self.pages_seen += 1;
        let page = self.pages_seen;
        let image_path = self.workdir.path().join(format!("page-{page:04}.png"));

        let raster = image.clone();
        let target = image_path.clone();
        tokio::task::spawn_blocking(move || raster.save_with_format(&target, ImageFormat::Png))
            .await
            .map_err(|e| ConvertError::Internal(format!("PNG encode task panicked: {e}")))?
            .map_err(|e| ConvertError::RecognitionFailure {
                page,
                detail: format!("could not write raster: {e}"),
            })?;

        let output = Command::new(&self.binary)
            .args(self.args(&image_path))
            .output()
            .await
            .map_err(|e| ConvertError::RecognitionFailure {
                page,
                detail: format!("failed to spawn {}: {e}", self.binary.display()),
            })?;

        if let Err(e) = tokio::fs::remove_file(&image_path).await {
            debug!("Could not remove {}: {}", image_path.display(), e);
        }

        if !output.status.success() {
            return Err(ConvertError::RecognitionFailure {
                page,
                detail: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn terminate(self: Box<Self>) {
        let TesseractHandle {
            workdir, pages_seen, ..
        } = *self;
        let path = workdir.path().to_path_buf();
        match workdir.close() {
            Ok(()) => debug!("OCR worker terminated after {} pages", pages_seen),
            Err(e) => warn!("Failed to remove OCR workdir {}: {}", path.display(), e),
        }
    }
}
