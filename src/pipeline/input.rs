//! Input resolution: load a user-supplied path or URL into a document payload.
//!
//! The conversion entry points take raw bytes. This module is the bridge for
//! callers (and the CLI) that start from a path or an HTTP(S) URL. We validate
//! the PDF magic bytes (`%PDF`) before returning so callers get a meaningful
//! error rather than an engine failure halfway through opening the document.

use crate::error::ConvertError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for URL downloads.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document named by `input`.
///
/// If the input is a URL, download it; otherwise read the local file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Vec<u8>, ConvertError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_magic(&bytes, input)?;
    Ok(bytes)
}

/// Reject payloads that do not start with `%PDF`.
pub fn check_magic(bytes: &[u8], origin: &str) -> Result<(), ConvertError> {
    if bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC {
        return Ok(());
    }
    Err(ConvertError::InvalidInput {
        reason: format!(
            "'{}' is not a PDF (first bytes: {:?})",
            origin,
            &bytes[..bytes.len().min(PDF_MAGIC.len())]
        ),
    })
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, ConvertError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(ConvertError::FileNotFound { path });
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ConvertError::PermissionDenied { path })
        }
        Err(_) => Err(ConvertError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, ConvertError> {
    info!("Downloading document from: {}", url);

    let download_failed = |reason: String| ConvertError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| download_failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            download_failed(format!("timed out after {}s", timeout_secs))
        } else {
            download_failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(download_failed(format!("HTTP {}", response.status())));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| download_failed(e.to_string()))?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}
