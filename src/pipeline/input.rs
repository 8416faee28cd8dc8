//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! The shell uploads *bytes*, so both sources end up in memory. The `%PDF`
//! magic check happens here and again in the rasteriser; it is the cheapest
//! way to give a clear error before pdfium is involved.

use crate::error::DrawingQaError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes together with a display name for the shell.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    /// File name (last path or URL segment), for display only.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Reject bytes that do not begin with the PDF magic number.
pub fn check_pdf_magic(bytes: &[u8]) -> Result<(), DrawingQaError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let shown = bytes.iter().take(4).copied().collect::<Vec<u8>>();
        return Err(DrawingQaError::DocumentOpen {
            detail: format!("not a PDF (first bytes: {shown:?})"),
        });
    }
    Ok(())
}

/// Load the input string as PDF bytes.
///
/// URLs are downloaded with the given timeout; anything else is treated as
/// a local path.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedInput, DrawingQaError> {
    let loaded = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    check_pdf_magic(&loaded.bytes)?;
    Ok(loaded)
}

async fn read_local(path_str: &str) -> Result<LoadedInput, DrawingQaError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => DrawingQaError::PermissionDenied { path: path.clone() },
        _ => DrawingQaError::InputNotFound { path: path.clone() },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    Ok(LoadedInput { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedInput, DrawingQaError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DrawingQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DrawingQaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DrawingQaError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DrawingQaError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DrawingQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());

    Ok(LoadedInput {
        name: filename_from_url(url),
        bytes: bytes.to_vec(),
    })
}

/// Last non-empty path segment of the URL, or `downloaded.pdf`.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_check() {
        assert!(check_pdf_magic(b"%PDF-1.7\n").is_ok());
        assert!(matches!(
            check_pdf_magic(b"PK\x03\x04"),
            Err(DrawingQaError::DocumentOpen { .. })
        ));
        assert!(check_pdf_magic(b"%P").is_err());
        assert!(check_pdf_magic(b"").is_err());
    }

    #[test]
    fn filename_from_url_segments() {
        assert_eq!(
            filename_from_url("https://example.com/drawings/A-100.pdf"),
            "A-100.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_local_file_is_reported() {
        let err = load_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, DrawingQaError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();
        let err = load_input(path.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, DrawingQaError::DocumentOpen { .. }));
    }
}
