//! Error types for the drawing-qa library.
//!
//! Every variant of [`DrawingQaError`] is fatal for the *request* that raised
//! it, never for the process: the shell reports it and keeps accepting new
//! uploads and questions.
//!
//! The four conditions the shell distinguishes are:
//!
//! * [`DrawingQaError::DocumentOpen`]: the upload is not a readable PDF.
//! * [`DrawingQaError::ProviderConfig`]: no usable provider session; raised
//!   before any network call.
//! * [`DrawingQaError::ProviderRequest`]: the remote call failed; the
//!   provider's own message is kept verbatim.
//! * an empty completion, which is *not* an error at all but
//!   [`crate::provider::Answer::NoTextOutput`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the drawing-qa library.
#[derive(Debug, Error)]
pub enum DrawingQaError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The uploaded bytes are not a PDF, or pdfium could not open them.
    #[error("Could not open PDF: {detail}")]
    DocumentOpen { detail: String },

    /// A question was asked before any document was uploaded.
    #[error("No PDF has been uploaded yet.\nOpen one with :open <path-or-url>.")]
    NoDocument,

    /// The question was empty or whitespace only.
    #[error("Ask a question about the PDF first.")]
    EmptyQuestion,

    /// pdfium opened the document but failed on one page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The request-scoped scratch directory could not be created or written.
    #[error("Scratch storage error: {source}")]
    Scratch {
        #[source]
        source: std::io::Error,
    },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No valid provider session (missing API key, empty model name, …).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderConfig { provider: String, hint: String },

    /// The remote call itself failed. `message` is the provider's own text.
    #[error("{provider} request failed: {message}")]
    ProviderRequest { provider: String, message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a page preview or answer file.
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

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform, or set PDFIUM_LIB_PATH=/path/to/libpdfium\n\
to point at an existing copy (builds: https://github.com/bblanchon/pdfium-binaries).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DrawingQaError {
    /// Shorthand for a [`DrawingQaError::ProviderRequest`].
    pub(crate) fn request(provider: &str, message: impl Into<String>) -> Self {
        DrawingQaError::ProviderRequest {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`DrawingQaError::ProviderConfig`].
    pub(crate) fn config(provider: &str, hint: impl Into<String>) -> Self {
        DrawingQaError::ProviderConfig {
            provider: provider.to_string(),
            hint: hint.into(),
        }
    }

    /// True for the errors raised before any network traffic happens.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DrawingQaError::ProviderConfig { .. } | DrawingQaError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_request_keeps_message_verbatim() {
        let e = DrawingQaError::request(
            "gemini",
            "models/gemini-9 is not found for API version v1beta",
        );
        assert_eq!(
            e.to_string(),
            "gemini request failed: models/gemini-9 is not found for API version v1beta"
        );
    }

    #[test]
    fn provider_config_display() {
        let e = DrawingQaError::config("openai", "Enter an API key.");
        let msg = e.to_string();
        assert!(msg.contains("openai"), "got: {msg}");
        assert!(msg.contains("Enter an API key."), "got: {msg}");
        assert!(e.is_config_error());
    }

    #[test]
    fn document_open_display() {
        let e = DrawingQaError::DocumentOpen {
            detail: "missing %PDF header".into(),
        };
        assert!(e.to_string().contains("missing %PDF header"));
        assert!(!e.is_config_error());
    }

    #[test]
    fn rasterisation_failed_display() {
        let e = DrawingQaError::RasterisationFailed {
            page: 3,
            detail: "bitmap allocation".into(),
        };
        assert!(e.to_string().contains("page 3"));
    }
}
