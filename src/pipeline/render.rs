//! Document rasteriser: render every page to PNG and extract its text layer.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is blocking and keeps
//! thread-local state. Rendering runs on tokio's blocking pool so the async
//! executor keeps serving I/O.
//!
//! ## Scratch lifetime
//!
//! Page PNGs are written to a request-scoped [`TempDir`] owned by
//! [`RasterizedDocument`]. Dropping the document (success, error, or panic
//! unwinding) deletes the directory and everything in it. The `%PDF` check
//! runs before the directory is created, so a rejected upload never touches
//! the disk.

use crate::config::AssistantConfig;
use crate::error::DrawingQaError;
use crate::pipeline::{encode, input, pdfium};
use image::DynamicImage;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// One page, rendered and text-extracted. Image and text share an index by
/// construction.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    /// 1-based page number.
    pub number: usize,
    /// PNG inside the request's scratch directory.
    pub image_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Extracted text, already capped at the configured ceiling.
    pub text: String,
    /// True when `text` was cut to the ceiling.
    pub text_truncated: bool,
}

/// The rasterised pages of one request plus the scratch directory holding
/// their PNGs.
#[derive(Debug)]
pub struct RasterizedDocument {
    scratch: TempDir,
    pages: Vec<RasterizedPage>,
}

impl RasterizedDocument {
    pub fn pages(&self) -> &[RasterizedPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Directory holding the page PNGs; removed on drop.
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// Copy every page PNG into `dir` as `page_{n}.png`.
    pub fn save_previews(&self, dir: &Path) -> Result<Vec<PathBuf>, DrawingQaError> {
        std::fs::create_dir_all(dir).map_err(|source| DrawingQaError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut written = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            let dest = dir.join(page_file_name(page.number));
            std::fs::copy(&page.image_path, &dest).map_err(|source| {
                DrawingQaError::OutputWriteFailed {
                    path: dest.clone(),
                    source,
                }
            })?;
            written.push(dest);
        }
        info!("Saved {} page previews to {}", written.len(), dir.display());
        Ok(written)
    }
}

/// Document metadata reported on upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub pdf_version: String,
}

/// Rasterise every page of the PDF in `bytes`.
///
/// Fails with [`DrawingQaError::DocumentOpen`] on anything pdfium cannot
/// open; no partial result is returned.
pub async fn rasterize(
    bytes: Arc<[u8]>,
    config: &AssistantConfig,
) -> Result<RasterizedDocument, DrawingQaError> {
    let settings = RenderSettings::from(config);

    tokio::task::spawn_blocking(move || rasterize_blocking(&bytes, &settings))
        .await
        .map_err(|e| DrawingQaError::Internal(format!("Render task panicked: {}", e)))?
}

/// Open the document and read its metadata without rendering.
pub async fn inspect(bytes: Arc<[u8]>) -> Result<DocumentInfo, DrawingQaError> {
    tokio::task::spawn_blocking(move || inspect_blocking(&bytes))
        .await
        .map_err(|e| DrawingQaError::Internal(format!("Inspect task panicked: {}", e)))?
}

/// The subset of [`AssistantConfig`] the blocking task needs.
#[derive(Debug, Clone)]
struct RenderSettings {
    zoom: f32,
    max_pixels: u32,
    max_chars: usize,
    scratch_root: Option<PathBuf>,
}

impl From<&AssistantConfig> for RenderSettings {
    fn from(c: &AssistantConfig) -> Self {
        Self {
            zoom: c.zoom,
            max_pixels: c.max_rendered_pixels,
            max_chars: c.max_page_chars,
            scratch_root: c.scratch_root.clone(),
        }
    }
}

fn rasterize_blocking(
    bytes: &[u8],
    settings: &RenderSettings,
) -> Result<RasterizedDocument, DrawingQaError> {
    input::check_pdf_magic(bytes)?;

    let scratch = create_scratch(settings.scratch_root.as_deref())?;
    let pdfium = pdfium::bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(open_error)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let mut results = Vec::with_capacity(total_pages);

    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;

        let (width, height) = target_size(
            page.width().value,
            page.height().value,
            settings.zoom,
            settings.max_pixels,
        );
        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            DrawingQaError::RasterisationFailed {
                page: number,
                detail: format!("{:?}", e),
            }
        })?;

        // Drop alpha: providers bill by bytes and drawings are opaque anyway.
        let image = DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8());
        let png = encode::encode_png(&image).map_err(|e| DrawingQaError::RasterisationFailed {
            page: number,
            detail: format!("PNG encoding failed: {}", e),
        })?;

        let image_path = scratch.path().join(page_file_name(number));
        std::fs::write(&image_path, &png).map_err(|source| DrawingQaError::Scratch { source })?;

        let raw_text = match page.text() {
            Ok(text) => text.all(),
            Err(e) => {
                warn!("Page {}: text layer unreadable ({:?}); using empty text", number, e);
                String::new()
            }
        };
        let (text, text_truncated) = truncate_chars(&raw_text, settings.max_chars);
        if text_truncated {
            warn!(
                "Page {}: extracted text truncated from {} to {} characters",
                number,
                raw_text.chars().count(),
                settings.max_chars
            );
        }

        debug!(
            "Rendered page {} → {}x{} px, {} text chars",
            number,
            image.width(),
            image.height(),
            text.chars().count()
        );

        results.push(RasterizedPage {
            number,
            image_path,
            width: image.width(),
            height: image.height(),
            text,
            text_truncated,
        });
    }

    Ok(RasterizedDocument {
        scratch,
        pages: results,
    })
}

fn inspect_blocking(bytes: &[u8]) -> Result<DocumentInfo, DrawingQaError> {
    input::check_pdf_magic(bytes)?;

    let pdfium = pdfium::bind()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(open_error)?;

    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentInfo {
        page_count: document.pages().len() as usize,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        pdf_version: format!("{:?}", document.version()),
    })
}

fn create_scratch(root: Option<&Path>) -> Result<TempDir, DrawingQaError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("drawing-qa-");
    let dir = match root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    };
    dir.map_err(|source| DrawingQaError::Scratch { source })
}

fn open_error(e: PdfiumError) -> DrawingQaError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        DrawingQaError::DocumentOpen {
            detail: "the document is encrypted and requires a password".into(),
        }
    } else {
        DrawingQaError::DocumentOpen { detail }
    }
}

fn page_file_name(number: usize) -> String {
    format!("page_{number}.png")
}

/// Pixel size for a page of `width_pts` × `height_pts` at `zoom`, with the
/// longest edge capped at `max_pixels`.
fn target_size(width_pts: f32, height_pts: f32, zoom: f32, max_pixels: u32) -> (u32, u32) {
    let w = (width_pts * zoom).round().max(1.0);
    let h = (height_pts * zoom).round().max(1.0);
    let longest = w.max(h);
    let scale = if longest > max_pixels as f32 {
        max_pixels as f32 / longest
    } else {
        1.0
    };
    (
        (w * scale).round().max(1.0) as u32,
        (h * scale).round().max(1.0) as u32,
    )
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letter_page_at_double_zoom() {
        assert_eq!(target_size(612.0, 792.0, 2.0, 4000), (1224, 1584));
    }

    #[test]
    fn oversized_sheet_is_capped_proportionally() {
        // A0 landscape
        let (w, h) = target_size(3370.0, 2384.0, 2.0, 4000);
        assert_eq!(w, 4000);
        assert_eq!(h, 2830);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let (t, cut) = truncate_chars("ØØØØ", 2);
        assert_eq!(t, "ØØ");
        assert!(cut);

        let (t, cut) = truncate_chars("QTY 3", 6000);
        assert_eq!(t, "QTY 3");
        assert!(!cut);

        let (t, cut) = truncate_chars("abc", 3);
        assert_eq!(t, "abc");
        assert!(!cut);
    }

    #[test]
    fn truncated_text_never_exceeds_ceiling() {
        let long = "x".repeat(10_000);
        let (t, cut) = truncate_chars(&long, 6000);
        assert_eq!(t.chars().count(), 6000);
        assert!(cut);
    }

    #[test]
    fn empty_text_layer_is_not_an_error() {
        let (t, cut) = truncate_chars("", 6000);
        assert!(t.is_empty());
        assert!(!cut);
    }

    #[tokio::test]
    async fn non_pdf_leaves_no_scratch_behind() {
        let root = tempfile::tempdir().unwrap();
        let config = AssistantConfig::builder()
            .scratch_root(root.path())
            .build()
            .unwrap();

        let err = rasterize(Arc::from(&b"<html>not a pdf</html>"[..]), &config)
            .await
            .unwrap_err();

        assert!(matches!(err, DrawingQaError::DocumentOpen { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn scratch_dir_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let scratch = create_scratch(Some(root.path())).unwrap();
        std::fs::write(scratch.path().join(page_file_name(1)), b"png").unwrap();
        let doc = RasterizedDocument {
            scratch,
            pages: Vec::new(),
        };
        let path = doc.scratch_path().to_path_buf();
        assert!(path.exists());
        drop(doc);
        assert!(!path.exists());
    }
}
