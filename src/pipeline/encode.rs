//! Image encoding: `DynamicImage` → PNG bytes, and PNG → base64.
//!
//! PNG is lossless; thin drawing lines and small BOM text survive it, where
//! JPEG ringing would blur them.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every page asset produced by the rasteriser.
pub const PAGE_MIME_TYPE: &str = "image/png";

/// Encode a rendered page as PNG bytes.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded {}x{} page → {} bytes PNG", img.width(), img.height(), buf.len());
    Ok(buf)
}

/// Base64-encode PNG bytes for an inline request part.
pub fn to_base64(png: &[u8]) -> String {
    STANDARD.encode(png)
}
