//! Binding to the pdfium shared library.
//!
//! Resolution order (first match wins):
//!
//! 1. `PDFIUM_LIB_PATH`: a file path to libpdfium, or a directory holding it
//! 2. `libpdfium` next to the current working directory
//! 3. the system library search path
//!
//! Binding happens per request inside the blocking render task, matching how
//! pdfium is used everywhere else in the pipeline.

use crate::error::DrawingQaError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

/// Environment variable naming an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to pdfium following the resolution order above.
pub fn bind() -> Result<Pdfium, DrawingQaError> {
    if let Ok(raw) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !raw.is_empty() {
            let path = library_path(PathBuf::from(raw));
            debug!("Binding pdfium from {}", path.display());
            return Pdfium::bind_to_library(&path)
                .map(Pdfium::new)
                .map_err(|e| {
                    DrawingQaError::PdfiumBindingFailed(format!("{}: {e:?}", path.display()))
                });
        }
    }

    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| DrawingQaError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// True when a pdfium library can be bound in this process.
pub fn is_available() -> bool {
    bind().is_ok()
}

/// Accept either the library file itself or its containing directory.
fn library_path(raw: PathBuf) -> PathBuf {
    if raw.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(&raw)
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_resolves_to_platform_library_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_path(dir.path().to_path_buf());
        assert!(resolved.starts_with(dir.path()));
        assert!(resolved.to_string_lossy().contains("pdfium"));
    }

    #[test]
    fn file_path_is_kept() {
        let p = PathBuf::from("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_path(p.clone()), p);
    }
}
