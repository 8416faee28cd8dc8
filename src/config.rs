//! Configuration for the rasterise → prompt → answer pipeline.
//!
//! Every tunable lives in [`AssistantConfig`], built via
//! [`AssistantConfigBuilder`]. Provider identity and credentials are *not*
//! here: they belong to the [`crate::provider::ProviderSession`], which the
//! shell recreates whenever the user reconfigures.

use crate::error::DrawingQaError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default page zoom. 1.0 renders one pixel per PDF point (72 DPI).
pub const DEFAULT_ZOOM: f32 = 2.0;

/// Default per-page ceiling for extracted text, in characters.
pub const DEFAULT_MAX_PAGE_CHARS: usize = 6000;

/// Configuration shared by every request of an assistant session.
///
/// # Example
/// ```rust
/// use drawing_qa::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .zoom(3.0)
///     .max_page_chars(4000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_page_chars, 4000);
/// ```
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Page zoom factor applied when rasterising. Range: 0.5–8.0. Default: 2.0.
    ///
    /// Pixel size is the page size in points multiplied by this factor, so
    /// 2.0 corresponds to 144 DPI.
    pub zoom: f32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Applied after `zoom`. An A0 sheet at 2× would otherwise be close to
    /// 6700 × 4800 px.
    pub max_rendered_pixels: u32,

    /// Ceiling on extracted text per page, in characters. Default: 6000.
    pub max_page_chars: usize,

    /// Instruction block for the multimodal path. If None, uses
    /// [`crate::prompts::DEFAULT_INSTRUCTIONS`].
    pub instructions: Option<String>,

    /// System instruction for the text-only path. If None, uses
    /// [`crate::prompts::TEXT_ONLY_INSTRUCTIONS`].
    pub text_instructions: Option<String>,

    /// How page images reach the multimodal provider. Default: upload.
    pub asset_mode: AssetMode,

    /// Sampling temperature. If None, the provider default applies.
    pub temperature: Option<f32>,

    /// Timeout for a single provider call in seconds. Default: 300.
    pub request_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Directory under which per-request scratch directories are created.
    /// If None, the system temp directory is used.
    pub scratch_root: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            max_rendered_pixels: 4000,
            max_page_chars: DEFAULT_MAX_PAGE_CHARS,
            instructions: None,
            text_instructions: None,
            asset_mode: AssetMode::default(),
            temperature: None,
            request_timeout_secs: 300,
            download_timeout_secs: 120,
            scratch_root: None,
        }
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// The instruction block in effect for the multimodal path.
    pub fn instructions(&self) -> &str {
        self.instructions
            .as_deref()
            .unwrap_or(crate::prompts::DEFAULT_INSTRUCTIONS)
    }

    /// The system instruction in effect for the text-only path.
    pub fn text_instructions(&self) -> &str {
        self.text_instructions
            .as_deref()
            .unwrap_or(crate::prompts::TEXT_ONLY_INSTRUCTIONS)
    }
}

/// Builder for [`AssistantConfig`].
#[derive(Debug)]
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl AssistantConfigBuilder {
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.config.zoom = zoom.clamp(0.5, 8.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_page_chars(mut self, n: usize) -> Self {
        self.config.max_page_chars = n.max(1);
        self
    }

    pub fn instructions(mut self, text: impl Into<String>) -> Self {
        self.config.instructions = Some(text.into());
        self
    }

    pub fn text_instructions(mut self, text: impl Into<String>) -> Self {
        self.config.text_instructions = Some(text.into());
        self
    }

    pub fn asset_mode(mut self, mode: AssetMode) -> Self {
        self.config.asset_mode = mode;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn scratch_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = Some(dir.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, DrawingQaError> {
        let c = &self.config;
        if !c.zoom.is_finite() || c.zoom < 0.5 || c.zoom > 8.0 {
            return Err(DrawingQaError::InvalidConfig(format!(
                "zoom must be 0.5–8.0, got {}",
                c.zoom
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(DrawingQaError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref text) = c.instructions {
            if text.trim().is_empty() {
                return Err(DrawingQaError::InvalidConfig(
                    "instruction block must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// How page images are handed to the multimodal provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssetMode {
    /// Upload each page through the provider's file API and reference it. (default)
    #[default]
    Upload,
    /// Embed each page as base64 PNG in the request body.
    Inline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let c = AssistantConfig::default();
        assert_eq!(c.zoom, 2.0);
        assert_eq!(c.max_page_chars, 6000);
        assert_eq!(c.asset_mode, AssetMode::Upload);
        assert!(c.instructions().contains("Engineering Drawing"));
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = AssistantConfig::builder()
            .zoom(40.0)
            .max_page_chars(0)
            .max_rendered_pixels(5)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.zoom, 8.0);
        assert_eq!(c.max_page_chars, 1);
        assert_eq!(c.max_rendered_pixels, 100);
        assert_eq!(c.temperature, Some(2.0));
    }

    #[test]
    fn builder_rejects_blank_instructions() {
        let err = AssistantConfig::builder()
            .instructions("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, DrawingQaError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(AssistantConfig::builder()
            .request_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn instruction_override_wins() {
        let c = AssistantConfig::builder()
            .instructions("Only read the title block.")
            .build()
            .unwrap();
        assert_eq!(c.instructions(), "Only read the title block.");
    }
}
