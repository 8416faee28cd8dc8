//! Gemini REST client: the multimodal provider.
//!
//! A question becomes one `generateContent` call whose parts follow the
//! [`PromptPayload`] order exactly. Page images go either through the Files
//! API (resumable upload, referenced by URI) or inline as base64, depending
//! on [`AssetMode`]. Uploaded files are deleted once the call finishes,
//! whether it succeeded or not.

use crate::config::{AssetMode, AssistantConfig};
use crate::error::DrawingQaError;
use crate::pipeline::context::{PromptPayload, Segment};
use crate::pipeline::encode::{to_base64, PAGE_MIME_TYPE};
use crate::provider::{
    error_from_response, http_client, transport_error, Answer, AnswerSource, MultimodalProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "gemini";

// ── Request wire types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

/// One request part. Serialises as exactly one of `text`, `fileData`,
/// `inlineData`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(rename = "fileUri")]
        file_uri: String,
    },
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
}

/// A page image as the provider will reference it.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetRef {
    Uploaded {
        /// Resource name (`files/…`), used to delete the file afterwards.
        name: Option<String>,
        uri: String,
        mime_type: String,
    },
    Inline { data: String, mime_type: String },
}

impl From<AssetRef> for Part {
    fn from(asset: AssetRef) -> Self {
        match asset {
            AssetRef::Uploaded { uri, mime_type, .. } => Part::FileData {
                mime_type,
                file_uri: uri,
            },
            AssetRef::Inline { data, mime_type } => Part::InlineData { mime_type, data },
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    file: UploadFileName<'a>,
}

#[derive(Debug, Serialize)]
struct UploadFileName<'a> {
    display_name: &'a str,
}

// ── Response wire types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Convenience text some gateways put at the top level.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    /// Set on thought summaries, which are not part of the answer.
    #[serde(default)]
    pub thought: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u64>,
    #[serde(default)]
    pub candidates_token_count: Option<u64>,
    #[serde(default)]
    pub total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadedFile {
    #[serde(default)]
    name: Option<String>,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Extract the answer from a response.
///
/// Order: the direct `text` field; then the text parts of the first
/// candidate joined with `\n`; otherwise [`Answer::NoTextOutput`].
pub fn normalize_response(response: GenerateContentResponse) -> Answer {
    if let Some(text) = response.text.filter(|t| !t.trim().is_empty()) {
        return Answer::Text {
            text,
            source: AnswerSource::TextField,
        };
    }

    let first = response.candidates.into_iter().next();
    let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
    let texts: Vec<String> = first
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| p.thought != Some(true))
                .filter_map(|p| p.text)
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if !texts.is_empty() {
        debug!("Answer taken from {} candidate part(s)", texts.len());
        return Answer::Text {
            text: texts.join("\n"),
            source: AnswerSource::CandidateParts,
        };
    }

    let detail = response
        .prompt_feedback
        .and_then(|f| f.block_reason)
        .or(finish_reason);
    warn!("Model returned no text (reason: {:?})", detail);
    Answer::NoTextOutput { detail }
}

// ── Client ───────────────────────────────────────────────────────────────

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    asset_mode: AssetMode,
    temperature: Option<f32>,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("asset_mode", &self.asset_mode)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    pub fn new(
        api_key: &str,
        model: &str,
        config: &AssistantConfig,
    ) -> Result<Self, DrawingQaError> {
        Ok(Self {
            client: http_client(PROVIDER, config)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.trim_start_matches("models/").to_string(),
            asset_mode: config.asset_mode,
            temperature: config.temperature,
        })
    }

    /// Point the client at a different endpoint (proxy or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Make one page image available to the model.
    ///
    /// In [`AssetMode::Inline`] this only encodes; no request is made.
    pub async fn upload_asset(
        &self,
        png: Vec<u8>,
        display_name: &str,
    ) -> Result<AssetRef, DrawingQaError> {
        if self.asset_mode == AssetMode::Inline {
            return Ok(AssetRef::Inline {
                data: to_base64(&png),
                mime_type: PAGE_MIME_TYPE.to_string(),
            });
        }

        // Resumable protocol: a start request returns the session URL, then
        // one upload+finalize request carries the bytes.
        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", png.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", PAGE_MIME_TYPE)
            .json(&UploadMetadata {
                file: UploadFileName { display_name },
            })
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !start.status().is_success() {
            return Err(error_from_response(PROVIDER, start).await);
        }
        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DrawingQaError::request(PROVIDER, "upload session returned no upload URL")
            })?;

        let size = png.len();
        let finish = self
            .client
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(png)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !finish.status().is_success() {
            return Err(error_from_response(PROVIDER, finish).await);
        }
        let uploaded: UploadResponse = finish
            .json()
            .await
            .map_err(|e| DrawingQaError::request(PROVIDER, format!("bad upload response: {e}")))?;

        info!(
            "Uploaded {} ({} bytes) as {}",
            display_name,
            size,
            uploaded.file.name.as_deref().unwrap_or(&uploaded.file.uri)
        );
        Ok(AssetRef::Uploaded {
            name: uploaded.file.name,
            uri: uploaded.file.uri,
            mime_type: uploaded
                .file
                .mime_type
                .unwrap_or_else(|| PAGE_MIME_TYPE.to_string()),
        })
    }

    /// Issue one `generateContent` call. No retry.
    pub async fn generate(
        &self,
        parts: Vec<Part>,
    ) -> Result<GenerateContentResponse, DrawingQaError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: self.temperature.map(|t| GenerationConfig {
                temperature: Some(t),
            }),
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| DrawingQaError::request(PROVIDER, format!("bad response body: {e}")))?;
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                "Token usage: prompt={:?} output={:?} total={:?}",
                usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
            );
        }
        Ok(parsed)
    }

    /// Delete one uploaded file by resource name (`files/…`).
    pub async fn delete_asset(&self, name: &str) -> Result<(), DrawingQaError> {
        let response = self
            .client
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }
        debug!("Deleted {}", name);
        Ok(())
    }

    /// Best-effort removal of this request's uploads. Failures are logged.
    async fn delete_uploaded(&self, names: &[String]) {
        for name in names {
            if let Err(e) = self.delete_asset(name).await {
                warn!("Could not delete uploaded page {}: {}", name, e);
            }
        }
    }

    /// Translate the payload into request parts, uploading each page image
    /// where it appears. Resource names of uploaded files are pushed to
    /// `uploaded` as they are created, so a failure half-way still leaves a
    /// complete list for cleanup.
    async fn build_parts(
        &self,
        payload: &PromptPayload,
        uploaded: &mut Vec<String>,
    ) -> Result<Vec<Part>, DrawingQaError> {
        let mut parts = Vec::with_capacity(payload.segments().len() + payload.image_count());
        for segment in payload.segments() {
            match segment {
                Segment::PageImage { page, label, path } => {
                    parts.push(Part::Text(label.clone()));
                    let png = tokio::fs::read(path)
                        .await
                        .map_err(|source| DrawingQaError::Scratch { source })?;
                    let asset = self.upload_asset(png, &format!("page_{page}.png")).await?;
                    if let AssetRef::Uploaded {
                        name: Some(ref name),
                        ..
                    } = asset
                    {
                        uploaded.push(name.clone());
                    }
                    parts.push(asset.into());
                }
                other => parts.push(Part::Text(other.text().to_string())),
            }
        }
        Ok(parts)
    }

    async fn upload_and_generate(
        &self,
        payload: &PromptPayload,
        uploaded: &mut Vec<String>,
    ) -> Result<GenerateContentResponse, DrawingQaError> {
        let parts = self.build_parts(payload, uploaded).await?;
        info!(
            "Sending {} part(s) for {} page(s) to {}",
            parts.len(),
            payload.page_count(),
            self.model
        );
        self.generate(parts).await
    }
}

#[async_trait]
impl MultimodalProvider for GeminiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn answer(&self, payload: &PromptPayload) -> Result<Answer, DrawingQaError> {
        let mut uploaded = Vec::new();
        let result = self.upload_and_generate(payload, &mut uploaded).await;
        self.delete_uploaded(&uploaded).await;
        Ok(normalize_response(result?))
    }
}
