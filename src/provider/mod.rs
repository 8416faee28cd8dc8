//! Inference gateway: the two provider capabilities and the session that
//! holds one of them.
//!
//! The capability difference is carried by the types:
//!
//! * [`MultimodalProvider`] receives the whole [`PromptPayload`] (images and
//!   text interleaved).
//! * [`TextProvider`] receives only a [`TextQuery`]: a short instruction and
//!   the question. It never sees page images or extracted text.
//!
//! [`ProviderSession`] is an enum over the two. It is created by
//! [`ProviderSession::configure`], held by the shell, and replaced wholesale
//! on reconfiguration.

pub mod gemini;
pub mod openai;

#[cfg(test)]
mod fake_server;

use crate::config::AssistantConfig;
use crate::error::DrawingQaError;
use crate::pipeline::context::{PromptPayload, TextQuery};
use crate::prompts::NO_TEXT_OUTPUT;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

// ── Answers ──────────────────────────────────────────────────────────────

/// Where the answer text was found in the provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// The response's direct `text` field.
    TextField,
    /// Concatenated text parts of the first candidate.
    CandidateParts,
    /// A chat-completion message body.
    MessageContent,
}

/// Result of a completed provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    Text { text: String, source: AnswerSource },
    /// The call succeeded but carried no text. Informational, not an error.
    NoTextOutput {
        /// Finish or block reason reported by the provider, if any.
        detail: Option<String>,
    },
}

impl Answer {
    /// The answer text, if there is one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Text { text, .. } => Some(text),
            Answer::NoTextOutput { .. } => None,
        }
    }

    /// What the shell shows: the text, or the informational marker.
    pub fn display_text(&self) -> String {
        match self {
            Answer::Text { text, .. } => text.clone(),
            Answer::NoTextOutput { detail: None } => NO_TEXT_OUTPUT.to_string(),
            Answer::NoTextOutput {
                detail: Some(reason),
            } => format!("{NO_TEXT_OUTPUT} (reason: {reason})"),
        }
    }
}

// ── Capabilities ─────────────────────────────────────────────────────────

/// A provider that reads page images and text together.
#[async_trait]
pub trait MultimodalProvider: Send + Sync {
    /// Provider identity, e.g. `"gemini"`.
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn answer(&self, payload: &PromptPayload) -> Result<Answer, DrawingQaError>;
}

/// A provider that only accepts the question and a short instruction.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider identity, e.g. `"openai"`.
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    async fn answer(&self, query: &TextQuery) -> Result<Answer, DrawingQaError>;
}

/// Which of the two capabilities a session offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Multimodal,
    TextOnly,
}

// ── Provider selection ───────────────────────────────────────────────────

/// The providers the shell can configure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Model pre-filled when the user does not pick one.
    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.5-pro",
            ProviderKind::OpenAi => "gpt-4o",
        }
    }

    /// Environment variable the shell reads the API key from.
    pub fn api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn capability(self) -> Capability {
        match self {
            ProviderKind::Gemini => Capability::Multimodal,
            ProviderKind::OpenAi => Capability::TextOnly,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = DrawingQaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" | "open-ai" => Ok(ProviderKind::OpenAi),
            other => Err(DrawingQaError::config(
                other,
                "Supported providers: gemini, openai.",
            )),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────────

/// The configured provider for a UI session.
#[derive(Clone)]
pub enum ProviderSession {
    Multimodal(Arc<dyn MultimodalProvider>),
    TextOnly(Arc<dyn TextProvider>),
}

impl ProviderSession {
    /// Establish a session for `kind` with the given model and API key.
    ///
    /// No network traffic happens here. A blank key or model fails with
    /// [`DrawingQaError::ProviderConfig`].
    pub fn configure(
        kind: ProviderKind,
        model: &str,
        api_key: &str,
        config: &AssistantConfig,
    ) -> Result<Self, DrawingQaError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(DrawingQaError::config(
                kind.name(),
                format!(
                    "Please enter an API key (or set {}).",
                    kind.api_key_env()
                ),
            ));
        }
        let model = model.trim();
        if model.is_empty() {
            return Err(DrawingQaError::config(
                kind.name(),
                format!("Please enter a model name, e.g. {}.", kind.default_model()),
            ));
        }

        let session = match kind {
            ProviderKind::Gemini => ProviderSession::Multimodal(Arc::new(
                gemini::GeminiProvider::new(api_key, model, config)?,
            )),
            ProviderKind::OpenAi => ProviderSession::TextOnly(Arc::new(
                openai::OpenAiProvider::new(api_key, model, config)?,
            )),
        };
        info!("Configured {} with model {}", kind, model);
        Ok(session)
    }

    /// Wrap an already-built multimodal provider.
    pub fn multimodal(provider: Arc<dyn MultimodalProvider>) -> Self {
        ProviderSession::Multimodal(provider)
    }

    /// Wrap an already-built text-only provider.
    pub fn text_only(provider: Arc<dyn TextProvider>) -> Self {
        ProviderSession::TextOnly(provider)
    }

    pub fn provider_name(&self) -> &str {
        match self {
            ProviderSession::Multimodal(p) => p.name(),
            ProviderSession::TextOnly(p) => p.name(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderSession::Multimodal(p) => p.model(),
            ProviderSession::TextOnly(p) => p.model(),
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            ProviderSession::Multimodal(_) => Capability::Multimodal,
            ProviderSession::TextOnly(_) => Capability::TextOnly,
        }
    }
}

impl fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSession")
            .field("provider", &self.provider_name())
            .field("model", &self.model())
            .field("capability", &self.capability())
            .finish()
    }
}

// ── Shared HTTP helpers ──────────────────────────────────────────────────

/// `{"error": {"message": "..."}}`, the error body both providers use.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Build the HTTP client for a provider, with the per-call timeout.
pub(crate) fn http_client(
    provider: &str,
    config: &AssistantConfig,
) -> Result<reqwest::Client, DrawingQaError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| DrawingQaError::config(provider, format!("HTTP client setup failed: {e}")))
}

/// Map a transport-level failure to a request error.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> DrawingQaError {
    if e.is_timeout() {
        DrawingQaError::request(provider, "request timed out")
    } else {
        DrawingQaError::request(provider, e.to_string())
    }
}

/// Turn a non-success response into a request error carrying the
/// provider's own message.
pub(crate) async fn error_from_response(
    provider: &str,
    response: reqwest::Response,
) -> DrawingQaError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    DrawingQaError::request(provider, error_message(status, &body))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    }
}
