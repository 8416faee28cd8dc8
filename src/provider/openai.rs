//! OpenAI chat-completions client: the text-only provider.
//!
//! Receives a [`TextQuery`] and nothing else. No page image or extracted
//! text ever reaches this path.

use crate::config::AssistantConfig;
use crate::error::DrawingQaError;
use crate::pipeline::context::TextQuery;
use crate::provider::{
    error_from_response, http_client, transport_error, Answer, AnswerSource, TextProvider,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "openai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    /// Set instead of `content` when the model declines.
    #[serde(default)]
    pub refusal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
}

/// Take the first choice's message content; anything else is
/// [`Answer::NoTextOutput`].
pub fn normalize_completion(completion: ChatCompletion) -> Answer {
    let Some(choice) = completion.choices.into_iter().next() else {
        warn!("Completion had no choices");
        return Answer::NoTextOutput { detail: None };
    };
    let message = choice.message.unwrap_or_default();
    match message.content {
        Some(text) if !text.trim().is_empty() => Answer::Text {
            text,
            source: AnswerSource::MessageContent,
        },
        _ => {
            let detail = message.refusal.or(choice.finish_reason);
            warn!("Completion carried no text (reason: {:?})", detail);
            Answer::NoTextOutput { detail }
        }
    }
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        model: &str,
        config: &AssistantConfig,
    ) -> Result<Self, DrawingQaError> {
        Ok(Self {
            client: http_client(PROVIDER, config)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: config.temperature,
        })
    }

    /// Point the client at a different endpoint (proxy or compatible server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// One chat-completions call. No retry.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatCompletion, DrawingQaError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        if !response.status().is_success() {
            return Err(error_from_response(PROVIDER, response).await);
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| DrawingQaError::request(PROVIDER, format!("bad response body: {e}")))?;
        if let Some(usage) = &completion.usage {
            debug!(
                "Token usage: prompt={:?} completion={:?}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(completion)
    }
}

#[async_trait]
impl TextProvider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn answer(&self, query: &TextQuery) -> Result<Answer, DrawingQaError> {
        let messages = [
            ChatMessage::system(query.instructions()),
            ChatMessage::user(query.question()),
        ];
        info!("Sending text-only question to {}", self.model);
        let completion = self.complete(&messages).await?;
        Ok(normalize_completion(completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake_server::{FakeServer, Reply};

    fn parse(json: &str) -> ChatCompletion {
        serde_json::from_str(json).expect("fixture parses")
    }

    #[test]
    fn first_choice_content_is_the_answer() {
        let c = parse(
            r#"{"id":"chatcmpl-1","object":"chat.completion",
                "choices":[{"index":0,"message":{"role":"assistant","content":"A36 is a structural steel."},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":20,"completion_tokens":7,"total_tokens":27}}"#,
        );
        assert_eq!(
            normalize_completion(c),
            Answer::Text {
                text: "A36 is a structural steel.".into(),
                source: AnswerSource::MessageContent
            }
        );
    }

    #[test]
    fn null_content_is_no_text_output() {
        let c = parse(
            r#"{"choices":[{"message":{"role":"assistant","content":null},"finish_reason":"length"}]}"#,
        );
        assert_eq!(
            normalize_completion(c),
            Answer::NoTextOutput {
                detail: Some("length".into())
            }
        );
    }

    #[test]
    fn refusal_is_reported_as_detail() {
        let c = parse(
            r#"{"choices":[{"message":{"content":null,"refusal":"I can't help with that."},"finish_reason":"stop"}]}"#,
        );
        assert_eq!(
            normalize_completion(c),
            Answer::NoTextOutput {
                detail: Some("I can't help with that.".into())
            }
        );
    }

    #[test]
    fn empty_choices_is_no_text_output() {
        assert_eq!(
            normalize_completion(parse(r#"{"choices":[]}"#)),
            Answer::NoTextOutput { detail: None }
        );
    }

    #[test]
    fn request_body_shape() {
        let messages = [
            ChatMessage::system("You are an expert in Engineering Drawing."),
            ChatMessage::user("What does HARD mean?"),
        ];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            temperature: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "You are an expert in Engineering Drawing."},
                    {"role": "user", "content": "What does HARD mean?"}
                ]
            })
        );
    }

    #[test]
    fn debug_redacts_key() {
        let p = OpenAiProvider::new("sk-secret", "gpt-4o", &AssistantConfig::default())
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("http://localhost:8080/v1\""));
    }

    fn provider_for(server: &FakeServer) -> OpenAiProvider {
        OpenAiProvider::new("sk-test", "gpt-4o", &AssistantConfig::default())
            .unwrap()
            .with_base_url(&server.base_url)
    }

    #[tokio::test]
    async fn answer_posts_bearer_chat_completion() {
        let server = FakeServer::start().await;
        server.reply(Reply::json(
            200,
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hardened steel."},
                "finish_reason":"stop"}],"usage":{"prompt_tokens":20,"completion_tokens":3}}"#,
        ));
        let provider = provider_for(&server);

        let query = TextQuery::new("You are an expert in Engineering Drawing.", "What does HARD mean?");
        let answer = provider.answer(&query).await.unwrap();
        assert_eq!(answer.text(), Some("Hardened steel."));

        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!((reqs[0].method.as_str(), reqs[0].path.as_str()), ("POST", "/chat/completions"));
        assert_eq!(reqs[0].header("authorization"), Some("Bearer sk-test"));
        let body: serde_json::Value = serde_json::from_slice(&reqs[0].body).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][1]["content"], "What does HARD mean?");
    }

    #[tokio::test]
    async fn rate_limit_message_is_surfaced_verbatim() {
        let server = FakeServer::start().await;
        server.reply(Reply::json(
            429,
            r#"{"error":{"message":"Rate limit reached for gpt-4o in organization org-x on tokens per min.",
                "type":"tokens","code":"rate_limit_exceeded"}}"#,
        ));
        let provider = provider_for(&server);

        let err = provider
            .complete(&[ChatMessage::user("What does HARD mean?")])
            .await
            .unwrap_err();
        match err {
            DrawingQaError::ProviderRequest { provider, message } => {
                assert_eq!(provider, "openai");
                assert_eq!(
                    message,
                    "Rate limit reached for gpt-4o in organization org-x on tokens per min."
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
