//! Shell-facing core: upload a drawing, configure a provider, ask questions.
//!
//! [`Assistant`] holds the only long-lived state of a session: the uploaded
//! document and the provider session. Every [`Assistant::ask`] is one
//! sequential round trip:
//!
//! ```text
//! ask(q) ──▶ rasterize (fresh scratch) ──▶ PromptPayload ──▶ provider ──▶ Answer
//! ```
//!
//! The scratch directory lives exactly as long as the call.

use crate::config::AssistantConfig;
use crate::error::DrawingQaError;
use crate::pipeline::context::{PromptPayload, TextQuery};
use crate::pipeline::input::{self, check_pdf_magic};
use crate::pipeline::render::{self, DocumentInfo};
use crate::provider::{Answer, ProviderKind, ProviderSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// A validated PDF held between questions.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    name: String,
    bytes: Arc<[u8]>,
    info: DocumentInfo,
}

impl UploadedDocument {
    pub(crate) fn new(name: String, bytes: Arc<[u8]>, info: DocumentInfo) -> Self {
        Self { name, bytes, info }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn page_count(&self) -> usize {
        self.info.page_count
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// What a dry run would have sent.
#[derive(Debug, Clone)]
pub struct PromptPreview {
    pub page_count: usize,
    /// Pages whose text was cut to the ceiling.
    pub truncated_pages: Vec<usize>,
    /// The payload as plain text, images shown as references.
    pub text: String,
}

/// One user session.
#[derive(Debug, Default)]
pub struct Assistant {
    config: AssistantConfig,
    document: Option<UploadedDocument>,
    session: Option<ProviderSession>,
}

impl Assistant {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            document: None,
            session: None,
        }
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    pub fn session(&self) -> Option<&ProviderSession> {
        self.session.as_ref()
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Validate `bytes` as a PDF and make it the current document.
    ///
    /// On failure the previously uploaded document, if any, stays current.
    pub async fn upload(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<&UploadedDocument, DrawingQaError> {
        let name = name.into();
        check_pdf_magic(&bytes)?;
        let bytes: Arc<[u8]> = bytes.into();
        let info = render::inspect(Arc::clone(&bytes)).await?;
        info!(
            "Uploaded {} ({} pages, {} bytes)",
            name,
            info.page_count,
            bytes.len()
        );
        Ok(self
            .document
            .insert(UploadedDocument::new(name, bytes, info)))
    }

    /// Load a local path or URL and upload it.
    pub async fn open(&mut self, input: &str) -> Result<&UploadedDocument, DrawingQaError> {
        let loaded = input::load_input(input, self.config.download_timeout_secs).await?;
        self.upload(loaded.name, loaded.bytes).await
    }

    // ── Provider ─────────────────────────────────────────────────────────

    /// Replace the provider session.
    ///
    /// A failed configuration clears the old session, so a later `ask`
    /// reports the configuration problem instead of silently using the
    /// previous provider.
    pub fn configure(
        &mut self,
        kind: ProviderKind,
        model: &str,
        api_key: &str,
    ) -> Result<&ProviderSession, DrawingQaError> {
        self.session = None;
        let session = ProviderSession::configure(kind, model, api_key, &self.config)?;
        Ok(self.session.insert(session))
    }

    /// Install an already-built session.
    pub fn set_session(&mut self, session: ProviderSession) {
        debug!("Session set: {:?}", session);
        self.session = Some(session);
    }

    // ── Questions ────────────────────────────────────────────────────────

    /// Answer `question` about the current document.
    ///
    /// Checks run in this order, all before any page is rendered or any
    /// request is sent: non-empty question, configured provider, uploaded
    /// document.
    pub async fn ask(&self, question: &str) -> Result<Answer, DrawingQaError> {
        if question.trim().is_empty() {
            return Err(DrawingQaError::EmptyQuestion);
        }
        let session = self.session.as_ref().ok_or_else(no_session)?;
        let document = self.document.as_ref().ok_or(DrawingQaError::NoDocument)?;
        let start = Instant::now();

        let answer = match session {
            ProviderSession::Multimodal(provider) => {
                let rasterized = render::rasterize(Arc::clone(&document.bytes), &self.config).await?;
                let payload =
                    PromptPayload::build(rasterized.pages(), question, self.config.instructions());
                debug!(
                    "Payload: {} segment(s), {} image(s)",
                    payload.segments().len(),
                    payload.image_count()
                );
                provider.answer(&payload).await?
            }
            ProviderSession::TextOnly(provider) => {
                let query = TextQuery::new(self.config.text_instructions(), question);
                provider.answer(&query).await?
            }
        };

        info!(
            "Answered with {} / {} in {}ms",
            session.provider_name(),
            session.model(),
            start.elapsed().as_millis()
        );
        Ok(answer)
    }

    /// Build the multimodal payload without sending it.
    pub async fn dry_run(&self, question: &str) -> Result<PromptPreview, DrawingQaError> {
        if question.trim().is_empty() {
            return Err(DrawingQaError::EmptyQuestion);
        }
        let document = self.document.as_ref().ok_or(DrawingQaError::NoDocument)?;
        let rasterized = render::rasterize(Arc::clone(&document.bytes), &self.config).await?;
        let payload = PromptPayload::build(rasterized.pages(), question, self.config.instructions());
        Ok(PromptPreview {
            page_count: payload.page_count(),
            truncated_pages: rasterized
                .pages()
                .iter()
                .filter(|p| p.text_truncated)
                .map(|p| p.number)
                .collect(),
            text: payload.flatten(),
        })
    }

    /// Render the current document and copy the page images into `dir`.
    pub async fn preview(&self, dir: &Path) -> Result<Vec<PathBuf>, DrawingQaError> {
        let document = self.document.as_ref().ok_or(DrawingQaError::NoDocument)?;
        let rasterized = render::rasterize(Arc::clone(&document.bytes), &self.config).await?;
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || rasterized.save_previews(&dir))
            .await
            .map_err(|e| DrawingQaError::Internal(format!("Preview task panicked: {}", e)))?
    }
}

fn no_session() -> DrawingQaError {
    DrawingQaError::config(
        "none",
        "Choose a provider and enter an API key: :config <gemini|openai> [model] [key]",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::Segment;
    use crate::provider::{AnswerSource, MultimodalProvider, TextProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingText {
        calls: AtomicUsize,
        seen: Mutex<Option<TextQuery>>,
    }

    #[async_trait]
    impl TextProvider for RecordingText {
        fn name(&self) -> &str {
            "fake-text"
        }
        fn model(&self) -> &str {
            "fake-1"
        }
        async fn answer(&self, query: &TextQuery) -> Result<Answer, DrawingQaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(query.clone());
            Ok(Answer::Text {
                text: "Hardness callout.".into(),
                source: AnswerSource::MessageContent,
            })
        }
    }

    #[derive(Default)]
    struct CountingMultimodal {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MultimodalProvider for CountingMultimodal {
        fn name(&self) -> &str {
            "fake-mm"
        }
        fn model(&self) -> &str {
            "fake-vision"
        }
        async fn answer(&self, payload: &PromptPayload) -> Result<Answer, DrawingQaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(matches!(payload.segments()[0], Segment::Instructions(_)));
            Ok(Answer::NoTextOutput { detail: None })
        }
    }

    fn fake_document() -> UploadedDocument {
        UploadedDocument::new(
            "drawing.pdf".into(),
            Arc::from(&b"%PDF-1.4 not really"[..]),
            DocumentInfo {
                page_count: 2,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn ask_without_session_is_a_config_error() {
        let mut assistant = Assistant::default();
        assistant.document = Some(fake_document());
        let err = assistant.ask("What scale?").await.unwrap_err();
        assert!(err.is_config_error(), "{err:?}");
    }

    #[tokio::test]
    async fn failed_configure_clears_previous_session() {
        let mut assistant = Assistant::default();
        assistant.set_session(ProviderSession::text_only(Arc::new(RecordingText::default())));
        assistant.document = Some(fake_document());

        assert!(assistant
            .configure(ProviderKind::Gemini, "gemini-2.5-pro", "")
            .is_err());
        assert!(assistant.session().is_none());
        let err = assistant.ask("What scale?").await.unwrap_err();
        assert!(matches!(err, DrawingQaError::ProviderConfig { .. }));
    }

    #[tokio::test]
    async fn empty_question_is_rejected_before_provider() {
        let text = Arc::new(RecordingText::default());
        let mut assistant = Assistant::default();
        assistant.set_session(ProviderSession::text_only(text.clone()));
        assistant.document = Some(fake_document());

        let err = assistant.ask("   ").await.unwrap_err();
        assert!(matches!(err, DrawingQaError::EmptyQuestion));
        assert_eq!(text.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ask_without_document_fails_without_calling_provider() {
        let mm = Arc::new(CountingMultimodal::default());
        let mut assistant = Assistant::default();
        assistant.set_session(ProviderSession::multimodal(mm.clone()));

        let err = assistant.ask("List the weldments").await.unwrap_err();
        assert!(matches!(err, DrawingQaError::NoDocument));
        assert_eq!(mm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_only_path_sends_question_only() {
        let text = Arc::new(RecordingText::default());
        let mut assistant = Assistant::default();
        assistant.set_session(ProviderSession::text_only(text.clone()));
        // Not a renderable PDF: the text path must never rasterise it.
        assistant.document = Some(fake_document());

        let answer = assistant.ask("What does HARD mean?").await.unwrap();
        assert_eq!(answer.text(), Some("Hardness callout."));
        assert_eq!(text.calls.load(Ordering::SeqCst), 1);

        let seen = text.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.question(), "What does HARD mean?");
        assert_eq!(seen.instructions(), crate::prompts::TEXT_ONLY_INSTRUCTIONS);
    }

    #[tokio::test]
    async fn upload_rejects_non_pdf_and_keeps_previous_document() {
        let mut assistant = Assistant::default();
        assistant.document = Some(fake_document());

        let err = assistant
            .upload("notes.txt", b"hello world".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, DrawingQaError::DocumentOpen { .. }));
        assert_eq!(assistant.document().map(|d| d.name()), Some("drawing.pdf"));
    }

    #[tokio::test]
    async fn multimodal_ask_on_corrupt_pdf_is_document_error() {
        if !crate::pipeline::pdfium::is_available() {
            eprintln!("SKIP: pdfium library not available");
            return;
        }
        let mm = Arc::new(CountingMultimodal::default());
        let mut assistant = Assistant::default();
        assistant.set_session(ProviderSession::multimodal(mm.clone()));
        assistant.document = Some(fake_document());

        let err = assistant.ask("What scale?").await.unwrap_err();
        assert!(matches!(err, DrawingQaError::DocumentOpen { .. }), "{err:?}");
        assert_eq!(mm.calls.load(Ordering::SeqCst), 0);
    }
}
