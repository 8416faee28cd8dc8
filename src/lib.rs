//! # drawing-qa
//!
//! Ask natural-language questions about engineering-drawing PDFs.
//!
//! Drawings carry most of their meaning in geometry, callouts and tables
//! that a text layer flattens or drops. This crate renders every page to a
//! PNG, keeps the page's extracted text next to it, and sends both, in page
//! order, to a multimodal language model together with a fixed instruction
//! block about bills of materials and title blocks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Input    resolve local file or download from URL, check %PDF
//!  ├─ 2. Render   rasterise pages + extract text via pdfium (spawn_blocking)
//!  ├─ 3. Context  instructions, page count, question, then image/text per page
//!  └─ 4. Provider Gemini (multimodal) or OpenAI (question only)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drawing_qa::{Assistant, AssistantConfig, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut assistant = Assistant::new(AssistantConfig::default());
//!     assistant.open("assembly.pdf").await?;
//!
//!     let key = std::env::var("GEMINI_API_KEY")?;
//!     assistant.configure(ProviderKind::Gemini, "gemini-2.5-pro", &key)?;
//!
//!     let answer = assistant.ask("List every weldment with its detail number.").await?;
//!     println!("{}", answer.display_text());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `drawing-qa` shell (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! drawing-qa = { version = "0.1", default-features = false }
//! ```
//!
//! ## Providers
//!
//! | Provider | Capability | Default model | Key variable |
//! |----------|------------|---------------|--------------|
//! | `gemini` | pages as images + text | `gemini-2.5-pro` | `GEMINI_API_KEY` |
//! | `openai` | question only | `gpt-4o` | `OPENAI_API_KEY` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assistant;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod provider;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assistant::{Assistant, PromptPreview, UploadedDocument};
pub use config::{AssetMode, AssistantConfig, AssistantConfigBuilder};
pub use error::DrawingQaError;
pub use pipeline::context::{PromptPayload, Segment, TextQuery};
pub use pipeline::render::{inspect, rasterize, DocumentInfo, RasterizedDocument, RasterizedPage};
pub use provider::{
    Answer, AnswerSource, Capability, MultimodalProvider, ProviderKind, ProviderSession,
    TextProvider,
};
