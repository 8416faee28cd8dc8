//! Pipeline stages for answering a question about a drawing.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ context ──▶ provider (crate::provider)
//! (bytes)   (pdfium)   (payload)   (remote LLM)
//! ```
//!
//! 1. [`input`]  : load a path or URL into validated PDF bytes
//! 2. [`pdfium`] : bind the pdfium shared library
//! 3. [`render`] : rasterise every page and extract its text into a
//!    request-scoped scratch directory; runs in `spawn_blocking`
//! 4. [`encode`] : PNG and base64 helpers for page assets
//! 5. [`context`]: assemble the ordered prompt payload

pub mod context;
pub mod encode;
pub mod input;
pub mod pdfium;
pub mod render;
