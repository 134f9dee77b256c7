//! Chat proxy to the Gemini `generateContent` API.

mod config;
mod error;
mod gemini;
mod service;

pub use config::{CredentialSource, LlmSettings, API_KEY_VAR, DEFAULT_API_BASE, DEFAULT_MODEL};
pub use error::ChatError;
pub use gemini::extract_text;
pub use service::{ChatService, ChatStream};
