//! LLM provider abstraction used by the content analyzer.
//!
//! Each backend (OpenAI-compatible, Anthropic, Gemini, Ollama) implements
//! [`LlmProvider`]; [`providers::create_provider`] picks one from config.

pub mod provider;
pub mod providers;

pub use provider::{CompletionRequest, LlmError, LlmProvider, Message, Role};
pub use providers::create_provider;
