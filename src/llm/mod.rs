//! Capability providers for generation and embeddings.
//!
//! The pipeline depends on the `LlmProvider` trait; `OllamaProvider` is the
//! HTTP implementation against a local Ollama server.

pub mod ollama;
pub mod provider;
pub mod types;

pub use ollama::OllamaProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest};
