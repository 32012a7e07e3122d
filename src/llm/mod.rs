//! Text-generation client abstractions and the Ollama implementation.

pub mod client;
#[cfg(test)]
pub mod mock;
pub mod ollama;

pub use client::{ChatMessage, CompletionClient, CompletionError, TokenStream};
pub use ollama::OllamaClient;
