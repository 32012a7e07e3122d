//! Completion client contract consumed by the session core.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::store::Role;

/// A lazy, finite, non-restartable sequence of text fragments.
///
/// The producing side closes the channel when the stream ends. If the
/// underlying transport fails mid-stream the channel closes early and the
/// already-delivered fragments stand as the partial result.
pub type TokenStream = mpsc::Receiver<String>;

/// One turn of dialogue handed to the completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a message for the given role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Errors produced by completion clients.
///
/// No retries happen at this layer; each call is attempted exactly once.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Completion service answered with a non-success status.
    #[error("completion service returned status {0}")]
    HttpStatus(u16),

    /// Response body could not be interpreted.
    #[error("malformed completion response")]
    MalformedResponse,
}

/// Abstraction over the text-generation service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Stream a chat completion for an ordered message list.
    ///
    /// # Errors
    /// Returns an error if the request cannot be issued; mid-stream
    /// transport failures terminate the returned stream early instead.
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, CompletionError>;

    /// Single-shot prompt completion.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response is malformed.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, CompletionError>;

    /// Streaming prompt completion.
    ///
    /// # Errors
    /// Returns an error if the request cannot be issued.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<TokenStream, CompletionError>;
}
