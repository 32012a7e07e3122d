//! Scripted completion client for tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::llm::client::{ChatMessage, CompletionClient, CompletionError, TokenStream};

/// A completion client that replays scripted output.
#[derive(Default)]
pub struct MockCompletionClient {
    /// Fragments replayed by `stream_chat`.
    pub chat_fragments: Vec<String>,
    /// Response returned by `generate`.
    pub generate_response: Option<String>,
    /// Fragments replayed by `generate_stream`.
    pub generate_fragments: Vec<String>,
    /// When set, every call fails at request time.
    pub fail: bool,
}

impl MockCompletionClient {
    /// Client whose chat stream replays the given fragments.
    pub fn with_chat_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chat_fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Client whose `generate` returns the given response.
    pub fn with_generate_response(response: impl Into<String>) -> Self {
        Self {
            generate_response: Some(response.into()),
            ..Self::default()
        }
    }

    /// Client whose `generate_stream` replays the given fragments.
    pub fn with_generate_fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            generate_fragments: fragments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Client that fails every call at request time.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn replay(fragments: Vec<String>) -> TokenStream {
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx.send(fragment).await.is_err() {
                    return;
                }
            }
        });
        rx
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn stream_chat(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
    ) -> Result<TokenStream, CompletionError> {
        if self.fail {
            return Err(CompletionError::HttpStatus(500));
        }
        Ok(Self::replay(self.chat_fragments.clone()))
    }

    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, CompletionError> {
        if self.fail {
            return Err(CompletionError::HttpStatus(500));
        }
        self.generate_response
            .clone()
            .ok_or(CompletionError::MalformedResponse)
    }

    async fn generate_stream(
        &self,
        _model: &str,
        _prompt: &str,
    ) -> Result<TokenStream, CompletionError> {
        if self.fail {
            return Err(CompletionError::HttpStatus(500));
        }
        Ok(Self::replay(self.generate_fragments.clone()))
    }
}
