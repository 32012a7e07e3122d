//! Async Ollama client.
//!
//! Streaming endpoints return NDJSON: one JSON object per line. Lines are
//! reassembled from the byte stream and forwarded fragment by fragment into
//! a bounded channel, so token delivery never blocks sibling sessions.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::llm::client::{ChatMessage, CompletionClient, CompletionError, TokenStream};

/// Environment variable for a custom Ollama URL.
const OLLAMA_URL_ENV: &str = "MOODCHAT_OLLAMA_URL";

/// Default Ollama API base URL.
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Connect timeout for all requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fragments buffered between the transport reader and the session task.
const CHANNEL_CAPACITY: usize = 64;

/// Get the Ollama base URL from the environment or use the default.
#[must_use]
pub fn ollama_base_url_from_env() -> String {
    std::env::var(OLLAMA_URL_ENV).unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string())
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatStreamLine {
    message: Option<ChatLineMessage>,
}

#[derive(Deserialize)]
struct ChatLineMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GenerateLine {
    response: Option<String>,
}

/// HTTP client for the Ollama chat and generate endpoints.
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create a client for the given base URL.
    ///
    /// `timeout` bounds the whole request including body streaming, which
    /// caps how long one completion call can run.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn post_streaming<F>(
        &self,
        path: &str,
        body: impl Serialize,
        extract: F,
    ) -> Result<TokenStream, CompletionError>
    where
        F: Fn(&[u8]) -> Option<String> + Send + 'static,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::HttpStatus(status.as_u16()));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(next) = stream.next().await {
                let bytes = match next {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        // Mid-stream transport failure: the fragments already
                        // delivered stand as the partial result.
                        tracing::warn!("completion stream ended early: {e}");
                        return;
                    }
                };
                buffer.extend_from_slice(&bytes);
                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if let Some(fragment) = extract(&line) {
                        if !fragment.is_empty() && tx.send(fragment).await.is_err() {
                            return;
                        }
                    }
                }
            }
            if let Some(fragment) = extract(&buffer) {
                if !fragment.is_empty() {
                    let _ = tx.send(fragment).await;
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn stream_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, CompletionError> {
        let request = ChatRequest {
            model,
            messages,
            stream: true,
        };
        self.post_streaming("/api/chat", &request, |line| {
            serde_json::from_slice::<ChatStreamLine>(line)
                .ok()
                .and_then(|chunk| chunk.message)
                .and_then(|message| message.content)
        })
        .await
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String, CompletionError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::HttpStatus(status.as_u16()));
        }
        let body: GenerateLine = response.json().await?;
        body.response.ok_or(CompletionError::MalformedResponse)
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
    ) -> Result<TokenStream, CompletionError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: true,
        };
        self.post_streaming("/api/generate", &request, |line| {
            serde_json::from_slice::<GenerateLine>(line)
                .ok()
                .and_then(|chunk| chunk.response)
        })
        .await
    }
}
