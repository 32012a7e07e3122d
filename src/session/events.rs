//! Session protocol frames and the outbound event sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::CompletionError;
use crate::store::StoreError;
use crate::theme::ThemeDescriptor;

/// Inbound WebSocket frame.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// The user's message text.
    #[serde(default)]
    pub message: String,
}

/// Ordered outbound frames for one turn.
///
/// Wire shape: `{"type":"chunk","content":"..."}` and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// Response streaming begins.
    Start,
    /// One non-empty response fragment, in generation order.
    Chunk {
        /// Fragment text.
        content: String,
    },
    /// Response streaming finished; all of this turn's chunks are out.
    End,
    /// A freshly derived theme, after `end`.
    ThemeUpdate {
        /// The new descriptor.
        theme: ThemeDescriptor,
    },
    /// Theme derivation failed; the previous theme stays in effect.
    ThemeError {
        /// Human-readable reason.
        message: String,
    },
    /// Unhandled session fault; sent once, then the session is torn down.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Errors surfaced by the per-turn pipeline.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Completion request failure.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// Outbound frame could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client connection is gone.
    #[error("socket closed")]
    SocketClosed,
}

/// Destination for outbound session events.
///
/// The WebSocket sender implements this in production; tests use a
/// collecting sink.
#[async_trait]
pub trait EventSink: Send {
    /// Deliver one event to the client.
    ///
    /// # Errors
    /// Returns [`SessionError::SocketClosed`] if the client is gone.
    async fn emit(&mut self, event: OutboundEvent) -> Result<(), SessionError>;
}

/// Sink that records events in order. Test helper.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct CollectingSink {
    pub events: Vec<OutboundEvent>,
}

#[cfg(test)]
#[async_trait]
impl EventSink for CollectingSink {
    async fn emit(&mut self, event: OutboundEvent) -> Result<(), SessionError> {
        self.events.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeCategory;

    #[test]
    fn test_event_wire_format() {
        assert_eq!(
            serde_json::to_string(&OutboundEvent::Start).unwrap(),
            r#"{"type":"start"}"#
        );
        assert_eq!(
            serde_json::to_string(&OutboundEvent::Chunk {
                content: "hi".to_string()
            })
            .unwrap(),
            r#"{"type":"chunk","content":"hi"}"#
        );
        assert_eq!(
            serde_json::to_string(&OutboundEvent::ThemeUpdate {
                theme: ThemeDescriptor::Category(ThemeCategory::Cozy)
            })
            .unwrap(),
            r#"{"type":"theme_update","theme":"cozy"}"#
        );
    }

    #[test]
    fn test_inbound_frame_tolerates_missing_field() {
        let frame: InboundFrame = serde_json::from_str("{}").unwrap();
        assert!(frame.message.is_empty());
    }
}
