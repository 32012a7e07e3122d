//! WebSocket endpoint: one connection per conversation session.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;

use crate::session::{EventSink, InboundFrame, OutboundEvent, SessionError, SessionState};

use super::state::AppState;

/// Upgrade `GET /ws/{id}` to a chat session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(conversation_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state, conversation_id))
}

/// Event sink backed by the outbound half of a WebSocket.
struct WsEventSink {
    sender: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl EventSink for WsEventSink {
    async fn emit(&mut self, event: OutboundEvent) -> Result<(), SessionError> {
        let payload = serde_json::to_string(&event)?;
        self.sender
            .send(Message::Text(payload.into()))
            .await
            .map_err(|_| SessionError::SocketClosed)
    }
}

/// Drive one session: validate the conversation, then loop turns until
/// the client disconnects or an unrecoverable fault occurs.
async fn handle_session(socket: WebSocket, state: Arc<AppState>, conversation_id: String) {
    let (sender, mut receiver) = socket.split();
    let mut sink = WsEventSink { sender };

    // A connect against an unknown conversation gets one error frame,
    // outside the typed event protocol, then the socket closes.
    if state.store.get(&conversation_id).await.is_err() {
        let _ = sink
            .sender
            .send(Message::Text(
                r#"{"error":"Conversation not found"}"#.into(),
            ))
            .await;
        let _ = sink.sender.send(Message::Close(None)).await;
        return;
    }

    tracing::info!("session opened for conversation {conversation_id}");
    let mut session = SessionState::AwaitingMessage;

    while session != SessionState::Closed {
        let frame = match receiver.next().await {
            Some(Ok(frame)) => frame,
            // Read error or stream end both mean the client is gone.
            Some(Err(_)) | None => break,
        };
        match frame {
            Message::Text(text) => {
                let inbound: InboundFrame = match serde_json::from_str(text.as_str()) {
                    Ok(inbound) => inbound,
                    Err(e) => {
                        tracing::debug!("ignoring malformed frame: {e}");
                        continue;
                    }
                };
                if inbound.message.trim().is_empty() {
                    continue;
                }

                session = SessionState::Processing;
                tracing::debug!("conversation {conversation_id}: {session:?}");
                session = match state
                    .orchestrator
                    .run_turn(&conversation_id, &inbound.message, &mut sink)
                    .await
                {
                    Ok(()) => SessionState::AwaitingMessage,
                    Err(SessionError::SocketClosed) => SessionState::Closed,
                    Err(e) => {
                        tracing::warn!("session fault on {conversation_id}: {e}");
                        let _ = sink
                            .emit(OutboundEvent::Error {
                                message: e.to_string(),
                            })
                            .await;
                        SessionState::Closed
                    }
                };
            }
            Message::Close(_) => session = SessionState::Closed,
            // Pings are answered by axum; binary and pongs are ignored.
            _ => {}
        }
    }

    tracing::info!("session closed for conversation {conversation_id}");
}
