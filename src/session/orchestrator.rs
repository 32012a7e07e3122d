//! Per-session turn pipeline.
//!
//! Drives one conversation's turns strictly sequentially: a new inbound
//! message is not processed until the previous turn's pipeline has fully
//! returned control to the receive loop.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::llm::{ChatMessage, CompletionClient};
use crate::session::events::{EventSink, OutboundEvent, SessionError};
use crate::session::relay::StreamRelay;
use crate::store::{ConversationStore, Role};
use crate::theme::{ThemeDescriptor, ThemeEngine};

/// Message sent alongside `theme_error`; the previous theme stays active.
const THEME_ERROR_MESSAGE: &str = "Failed to generate theme, using default";

/// Lifecycle of one WebSocket session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next user message.
    AwaitingMessage,
    /// A turn pipeline is in flight.
    Processing,
    /// The connection is gone; no further events will be delivered.
    Closed,
}

/// Orchestrates the two concurrent external calls of each turn and the
/// ordered event sequence delivered to the client.
pub struct ChatSessionOrchestrator {
    store: Arc<dyn ConversationStore>,
    completions: Arc<dyn CompletionClient>,
    themes: Arc<ThemeEngine>,
    chat_model: String,
    context_window: usize,
}

impl ChatSessionOrchestrator {
    /// Wire up the orchestrator with its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        completions: Arc<dyn CompletionClient>,
        themes: Arc<ThemeEngine>,
        chat_model: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            store,
            completions,
            themes,
            chat_model: chat_model.into(),
            context_window,
        }
    }

    /// Run one turn: persist the user message, stream the completion, and
    /// deliver the theme outcome, in the protocol's event order.
    ///
    /// The theme task persists its own result, so a disconnect mid-turn
    /// means the derived theme is stored but never delivered.
    ///
    /// # Errors
    /// Any error here is a session fault; the caller reports it once via
    /// an `error` frame and tears the session down.
    pub async fn run_turn<S: EventSink>(
        &self,
        conversation_id: &str,
        user_text: &str,
        sink: &mut S,
    ) -> Result<(), SessionError> {
        self.store
            .append_message(conversation_id, Role::User, user_text)
            .await?;
        let turn = self
            .store
            .increment_user_message_count(conversation_id)
            .await?;
        tracing::debug!("processing turn {turn} of conversation {conversation_id}");

        // Context snapshot: custom context plus the recent message window,
        // which already includes the user message persisted above.
        let conversation = self.store.get(conversation_id).await?;
        let recent = self
            .store
            .list_messages(conversation_id, Some(self.context_window))
            .await?;
        let mut chat = Vec::with_capacity(recent.len() + 1);
        chat.push(ChatMessage::new(
            Role::System,
            build_system_prompt(&conversation.custom_context),
        ));
        chat.extend(
            recent
                .into_iter()
                .map(|m| ChatMessage::new(m.role, m.content)),
        );

        // Theme derivation runs concurrently with the completion stream;
        // the two tasks share no mutable state.
        let theme_task = self.spawn_theme_task(conversation_id);

        let tokens = self.completions.stream_chat(&self.chat_model, &chat).await?;
        let response = StreamRelay::run(tokens, sink).await?;
        self.store
            .append_message(conversation_id, Role::Assistant, &response)
            .await?;

        match theme_task.await {
            Ok(Some(descriptor)) => {
                sink.emit(OutboundEvent::ThemeUpdate { theme: descriptor })
                    .await?;
            }
            Ok(None) => {
                sink.emit(OutboundEvent::ThemeError {
                    message: THEME_ERROR_MESSAGE.to_string(),
                })
                .await?;
            }
            Err(e) => {
                tracing::warn!("theme task failed to join: {e}");
                sink.emit(OutboundEvent::ThemeError {
                    message: THEME_ERROR_MESSAGE.to_string(),
                })
                .await?;
            }
        }

        self.store.touch_updated_at(conversation_id).await?;
        Ok(())
    }

    /// Spawn the theme sub-task.
    ///
    /// Derives over the full history including the just-added user message
    /// and persists the result itself. The task is detached: if the
    /// session dies before it finishes, the theme is still stored.
    fn spawn_theme_task(&self, conversation_id: &str) -> JoinHandle<Option<ThemeDescriptor>> {
        let store = Arc::clone(&self.store);
        let themes = Arc::clone(&self.themes);
        let id = conversation_id.to_owned();
        tokio::spawn(async move {
            let history = match store.list_messages(&id, None).await {
                Ok(history) => history,
                Err(e) => {
                    tracing::warn!("could not load theme context for {id}: {e}");
                    return None;
                }
            };
            let descriptor = themes.derive(&id, &history).await?;
            if let Err(e) = store.save_theme(&id, &descriptor).await {
                tracing::warn!("could not persist theme for {id}: {e}");
            }
            Some(descriptor)
        })
    }
}

/// System prompt combining the conversation's custom context.
fn build_system_prompt(custom_context: &str) -> String {
    if custom_context.is_empty() {
        "You are a helpful AI assistant.".to_string()
    } else {
        format!("{custom_context}\n\nRespond naturally and contextually.")
    }
}
