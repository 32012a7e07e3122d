//! Shared application state.

use std::sync::Arc;

use crate::config::MoodchatConfig;
use crate::llm::{CompletionClient, OllamaClient};
use crate::session::ChatSessionOrchestrator;
use crate::store::{ConversationStore, SqliteConversationStore};
use crate::theme::ThemeEngine;

/// State shared by every HTTP handler and WebSocket session.
pub struct AppState {
    /// Resolved runtime configuration.
    pub config: MoodchatConfig,
    /// Conversation storage.
    pub store: Arc<dyn ConversationStore>,
    /// Per-turn pipeline shared by all sessions.
    pub orchestrator: ChatSessionOrchestrator,
}

impl AppState {
    /// Open storage and wire up the orchestration stack.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the HTTP
    /// client cannot be built.
    pub async fn new(
        config: MoodchatConfig,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let store: Arc<dyn ConversationStore> =
            Arc::new(SqliteConversationStore::open(&config.database_path).await?);
        Ok(Self::with_store(config, store)?)
    }

    /// Assemble state over an already-open store. Lets tests swap in the
    /// in-memory implementation.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(
        config: MoodchatConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let completions: Arc<dyn CompletionClient> = Arc::new(OllamaClient::new(
            config.ollama_base_url.clone(),
            config.completion_timeout,
        )?);
        Ok(Self::assemble(config, store, completions))
    }

    /// Assemble state from fully explicit collaborators.
    #[must_use]
    pub fn assemble(
        config: MoodchatConfig,
        store: Arc<dyn ConversationStore>,
        completions: Arc<dyn CompletionClient>,
    ) -> Arc<Self> {
        let themes = Arc::new(ThemeEngine::new(
            Arc::clone(&completions),
            config.theme_model.clone(),
            config.theme_mode,
            config.theme_timeout,
        ));
        let orchestrator = ChatSessionOrchestrator::new(
            Arc::clone(&store),
            completions,
            themes,
            config.chat_model.clone(),
            config.context_window,
        );
        Arc::new(Self {
            config,
            store,
            orchestrator,
        })
    }
}
