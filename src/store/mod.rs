//! Durable storage for conversations, messages, and cached themes.
//!
//! [`ConversationStore`] is the contract shared by the authoritative
//! `SQLite` implementation and the in-memory implementation used in tests.
//! All implementations must be safe under concurrent callers: no
//! multi-statement write is ever partially observable.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use types::{
    generate_conversation_id, now_timestamp, Conversation, ConversationSummary, Message, Role,
    StoreStats, ThemeRecord,
};

use async_trait::async_trait;

use crate::theme::ThemeDescriptor;

/// Storage contract for conversations, messages, and theme records.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a new conversation.
    ///
    /// # Errors
    /// Returns [`StoreError::DuplicateKey`] if the id is already in use.
    async fn create(&self, id: &str, title: &str, custom_context: &str)
        -> StoreResult<Conversation>;

    /// Fetch a conversation with its ordered messages and current theme.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn get(&self, id: &str) -> StoreResult<Conversation>;

    /// List all conversation summaries, most recently updated first.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    async fn list(&self) -> StoreResult<Vec<ConversationSummary>>;

    /// Partially update title and/or custom context; bumps `updated_at`.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn update(
        &self,
        id: &str,
        title: Option<String>,
        custom_context: Option<String>,
    ) -> StoreResult<Conversation>;

    /// Delete a conversation, cascading to its messages and theme record.
    ///
    /// Returns whether a row existed.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Bump `updated_at` to the current time.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn touch_updated_at(&self, id: &str) -> StoreResult<()>;

    /// Atomically increment the user message count, returning the new value.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn increment_user_message_count(&self, id: &str) -> StoreResult<i64>;

    /// Append a message with a server-assigned timestamp.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn append_message(&self, id: &str, role: Role, content: &str) -> StoreResult<Message>;

    /// List messages in ascending chronological order.
    ///
    /// With `limit`, returns the most recent `limit` messages, still
    /// ascending (a tail window, not a head).
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    async fn list_messages(&self, id: &str, limit: Option<usize>) -> StoreResult<Vec<Message>>;

    /// Upsert the theme record and mirror the descriptor onto the
    /// conversation's `current_theme` as one atomic unit.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the conversation does not exist.
    async fn save_theme(&self, id: &str, descriptor: &ThemeDescriptor) -> StoreResult<()>;

    /// Fetch the last cached theme record, if any.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    async fn get_theme(&self, id: &str) -> StoreResult<Option<ThemeRecord>>;

    /// Row counts and database size.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    async fn stats(&self) -> StoreResult<StoreStats>;
}
