//! Non-durable in-memory conversation store.
//!
//! Implements the same contract as the `SQLite` store behind a single
//! mutex, so every operation is atomic. Useful for tests; the durable
//! implementation is authoritative.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{
    now_timestamp, Conversation, ConversationSummary, Message, Role, StoreStats, ThemeRecord,
};
use crate::store::ConversationStore;
use crate::theme::ThemeDescriptor;

#[derive(Debug, Clone)]
struct Entry {
    title: String,
    custom_context: String,
    created_at: String,
    updated_at: String,
    user_message_count: i64,
    messages: Vec<Message>,
    theme: Option<ThemeRecord>,
}

/// In-memory implementation of [`ConversationStore`].
#[derive(Default)]
pub struct MemoryConversationStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn conversation_from(id: &str, entry: &Entry) -> Conversation {
        Conversation {
            id: id.to_owned(),
            title: entry.title.clone(),
            custom_context: entry.custom_context.clone(),
            created_at: entry.created_at.clone(),
            updated_at: entry.updated_at.clone(),
            user_message_count: entry.user_message_count,
            messages: entry.messages.clone(),
            current_theme: entry.theme.as_ref().map(|t| t.descriptor.clone()),
        }
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create(
        &self,
        id: &str,
        title: &str,
        custom_context: &str,
    ) -> StoreResult<Conversation> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if entries.contains_key(id) {
            return Err(StoreError::DuplicateKey(id.to_owned()));
        }
        let now = now_timestamp();
        let entry = Entry {
            title: title.to_owned(),
            custom_context: custom_context.to_owned(),
            created_at: now.clone(),
            updated_at: now,
            user_message_count: 0,
            messages: Vec::new(),
            theme: None,
        };
        let conversation = Self::conversation_from(id, &entry);
        entries.insert(id.to_owned(), entry);
        Ok(conversation)
    }

    async fn get(&self, id: &str) -> StoreResult<Conversation> {
        let entries = self.entries.lock().expect("store lock poisoned");
        entries
            .get(id)
            .map(|e| Self::conversation_from(id, e))
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> StoreResult<Vec<ConversationSummary>> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let mut summaries: Vec<ConversationSummary> = entries
            .iter()
            .map(|(id, e)| ConversationSummary {
                id: id.clone(),
                title: e.title.clone(),
                created_at: e.created_at.clone(),
                updated_at: e.updated_at.clone(),
                message_count: e.messages.len() as i64,
                user_message_count: e.user_message_count,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn update(
        &self,
        id: &str,
        title: Option<String>,
        custom_context: Option<String>,
    ) -> StoreResult<Conversation> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get_mut(id).ok_or(StoreError::NotFound)?;
        if title.is_some() || custom_context.is_some() {
            if let Some(t) = title {
                entry.title = t;
            }
            if let Some(c) = custom_context {
                entry.custom_context = c;
            }
            entry.updated_at = now_timestamp();
        }
        Ok(Self::conversation_from(id, entry))
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries.remove(id).is_some())
    }

    async fn touch_updated_at(&self, id: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get_mut(id).ok_or(StoreError::NotFound)?;
        entry.updated_at = now_timestamp();
        Ok(())
    }

    async fn increment_user_message_count(&self, id: &str) -> StoreResult<i64> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get_mut(id).ok_or(StoreError::NotFound)?;
        entry.user_message_count += 1;
        entry.updated_at = now_timestamp();
        Ok(entry.user_message_count)
    }

    async fn append_message(&self, id: &str, role: Role, content: &str) -> StoreResult<Message> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get_mut(id).ok_or(StoreError::NotFound)?;
        let message = Message {
            role,
            content: content.to_owned(),
            timestamp: now_timestamp(),
        };
        entry.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, id: &str, limit: Option<usize>) -> StoreResult<Vec<Message>> {
        let entries = self.entries.lock().expect("store lock poisoned");
        let Some(entry) = entries.get(id) else {
            return Ok(Vec::new());
        };
        // Insertion order is already chronological with ties resolved.
        let messages = match limit {
            Some(n) if n < entry.messages.len() => {
                entry.messages[entry.messages.len() - n..].to_vec()
            }
            _ => entry.messages.clone(),
        };
        Ok(messages)
    }

    async fn save_theme(&self, id: &str, descriptor: &ThemeDescriptor) -> StoreResult<()> {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        let entry = entries.get_mut(id).ok_or(StoreError::NotFound)?;
        let now = now_timestamp();
        entry.theme = Some(ThemeRecord {
            descriptor: descriptor.clone(),
            created_at: now.clone(),
        });
        entry.updated_at = now;
        Ok(())
    }

    async fn get_theme(&self, id: &str) -> StoreResult<Option<ThemeRecord>> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(entries.get(id).and_then(|e| e.theme.clone()))
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let entries = self.entries.lock().expect("store lock poisoned");
        Ok(StoreStats {
            conversations: entries.len() as i64,
            messages: entries.values().map(|e| e.messages.len() as i64).sum(),
            themes: entries.values().filter(|e| e.theme.is_some()).count() as i64,
            db_size_bytes: 0,
        })
    }
}
