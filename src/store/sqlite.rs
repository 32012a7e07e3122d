//! `SQLite`-backed conversation store.
//!
//! One [`tokio_rusqlite::Connection`] serializes every statement on a
//! dedicated worker thread, so multi-statement writes are never partially
//! observable by concurrent callers.

use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::store::error::{StoreError, StoreResult};
use crate::store::types::{
    now_timestamp, Conversation, ConversationSummary, Message, Role, StoreStats, ThemeRecord,
};
use crate::store::ConversationStore;
use crate::theme::ThemeDescriptor;

use async_trait::async_trait;

/// `SQLite` implementation of [`ConversationStore`].
pub struct SqliteConversationStore {
    conn: Connection,
}

impl SqliteConversationStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Open a fresh in-memory database. Used by tests.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init_schema(&conn).await?;
        Ok(Self { conn })
    }

    async fn init_schema(conn: &Connection) -> StoreResult<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;

                CREATE TABLE IF NOT EXISTS conversations (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    custom_context TEXT NOT NULL DEFAULT '',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    user_message_count INTEGER NOT NULL DEFAULT 0,
                    current_theme TEXT
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    timestamp TEXT NOT NULL,
                    FOREIGN KEY (conversation_id)
                        REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE TABLE IF NOT EXISTS themes (
                    conversation_id TEXT PRIMARY KEY,
                    theme_data TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (conversation_id)
                        REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages(conversation_id, timestamp);",
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create(
        &self,
        id: &str,
        title: &str,
        custom_context: &str,
    ) -> StoreResult<Conversation> {
        let now = now_timestamp();
        let (conv_id, conv_title, conv_ctx) =
            (id.to_owned(), title.to_owned(), custom_context.to_owned());

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO conversations
                        (id, title, custom_context, created_at, updated_at, user_message_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, 0)",
                    params![conv_id, conv_title, conv_ctx, now, now],
                )?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => self.get(id).await,
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::DuplicateKey(id.to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> StoreResult<Conversation> {
        let conv_id = id.to_owned();

        type ConvRow = (String, String, String, String, String, i64, Option<String>);
        let row: Option<(ConvRow, Vec<Message>)> = self
            .conn
            .call(move |conn| {
                let row: Option<ConvRow> = conn
                    .query_row(
                        "SELECT id, title, custom_context, created_at, updated_at,
                                user_message_count, current_theme
                         FROM conversations WHERE id = ?1",
                        params![conv_id],
                        |r| {
                            Ok((
                                r.get(0)?,
                                r.get(1)?,
                                r.get(2)?,
                                r.get(3)?,
                                r.get(4)?,
                                r.get(5)?,
                                r.get(6)?,
                            ))
                        },
                    )
                    .optional()?;

                let Some(row) = row else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT role, content, timestamp FROM messages
                     WHERE conversation_id = ?1
                     ORDER BY timestamp ASC, id ASC",
                )?;
                let messages = stmt
                    .query_map(params![row.0], |r| {
                        Ok(Message {
                            role: r.get(0)?,
                            content: r.get(1)?,
                            timestamp: r.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(Some((row, messages)))
            })
            .await?;

        let Some(((id, title, custom_context, created_at, updated_at, count, theme_json), messages)) =
            row
        else {
            return Err(StoreError::NotFound);
        };

        let current_theme = match theme_json {
            Some(json) => Some(serde_json::from_str::<ThemeDescriptor>(&json)?),
            None => None,
        };

        Ok(Conversation {
            id,
            title,
            custom_context,
            created_at,
            updated_at,
            user_message_count: count,
            messages,
            current_theme,
        })
    }

    async fn list(&self) -> StoreResult<Vec<ConversationSummary>> {
        let summaries = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.id, c.title, c.created_at, c.updated_at,
                            COUNT(m.id) AS message_count, c.user_message_count
                     FROM conversations c
                     LEFT JOIN messages m ON c.id = m.conversation_id
                     GROUP BY c.id
                     ORDER BY c.updated_at DESC",
                )?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok(ConversationSummary {
                            id: r.get(0)?,
                            title: r.get(1)?,
                            created_at: r.get(2)?,
                            updated_at: r.get(3)?,
                            message_count: r.get(4)?,
                            user_message_count: r.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(summaries)
    }

    async fn update(
        &self,
        id: &str,
        title: Option<String>,
        custom_context: Option<String>,
    ) -> StoreResult<Conversation> {
        if title.is_none() && custom_context.is_none() {
            return self.get(id).await;
        }

        let conv_id = id.to_owned();
        let now = now_timestamp();

        let affected = self
            .conn
            .call(move |conn| {
                let mut assignments = Vec::new();
                let mut values: Vec<Value> = Vec::new();

                if let Some(t) = title {
                    assignments.push("title = ?");
                    values.push(Value::Text(t));
                }
                if let Some(c) = custom_context {
                    assignments.push("custom_context = ?");
                    values.push(Value::Text(c));
                }
                assignments.push("updated_at = ?");
                values.push(Value::Text(now));
                values.push(Value::Text(conv_id));

                let sql = format!(
                    "UPDATE conversations SET {} WHERE id = ?",
                    assignments.join(", ")
                );
                let affected = conn.execute(&sql, params_from_iter(values))?;
                Ok(affected)
            })
            .await?;

        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        let conv_id = id.to_owned();
        let affected = self
            .conn
            .call(move |conn| {
                let affected =
                    conn.execute("DELETE FROM conversations WHERE id = ?1", params![conv_id])?;
                Ok(affected)
            })
            .await?;
        Ok(affected > 0)
    }

    async fn touch_updated_at(&self, id: &str) -> StoreResult<()> {
        let conv_id = id.to_owned();
        let now = now_timestamp();
        let affected = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(
                    "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                    params![now, conv_id],
                )?;
                Ok(affected)
            })
            .await?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn increment_user_message_count(&self, id: &str) -> StoreResult<i64> {
        let conv_id = id.to_owned();
        let now = now_timestamp();
        let count = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(
                    "UPDATE conversations
                     SET user_message_count = user_message_count + 1, updated_at = ?1
                     WHERE id = ?2",
                    params![now, conv_id],
                )?;
                if affected == 0 {
                    return Ok(None);
                }
                let count: i64 = conn.query_row(
                    "SELECT user_message_count FROM conversations WHERE id = ?1",
                    params![conv_id],
                    |r| r.get(0),
                )?;
                Ok(Some(count))
            })
            .await?;
        count.ok_or(StoreError::NotFound)
    }

    async fn append_message(&self, id: &str, role: Role, content: &str) -> StoreResult<Message> {
        let conv_id = id.to_owned();
        let body = content.to_owned();
        let timestamp = now_timestamp();
        let ts = timestamp.clone();

        let inserted = self
            .conn
            .call(move |conn| {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM conversations WHERE id = ?1",
                        params![conv_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO messages (conversation_id, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![conv_id, role, body, ts],
                )?;
                Ok(true)
            })
            .await?;

        if !inserted {
            return Err(StoreError::NotFound);
        }
        Ok(Message {
            role,
            content: content.to_owned(),
            timestamp,
        })
    }

    async fn list_messages(&self, id: &str, limit: Option<usize>) -> StoreResult<Vec<Message>> {
        let conv_id = id.to_owned();
        let messages = self
            .conn
            .call(move |conn| {
                let messages = if let Some(limit) = limit {
                    // Tail window: newest `limit` rows, flipped back to ascending.
                    let mut stmt = conn.prepare(
                        "SELECT role, content, timestamp FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY timestamp DESC, id DESC
                         LIMIT ?2",
                    )?;
                    let mut rows = stmt
                        .query_map(params![conv_id, limit as i64], |r| {
                            Ok(Message {
                                role: r.get(0)?,
                                content: r.get(1)?,
                                timestamp: r.get(2)?,
                            })
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows.reverse();
                    rows
                } else {
                    let mut stmt = conn.prepare(
                        "SELECT role, content, timestamp FROM messages
                         WHERE conversation_id = ?1
                         ORDER BY timestamp ASC, id ASC",
                    )?;
                    stmt.query_map(params![conv_id], |r| {
                        Ok(Message {
                            role: r.get(0)?,
                            content: r.get(1)?,
                            timestamp: r.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?
                };
                Ok(messages)
            })
            .await?;
        Ok(messages)
    }

    async fn save_theme(&self, id: &str, descriptor: &ThemeDescriptor) -> StoreResult<()> {
        let conv_id = id.to_owned();
        let theme_json = serde_json::to_string(descriptor)?;
        let now = now_timestamp();

        let found = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let affected = tx.execute(
                    "UPDATE conversations SET current_theme = ?1, updated_at = ?2 WHERE id = ?3",
                    params![theme_json, now, conv_id],
                )?;
                if affected == 0 {
                    return Ok(false);
                }
                tx.execute(
                    "INSERT OR REPLACE INTO themes (conversation_id, theme_data, created_at)
                     VALUES (?1, ?2, ?3)",
                    params![conv_id, theme_json, now],
                )?;
                tx.commit()?;
                Ok(true)
            })
            .await?;

        if !found {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_theme(&self, id: &str) -> StoreResult<Option<ThemeRecord>> {
        let conv_id = id.to_owned();
        let row: Option<(String, String)> = self
            .conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT theme_data, created_at FROM themes WHERE conversation_id = ?1",
                        params![conv_id],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((json, created_at)) = row else {
            return Ok(None);
        };
        match serde_json::from_str::<ThemeDescriptor>(&json) {
            Ok(descriptor) => Ok(Some(ThemeRecord {
                descriptor,
                created_at,
            })),
            Err(e) => {
                tracing::debug!("discarding unreadable cached theme for {id}: {e}");
                Ok(None)
            }
        }
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        let stats = self
            .conn
            .call(|conn| {
                let (conversations, messages, themes): (i64, i64, i64) = conn.query_row(
                    "SELECT (SELECT COUNT(*) FROM conversations),
                            (SELECT COUNT(*) FROM messages),
                            (SELECT COUNT(*) FROM themes)",
                    [],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )?;
                let db_size_bytes: i64 = conn.query_row(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                    [],
                    |r| r.get(0),
                )?;
                Ok(StoreStats {
                    conversations,
                    messages,
                    themes,
                    db_size_bytes,
                })
            })
            .await?;
        Ok(stats)
    }
}
