//! Core data types for conversations, messages, and theme records.

use core::fmt;

use chrono::{SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use serde::{Deserialize, Serialize};

use crate::theme::ThemeDescriptor;

/// Current UTC timestamp in the canonical storage format.
///
/// RFC 3339 with microsecond precision. All timestamps share this format,
/// so lexicographic order equals chronological order.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Generate a new conversation id.
///
/// Creation-ordered opaque token derived from the current UTC time,
/// matching the `YYYYMMDDHHMMSS` + fractional-seconds shape clients expect.
#[must_use]
pub fn generate_conversation_id() -> String {
    Utc::now().format("%Y%m%d%H%M%S%f").to_string()
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user input.
    User,
    /// Model output.
    Assistant,
    /// Injected system prompt.
    System,
}

impl Role {
    /// Stable string form used on the wire and in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse the storage form back into a role.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(Value::Text(self.as_str().to_owned())))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Text(t) => {
                let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                Self::parse(s).ok_or(FromSqlError::InvalidType)
            }
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A single message within a conversation.
///
/// Immutable once created; ordered by `timestamp`, ties broken by
/// insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message author.
    pub role: Role,
    /// Message body.
    pub content: String,
    /// Server-assigned creation time (see [`now_timestamp`]).
    pub timestamp: String,
}

/// A full conversation with its ordered messages and current theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Opaque creation-ordered identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Free-text context appended to via file uploads.
    pub custom_context: String,
    /// Creation time.
    pub created_at: String,
    /// Last modification time; monotonically non-decreasing.
    pub updated_at: String,
    /// Number of accepted user turns.
    pub user_message_count: i64,
    /// Messages in chronological order.
    pub messages: Vec<Message>,
    /// Latest derived theme, if any.
    pub current_theme: Option<ThemeDescriptor>,
}

/// Conversation summary for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Opaque creation-ordered identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: String,
    /// Last modification time.
    pub updated_at: String,
    /// Total stored messages (all roles).
    pub message_count: i64,
    /// Number of accepted user turns.
    pub user_message_count: i64,
}

/// Latest successfully derived theme for a conversation.
///
/// Overwritten, not versioned, on each regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeRecord {
    /// The derived descriptor.
    pub descriptor: ThemeDescriptor,
    /// When this descriptor was derived.
    pub created_at: String,
}

/// Row counts and size information for the health endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Number of conversations.
    pub conversations: i64,
    /// Number of messages across all conversations.
    pub messages: i64,
    /// Number of cached theme records.
    pub themes: i64,
    /// Database size in bytes (0 for non-durable stores).
    pub db_size_bytes: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("tool"), None);
    }

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert!(a <= b);
    }

    #[test]
    fn test_conversation_id_is_creation_ordered() {
        let a = generate_conversation_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate_conversation_id();
        assert!(a < b);
    }
}
