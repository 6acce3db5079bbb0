//! Database row types. These map directly to SQLite rows and are converted
//! into the shared `parley-types` models on the way out.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;

use parley_types::models::{BlockEdge, FriendEdge, FriendRequest, Message};

use crate::error::{Result, StoreError};

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Internal(format!("corrupt timestamp {raw:?}: {e}")))
}

fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| StoreError::Internal(e.to_string()))
}

pub struct MessageRow {
    pub conversation_id: String,
    pub seq: i64,
    pub conversation_type: String,
    pub sender_user_id: String,
    pub message_type: String,
    pub element: String,
    pub character_info: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl MessageRow {
    pub const COLUMNS: &'static str = "conversation_id, seq, conversation_type, sender_user_id, \
         message_type, element, character_info, created_at, updated_at, deleted_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conversation_id: row.get(0)?,
            seq: row.get(1)?,
            conversation_type: row.get(2)?,
            sender_user_id: row.get(3)?,
            message_type: row.get(4)?,
            element: row.get(5)?,
            character_info: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            deleted_at: row.get(9)?,
        })
    }

    pub fn into_model(self) -> Result<Message> {
        Ok(Message {
            conversation_type: parse_enum(&self.conversation_type)?,
            element: serde_json::from_str(&self.element)?,
            character_info: self
                .character_info
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            deleted_at: self.deleted_at.as_deref().map(parse_ts).transpose()?,
            conversation_id: self.conversation_id,
            seq: self.seq,
            sender_user_id: self.sender_user_id,
            message_type: self.message_type,
        })
    }
}

pub struct ConversationRow {
    pub conversation_id: String,
    pub conversation_type: String,
    pub last_seq: i64,
    pub last_message: String,
    pub updated_at: String,
}

impl ConversationRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            conversation_id: row.get(0)?,
            conversation_type: row.get(1)?,
            last_seq: row.get(2)?,
            last_message: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

pub struct FriendRequestRow {
    pub id: String,
    pub requester_id: String,
    pub recipient_id: String,
    pub greeting: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl FriendRequestRow {
    pub const COLUMNS: &'static str =
        "id, requester_id, recipient_id, greeting, status, created_at, updated_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            recipient_id: row.get(2)?,
            greeting: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn into_model(self) -> Result<FriendRequest> {
        Ok(FriendRequest {
            status: parse_enum(&self.status)?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            requester_id: self.requester_id,
            recipient_id: self.recipient_id,
            greeting: self.greeting,
        })
    }
}

pub struct FriendEdgeRow {
    pub user_a: String,
    pub user_b: String,
    pub created_at: String,
}

impl FriendEdgeRow {
    pub fn into_model(self) -> Result<FriendEdge> {
        Ok(FriendEdge {
            created_at: parse_ts(&self.created_at)?,
            user_a: self.user_a,
            user_b: self.user_b,
        })
    }
}

pub struct BlockRow {
    pub user_id: String,
    pub blocked_user_id: String,
    pub created_at: String,
}

impl BlockRow {
    pub fn into_model(self) -> Result<BlockEdge> {
        Ok(BlockEdge {
            created_at: parse_ts(&self.created_at)?,
            user_id: self.user_id,
            blocked_user_id: self.blocked_user_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_as_text() {
        let earlier = "2026-01-02T03:04:05.000006Z".parse::<DateTime<Utc>>().unwrap();
        let later = earlier + chrono::Duration::milliseconds(1500);
        let (a, b) = (format_ts(earlier), format_ts(later));
        assert!(a < b);
        assert_eq!(parse_ts(&a).unwrap(), earlier);
    }

    #[test]
    fn corrupt_timestamp_is_internal_error() {
        assert_eq!(parse_ts("yesterday").unwrap_err().kind(), "internal");
    }
}
