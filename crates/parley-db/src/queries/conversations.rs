use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::debug;

use parley_types::models::{Conversation, ConversationType};

use super::require_id;
use crate::models::{ConversationRow, format_ts, parse_ts};
use crate::{Database, Result, StoreError};

impl Database {
    /// Refresh the summary of a conversation after a send.
    ///
    /// The first touch fixes the conversation type. Every touch refreshes
    /// `updated_at` and adds `participants` to the participant set. `last_seq`
    /// and `last_message` only move forward: a touch carrying an older seq
    /// than the stored one leaves both untouched.
    pub fn touch_conversation(
        &self,
        conversation_id: &str,
        conversation_type: ConversationType,
        participants: &[&str],
        seq: i64,
        summary: &str,
    ) -> Result<()> {
        require_id("conversation_id", conversation_id)?;
        let now = format_ts(Utc::now());

        self.with_conn_mut(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO conversations
                     (conversation_id, conversation_type, last_seq, last_message, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                     last_message = CASE WHEN excluded.last_seq > conversations.last_seq
                                         THEN excluded.last_message
                                         ELSE conversations.last_message END,
                     last_seq     = MAX(conversations.last_seq, excluded.last_seq),
                     updated_at   = excluded.updated_at",
                params![conversation_id, conversation_type.as_str(), seq, summary, now],
            )?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id)
                     VALUES (?1, ?2)",
                )?;
                for user in participants {
                    stmt.execute(params![conversation_id, user])?;
                }
            }
            tx.commit()?;
            debug!(conversation_id, seq, "conversation touched");
            Ok(())
        })
    }

    pub fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT conversation_id, conversation_type, last_seq, last_message, updated_at
                     FROM conversations WHERE conversation_id = ?1",
                    [conversation_id],
                    ConversationRow::from_row,
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("conversation {conversation_id}")))?;

            let mut stmt = conn.prepare_cached(
                "SELECT user_id FROM conversation_participants
                 WHERE conversation_id = ?1
                 ORDER BY user_id",
            )?;
            let members = stmt
                .query_map([conversation_id], |r| r.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            into_conversation(row, members)
        })
    }

    /// Conversations `user_id` takes part in, most recently updated first.
    pub fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT c.conversation_id, c.conversation_type, c.last_seq, c.last_message, c.updated_at
                 FROM conversations c
                 JOIN conversation_participants p ON p.conversation_id = c.conversation_id
                 WHERE p.user_id = ?1
                 ORDER BY c.updated_at DESC, c.conversation_id ASC",
            )?;
            let rows = stmt
                .query_map([user_id], ConversationRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut participants = participants_for_user(conn, user_id)?;

            rows.into_iter()
                .map(|row| {
                    let members = participants.remove(&row.conversation_id).unwrap_or_default();
                    into_conversation(row, members)
                })
                .collect()
        })
    }
}

fn into_conversation(row: ConversationRow, participants: Vec<String>) -> Result<Conversation> {
    let conversation_type = row
        .conversation_type
        .parse::<ConversationType>()
        .map_err(|e| StoreError::Internal(e.to_string()))?;
    Ok(Conversation {
        conversation_id: row.conversation_id,
        conversation_type,
        participants,
        last_seq: row.last_seq,
        last_message: row.last_message,
        updated_at: parse_ts(&row.updated_at)?,
    })
}

/// Participant sets of every conversation `user_id` is in, keyed by
/// conversation id. Members are sorted.
fn participants_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare_cached(
        "SELECT p.conversation_id, p.user_id
         FROM conversation_participants p
         JOIN conversation_participants me ON me.conversation_id = p.conversation_id
         WHERE me.user_id = ?1
         ORDER BY p.conversation_id, p.user_id",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (conversation_id, user_id) = row?;
        map.entry(conversation_id).or_default().push(user_id);
    }
    Ok(map)
}
