use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, error};

use parley_types::models::Message;

use super::require_id;
use crate::models::{MessageRow, format_ts};
use crate::{Database, Result, StoreError};

impl Database {
    /// Persist a message under the sequence number it already carries.
    ///
    /// A second message with the same (conversation, seq) is a `Conflict`;
    /// that only happens if something bypassed [`Database::next_seq`].
    pub fn append_message(&self, msg: &Message) -> Result<()> {
        require_id("conversation_id", &msg.conversation_id)?;
        if msg.seq < 1 {
            return Err(StoreError::Validation(format!(
                "sequence number must be >= 1, got {}",
                msg.seq
            )));
        }

        let element = serde_json::to_string(&msg.element)?;
        let character_info = msg
            .character_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation_id, seq, conversation_type, sender_user_id,
                     message_type, element, character_info, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    msg.conversation_id,
                    msg.seq,
                    msg.conversation_type.as_str(),
                    msg.sender_user_id,
                    msg.message_type,
                    element,
                    character_info,
                    format_ts(msg.created_at),
                    format_ts(msg.updated_at),
                    msg.deleted_at.map(format_ts),
                ],
            )
            .map_err(|e| {
                let err = StoreError::from(e);
                if let StoreError::Conflict(_) = err {
                    error!(
                        conversation_id = %msg.conversation_id,
                        seq = msg.seq,
                        "sequence collision on append"
                    );
                }
                err.conflict_as(format!(
                    "sequence collision: {}#{}",
                    msg.conversation_id, msg.seq
                ))
            })?;
            debug!(conversation_id = %msg.conversation_id, seq = msg.seq, "message appended");
            Ok(())
        })
    }

    /// Messages with `seq > after_seq` in ascending order, at most `limit`.
    /// The last returned seq is the cursor for the next page; `after_seq = 0`
    /// starts from the beginning. Soft-deleted messages are included.
    pub fn message_history(
        &self,
        conversation_id: &str,
        after_seq: i64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        require_id("conversation_id", conversation_id)?;

        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM messages
                 WHERE conversation_id = ?1 AND seq > ?2
                 ORDER BY seq ASC
                 LIMIT ?3",
                MessageRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![conversation_id, after_seq, limit], MessageRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(MessageRow::into_model).collect()
    }

    /// Mark a message deleted. Only its sender may do so; deleting twice is a
    /// no-op. The row stays so sequence numbers remain dense.
    pub fn soft_delete_message(
        &self,
        conversation_id: &str,
        seq: i64,
        acting_user: &str,
    ) -> Result<()> {
        require_id("conversation_id", conversation_id)?;
        let now = format_ts(Utc::now());

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE messages
                 SET deleted_at = ?4, updated_at = ?4
                 WHERE conversation_id = ?1 AND seq = ?2 AND sender_user_id = ?3
                   AND deleted_at IS NULL",
                params![conversation_id, seq, acting_user, now],
            )?;
            if changed == 1 {
                return Ok(());
            }

            let sender: Option<String> = conn
                .query_row(
                    "SELECT sender_user_id FROM messages WHERE conversation_id = ?1 AND seq = ?2",
                    params![conversation_id, seq],
                    |row| row.get(0),
                )
                .optional()?;
            match sender {
                None => Err(StoreError::NotFound(format!(
                    "message {conversation_id}#{seq}"
                ))),
                Some(sender) if sender != acting_user => Err(StoreError::Forbidden(
                    "only the sender may delete a message".to_string(),
                )),
                // Already deleted by its sender.
                Some(_) => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use parley_types::element::MessageElement;
    use parley_types::models::{CharacterInfo, ConversationType, Message};

    use crate::{Database, StoreError};

    fn message(conversation_id: &str, seq: i64, sender: &str, text: &str) -> Message {
        let now = Utc::now();
        Message {
            conversation_id: conversation_id.to_string(),
            conversation_type: ConversationType::Dm,
            seq,
            sender_user_id: sender.to_string(),
            message_type: "normal".to_string(),
            element: MessageElement::text(text),
            character_info: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn seed(db: &Database, conversation_id: &str, n: i64) {
        for _ in 0..n {
            let seq = db.next_seq(conversation_id).unwrap();
            db.append_message(&message(conversation_id, seq, "u1", &format!("m{seq}")))
                .unwrap();
        }
    }

    #[test]
    fn appended_message_reads_back_at_its_seq() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "c1", 4);

        let mut msg = message("c1", 5, "u2", "character line");
        msg.message_type = "character".into();
        msg.character_info = Some(CharacterInfo {
            character_id: "hero".into(),
            name: String::new(),
            avatar: String::new(),
        });
        db.append_message(&msg).unwrap();

        let got = db.message_history("c1", 4, 1).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].seq, 5);
        assert_eq!(got[0].element, msg.element);
        assert_eq!(got[0].character_info, msg.character_info);
        assert_eq!(got[0].sender_user_id, "u2");
    }

    #[test]
    fn duplicate_seq_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        db.append_message(&message("c1", 1, "u1", "a")).unwrap();

        let err = db.append_message(&message("c1", 1, "u2", "b")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m.contains("sequence collision")));

        // Same seq in another conversation is fine.
        db.append_message(&message("c2", 1, "u1", "c")).unwrap();
    }

    #[test]
    fn zero_seq_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db.append_message(&message("c1", 0, "u1", "a")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn history_pages_by_cursor() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "c1", 7);
        seed(&db, "other", 3);

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = db.message_history("c1", cursor, 3).unwrap();
            if page.is_empty() {
                break;
            }
            assert!(page.len() <= 3);
            assert!(page.windows(2).all(|w| w[0].seq < w[1].seq));
            assert!(page.iter().all(|m| m.seq > cursor && m.conversation_id == "c1"));
            cursor = page.last().map(|m| m.seq).unwrap();
            seen.extend(page.into_iter().map(|m| m.seq));
        }
        assert_eq!(seen, (1..=7).collect::<Vec<_>>());
    }

    #[test]
    fn history_of_unknown_conversation_is_empty() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.message_history("nope", 0, 50).unwrap().is_empty());
        assert!(db.message_history("nope", 0, 0).unwrap().is_empty());
    }

    #[test]
    fn soft_delete_marks_but_keeps_the_row() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, "c1", 3);

        assert!(matches!(
            db.soft_delete_message("c1", 2, "intruder"),
            Err(StoreError::Forbidden(_))
        ));
        assert!(matches!(
            db.soft_delete_message("c1", 9, "u1"),
            Err(StoreError::NotFound(_))
        ));

        db.soft_delete_message("c1", 2, "u1").unwrap();
        db.soft_delete_message("c1", 2, "u1").unwrap();

        let history = db.message_history("c1", 0, 10).unwrap();
        let seqs: Vec<i64> = history.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert!(history[1].deleted_at.is_some());
        assert!(history[0].deleted_at.is_none());
    }
}
