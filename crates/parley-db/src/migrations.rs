use anyhow::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::info;

/// Apply pending schema versions. Safe to call from several processes at
/// once: the version check and the DDL share one immediate transaction.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let version: i64 =
        tx.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (conversations and relations)");
        tx.execute_batch(
            "
            CREATE TABLE sequence_counters (
                conversation_id TEXT PRIMARY KEY,
                seq             INTEGER NOT NULL CHECK (seq >= 1)
            );

            CREATE TABLE messages (
                conversation_id   TEXT NOT NULL,
                seq               INTEGER NOT NULL CHECK (seq >= 1),
                conversation_type TEXT NOT NULL,
                sender_user_id    TEXT NOT NULL,
                message_type      TEXT NOT NULL,
                element           TEXT NOT NULL,
                character_info    TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL,
                deleted_at        TEXT,
                PRIMARY KEY (conversation_id, seq)
            ) WITHOUT ROWID;

            CREATE INDEX idx_messages_created
                ON messages(conversation_id, created_at);

            CREATE TABLE conversations (
                conversation_id   TEXT PRIMARY KEY,
                conversation_type TEXT NOT NULL,
                last_seq          INTEGER NOT NULL DEFAULT 0 CHECK (last_seq >= 0),
                last_message      TEXT NOT NULL DEFAULT '',
                updated_at        TEXT NOT NULL
            );

            CREATE INDEX idx_conversations_updated
                ON conversations(updated_at);

            CREATE TABLE conversation_participants (
                conversation_id TEXT NOT NULL REFERENCES conversations(conversation_id),
                user_id         TEXT NOT NULL,
                PRIMARY KEY (conversation_id, user_id)
            ) WITHOUT ROWID;

            CREATE INDEX idx_participants_user
                ON conversation_participants(user_id);

            CREATE TABLE friend_requests (
                id           TEXT PRIMARY KEY,
                requester_id TEXT NOT NULL,
                recipient_id TEXT NOT NULL,
                greeting     TEXT NOT NULL DEFAULT '',
                status       TEXT NOT NULL CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                CHECK (requester_id <> recipient_id)
            );

            -- At most one open request per direction
            CREATE UNIQUE INDEX idx_friend_requests_pending
                ON friend_requests(requester_id, recipient_id) WHERE status = 'pending';

            CREATE INDEX idx_friend_requests_recipient
                ON friend_requests(recipient_id, status, created_at);

            CREATE INDEX idx_friend_requests_requester
                ON friend_requests(requester_id, status, created_at);

            CREATE TABLE friends (
                user_a     TEXT NOT NULL,
                user_b     TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_a, user_b),
                CHECK (user_a < user_b)
            ) WITHOUT ROWID;

            CREATE INDEX idx_friends_user_b
                ON friends(user_b);

            CREATE TABLE blocks (
                user_id         TEXT NOT NULL,
                blocked_user_id TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (user_id, blocked_user_id),
                CHECK (user_id <> blocked_user_id)
            ) WITHOUT ROWID;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    tx.commit()?;
    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn friend_edges_must_be_canonical() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();

        let res = conn.execute(
            "INSERT INTO friends (user_a, user_b, created_at) VALUES ('b', 'a', '')",
            [],
        );
        assert!(res.is_err());
    }
}
