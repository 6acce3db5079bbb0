use rusqlite::OptionalExtension;
use tracing::debug;

use super::require_id;
use crate::{Database, Result};

impl Database {
    /// Issue the next sequence number for a conversation.
    ///
    /// Create-at-1 and increment are one statement against the store, so two
    /// callers (in this process or any other process sharing the file) never
    /// receive the same number and no number is skipped. Not safe to retry
    /// blindly: a failure reported after the statement ran still consumed a
    /// number.
    pub fn next_seq(&self, conversation_id: &str) -> Result<i64> {
        require_id("conversation_id", conversation_id)?;

        self.with_conn_mut(|conn| {
            let seq: i64 = conn.query_row(
                "INSERT INTO sequence_counters (conversation_id, seq) VALUES (?1, 1)
                 ON CONFLICT(conversation_id) DO UPDATE SET seq = seq + 1
                 RETURNING seq",
                [conversation_id],
                |row| row.get(0),
            )?;
            debug!(conversation_id, seq, "allocated sequence number");
            Ok(seq)
        })
    }

    /// Last issued sequence number, 0 if none was ever issued.
    pub fn current_seq(&self, conversation_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let seq = conn
                .query_row(
                    "SELECT seq FROM sequence_counters WHERE conversation_id = ?1",
                    [conversation_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(seq.unwrap_or(0))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::{Database, StoreError};

    #[test]
    fn first_allocation_starts_at_one() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.current_seq("c1").unwrap(), 0);
        assert_eq!(db.next_seq("c1").unwrap(), 1);
        assert_eq!(db.next_seq("c1").unwrap(), 2);
        assert_eq!(db.current_seq("c1").unwrap(), 2);
    }

    #[test]
    fn counters_are_per_conversation() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.next_seq("a").unwrap(), 1);
        assert_eq!(db.next_seq("a").unwrap(), 2);
        assert_eq!(db.next_seq("b").unwrap(), 1);
    }

    #[test]
    fn empty_conversation_id_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.next_seq(""), Err(StoreError::Validation(_))));
    }

    #[test]
    fn concurrent_handles_issue_dense_unique_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seq.db");

        // Independent handles on one file stand in for independent server processes.
        let handles: Vec<Arc<Database>> = (0..3)
            .map(|_| Arc::new(Database::open(&path, Duration::from_secs(10)).unwrap()))
            .collect();

        const PER_THREAD: usize = 50;
        let threads: Vec<_> = (0..6)
            .map(|i| {
                let db = handles[i % handles.len()].clone();
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| db.next_seq("shared").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = Vec::new();
        for t in threads {
            all.extend(t.join().unwrap());
        }

        let total = 6 * PER_THREAD;
        let unique: BTreeSet<i64> = all.iter().copied().collect();
        assert_eq!(all.len(), total);
        assert_eq!(unique.len(), total, "duplicate sequence numbers issued");
        assert_eq!(unique, (1..=total as i64).collect::<BTreeSet<_>>());
        assert_eq!(handles[0].current_seq("shared").unwrap(), total as i64);
    }
}
