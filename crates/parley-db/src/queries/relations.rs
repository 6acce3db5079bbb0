use chrono::Utc;
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info};
use uuid::Uuid;

use parley_types::models::{
    BlockEdge, CanonicalPair, FriendEdge, FriendRequest, RequestStatus, RespondAction,
};

use super::require_id;
use crate::models::{BlockRow, FriendEdgeRow, FriendRequestRow, format_ts};
use crate::{Database, Result, StoreError};

fn distinct_pair(a: &str, b: &str, what: &str) -> Result<CanonicalPair> {
    require_id("user_id", a)?;
    require_id("user_id", b)?;
    let pair = CanonicalPair::new(a, b);
    if pair.is_self_pair() {
        return Err(StoreError::Validation(format!("cannot {what} yourself")));
    }
    Ok(pair)
}

impl Database {
    // -- Friend requests --

    /// Open a pending request. A second pending request in the same
    /// direction is a `Conflict`.
    pub fn create_friend_request(
        &self,
        requester_id: &str,
        recipient_id: &str,
        greeting: &str,
    ) -> Result<FriendRequest> {
        distinct_pair(requester_id, recipient_id, "befriend")?;

        let now = Utc::now();
        let request = FriendRequest {
            id: Uuid::new_v4().to_string(),
            requester_id: requester_id.to_string(),
            recipient_id: recipient_id.to_string(),
            greeting: greeting.to_string(),
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO friend_requests
                     (id, requester_id, recipient_id, greeting, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    request.id,
                    request.requester_id,
                    request.recipient_id,
                    request.greeting,
                    request.status.as_str(),
                    format_ts(now),
                ],
            )
            .map_err(|e| StoreError::from(e).conflict_as("request exists"))?;
            Ok(())
        })?;

        debug!(request_id = %request.id, requester_id, recipient_id, "friend request created");
        Ok(request)
    }

    /// Move a pending request to its terminal state. Only the recipient may
    /// respond. Accepting records the canonical friend edge in the same
    /// transaction; if the pair is already friends the edge is left as is.
    pub fn respond_friend_request(
        &self,
        request_id: &str,
        acting_user: &str,
        action: RespondAction,
    ) -> Result<FriendRequest> {
        require_id("request_id", request_id)?;
        let status = action.target_status();
        let now = format_ts(Utc::now());

        let row = self.with_conn_mut(|conn| {
            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

            let updated = tx
                .query_row(
                    &format!(
                        "UPDATE friend_requests SET status = ?1, updated_at = ?2
                         WHERE id = ?3 AND recipient_id = ?4 AND status = 'pending'
                         RETURNING {}",
                        FriendRequestRow::COLUMNS
                    ),
                    params![status.as_str(), now, request_id, acting_user],
                    FriendRequestRow::from_row,
                )
                .optional()?;

            let Some(row) = updated else {
                let recipient: Option<String> = tx
                    .query_row(
                        "SELECT recipient_id FROM friend_requests WHERE id = ?1",
                        [request_id],
                        |r| r.get(0),
                    )
                    .optional()?;
                return Err(match recipient {
                    Some(recipient) if recipient != acting_user => StoreError::Forbidden(
                        "only the recipient may respond to a friend request".to_string(),
                    ),
                    _ => StoreError::NotFound(format!("pending friend request {request_id}")),
                });
            };

            if status == RequestStatus::Accepted {
                let pair = CanonicalPair::new(&row.requester_id, &row.recipient_id);
                tx.execute(
                    "INSERT OR IGNORE INTO friends (user_a, user_b, created_at) VALUES (?1, ?2, ?3)",
                    params![pair.low(), pair.high(), now],
                )?;
            }

            tx.commit()?;
            Ok(row)
        })?;

        info!(request_id, status = status.as_str(), "friend request answered");
        row.into_model()
    }

    /// Requests sent or received by `user_id`, newest first.
    pub fn list_friend_requests(&self, user_id: &str) -> Result<Vec<FriendRequest>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM friend_requests
                 WHERE recipient_id = ?1 OR requester_id = ?1
                 ORDER BY created_at DESC, id ASC",
                FriendRequestRow::COLUMNS
            ))?;
            let rows = stmt
                .query_map([user_id], FriendRequestRow::from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(FriendRequestRow::into_model).collect()
    }

    // -- Friends --

    /// Peers of `user_id`, sorted.
    pub fn list_friends(&self, user_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT user_b FROM friends WHERE user_a = ?1
                 UNION ALL
                 SELECT user_a FROM friends WHERE user_b = ?1
                 ORDER BY 1",
            )?;
            let peers = stmt
                .query_map([user_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(peers)
        })
    }

    /// The stored edge between two users, whichever order they are given in.
    pub fn friend_edge(&self, a: &str, b: &str) -> Result<Option<FriendEdge>> {
        let pair = CanonicalPair::new(a, b);
        let row = self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT user_a, user_b, created_at FROM friends WHERE user_a = ?1 AND user_b = ?2",
                    params![pair.low(), pair.high()],
                    |row| {
                        Ok(FriendEdgeRow {
                            user_a: row.get(0)?,
                            user_b: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })?;

        row.map(FriendEdgeRow::into_model).transpose()
    }

    /// Remove the friendship between two users. Returns whether an edge
    /// existed; removing a missing edge is not an error.
    pub fn delete_friend(&self, user_id: &str, other_id: &str) -> Result<bool> {
        let pair = distinct_pair(user_id, other_id, "unfriend")?;

        let removed = self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM friends WHERE user_a = ?1 AND user_b = ?2",
                params![pair.low(), pair.high()],
            )?;
            Ok(n > 0)
        })?;

        debug!(user_id, other_id, removed, "friend edge deleted");
        Ok(removed)
    }

    // -- Blocks --

    /// Record that `user_id` blocks `target_id`. Blocking twice is a
    /// `Conflict`. Friendship is not touched.
    pub fn block(&self, user_id: &str, target_id: &str) -> Result<BlockEdge> {
        distinct_pair(user_id, target_id, "block")?;
        let now = Utc::now();

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO blocks (user_id, blocked_user_id, created_at) VALUES (?1, ?2, ?3)",
                params![user_id, target_id, format_ts(now)],
            )
            .map_err(|e| StoreError::from(e).conflict_as("already blocked"))?;
            Ok(())
        })?;

        debug!(user_id, target_id, "user blocked");
        Ok(BlockEdge {
            user_id: user_id.to_string(),
            blocked_user_id: target_id.to_string(),
            created_at: now,
        })
    }

    /// Remove a block. Unblocking a pair that is not blocked succeeds.
    pub fn unblock(&self, user_id: &str, target_id: &str) -> Result<bool> {
        require_id("user_id", user_id)?;
        require_id("user_id", target_id)?;

        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM blocks WHERE user_id = ?1 AND blocked_user_id = ?2",
                params![user_id, target_id],
            )?;
            Ok(n > 0)
        })
    }

    /// Blocks placed by `user_id`, oldest first.
    pub fn list_blocks(&self, user_id: &str) -> Result<Vec<BlockEdge>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT user_id, blocked_user_id, created_at FROM blocks
                 WHERE user_id = ?1
                 ORDER BY created_at ASC, blocked_user_id ASC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(BlockRow {
                        user_id: row.get(0)?,
                        blocked_user_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(BlockRow::into_model).collect()
    }
}
