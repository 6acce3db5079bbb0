use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use parley_db::{Database, StoreError};
use parley_types::api::{
    Claims, Envelope, HistoryResponse, RoomMessageRequest, SendMessageRequest, SendMessageResponse,
};
use parley_types::models::{CHARACTER_MESSAGE_TYPE, CharacterInfo, ConversationType, Message};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 200;

fn default_limit() -> u32 {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub conversation_type: ConversationType,
    pub conversation_id: String,
    /// Cursor: highest seq already seen. 0 starts from the beginning.
    #[serde(default, alias = "lastSeq")]
    pub last_seq: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct RoomHistoryQuery {
    #[serde(default, alias = "lastSeq")]
    pub last_seq: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Allocate, append, then project. Runs on a blocking thread as one unit so
/// an allocated number is always followed by its append, even if the caller
/// has stopped waiting.
pub fn deliver(db: &Database, sender: &str, req: SendMessageRequest) -> Result<i64, StoreError> {
    if req.conversation_id.trim().is_empty() {
        return Err(StoreError::Validation("conversation_id is required".to_string()));
    }
    if req.message_type.trim().is_empty() {
        return Err(StoreError::Validation("message_type must not be empty".to_string()));
    }

    let character_info = if req.message_type == CHARACTER_MESSAGE_TYPE {
        match req.character_id.filter(|id| !id.trim().is_empty()) {
            Some(character_id) => Some(CharacterInfo {
                character_id,
                name: String::new(),
                avatar: String::new(),
            }),
            None => {
                return Err(StoreError::Validation(
                    "character messages require character_id".to_string(),
                ));
            }
        }
    } else {
        None
    };

    let seq = db.next_seq(&req.conversation_id)?;

    let now = Utc::now();
    let msg = Message {
        conversation_id: req.conversation_id,
        conversation_type: req.conversation_type,
        seq,
        sender_user_id: sender.to_string(),
        message_type: req.message_type,
        element: req.element,
        character_info,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };
    db.append_message(&msg)?;

    // The message is durable from here on; a failed projection only delays
    // the summary until the next send.
    if let Err(e) = db.touch_conversation(
        &msg.conversation_id,
        msg.conversation_type,
        &[sender],
        seq,
        &msg.element.summary(),
    ) {
        warn!(
            conversation_id = %msg.conversation_id,
            seq,
            "conversation summary not updated: {}",
            e
        );
    }

    debug!(conversation_id = %msg.conversation_id, seq, sender, "message sent");
    Ok(seq)
}

/// POST /api/message/send
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<Envelope<SendMessageResponse>>, ApiError> {
    let Json(req) = payload?;
    send(&state, claims, req).await
}

/// POST /api/room/{room_id}/message
pub async fn send_room_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    room_id: Result<Path<String>, PathRejection>,
    payload: Result<Json<RoomMessageRequest>, JsonRejection>,
) -> Result<Json<Envelope<SendMessageResponse>>, ApiError> {
    let Path(room_id) = room_id?;
    let Json(req) = payload?;
    send(&state, claims, req.into_send(room_id)).await
}

async fn send(
    state: &AppState,
    claims: Claims,
    req: SendMessageRequest,
) -> Result<Json<Envelope<SendMessageResponse>>, ApiError> {
    let seq = with_db(state, move |db| deliver(db, &claims.sub, req)).await?;
    Ok(Json(Envelope::success(SendMessageResponse { seq })))
}

/// GET /api/message/history
pub async fn get_history(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<Envelope<HistoryResponse>>, ApiError> {
    let Query(query) = query?;
    history(
        &state,
        query.conversation_type,
        query.conversation_id,
        query.last_seq,
        query.limit,
    )
    .await
}

/// GET /api/room/{room_id}/messages
pub async fn get_room_history(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    room_id: Result<Path<String>, PathRejection>,
    query: Result<Query<RoomHistoryQuery>, QueryRejection>,
) -> Result<Json<Envelope<HistoryResponse>>, ApiError> {
    let Path(room_id) = room_id?;
    let Query(query) = query?;
    history(&state, ConversationType::Room, room_id, query.last_seq, query.limit).await
}

async fn history(
    state: &AppState,
    conversation_type: ConversationType,
    conversation_id: String,
    after_seq: i64,
    limit: u32,
) -> Result<Json<Envelope<HistoryResponse>>, ApiError> {
    let limit = limit.min(MAX_HISTORY_LIMIT);
    let cid = conversation_id.clone();
    let messages = with_db(state, move |db| db.message_history(&cid, after_seq, limit)).await?;

    Ok(Json(Envelope::success(HistoryResponse {
        conversation_type,
        conversation_id,
        messages,
    })))
}

/// DELETE /api/message/{conversation_id}/{seq}
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Path((conversation_id, seq)) = path?;
    with_db(&state, move |db| {
        db.soft_delete_message(&conversation_id, seq, &claims.sub)
    })
    .await?;
    Ok(Json(Envelope::success(())))
}

#[cfg(test)]
mod tests {
    use parley_types::element::MessageElement;

    use super::*;

    fn request(
        conversation_id: &str,
        message_type: &str,
        character_id: Option<&str>,
    ) -> SendMessageRequest {
        SendMessageRequest {
            conversation_type: ConversationType::Dm,
            conversation_id: conversation_id.to_string(),
            message_type: message_type.to_string(),
            element: MessageElement::text("hello"),
            character_id: character_id.map(str::to_string),
        }
    }

    #[test]
    fn deliver_assigns_seq_and_projects_summary() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(deliver(&db, "u1", request("c1", "normal", None)).unwrap(), 1);
        assert_eq!(deliver(&db, "u2", request("c1", "normal", None)).unwrap(), 2);

        let conv = db.get_conversation("c1").unwrap();
        assert_eq!(conv.last_seq, 2);
        assert_eq!(conv.last_message, "hello");
        assert_eq!(conv.participants, vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn empty_conversation_id_allocates_nothing() {
        let db = Database::open_in_memory().unwrap();
        let err = deliver(&db, "u1", request("", "normal", None)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn failed_projection_keeps_the_message_and_catches_up() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn_mut(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER projection_offline BEFORE INSERT ON conversations
                 BEGIN SELECT RAISE(ABORT, 'projection offline'); END;",
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(deliver(&db, "u1", request("c1", "normal", None)).unwrap(), 1);
        assert_eq!(db.message_history("c1", 0, 10).unwrap().len(), 1);
        assert!(matches!(
            db.get_conversation("c1"),
            Err(StoreError::NotFound(_))
        ));

        db.with_conn_mut(|conn| {
            conn.execute_batch("DROP TRIGGER projection_offline;")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(deliver(&db, "u2", request("c1", "normal", None)).unwrap(), 2);
        let conv = db.get_conversation("c1").unwrap();
        assert_eq!(conv.last_seq, 2);
        assert_eq!(conv.last_message, "hello");
        let seqs: Vec<i64> = db
            .message_history("c1", 0, 10)
            .unwrap()
            .iter()
            .map(|m| m.seq)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn character_messages_need_a_character() {
        let db = Database::open_in_memory().unwrap();
        let err = deliver(&db, "u1", request("c1", "character", None)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(db.current_seq("c1").unwrap(), 0);

        deliver(&db, "u1", request("c1", "character", Some("knight"))).unwrap();
        let msgs = db.message_history("c1", 0, 10).unwrap();
        assert_eq!(
            msgs[0].character_info.as_ref().map(|c| c.character_id.as_str()),
            Some("knight")
        );
    }
}
