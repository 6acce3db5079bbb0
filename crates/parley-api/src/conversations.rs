use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};

use parley_db::StoreError;
use parley_types::api::{Claims, ConversationList, Envelope};
use parley_types::models::Conversation;

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Envelope<ConversationList>>, ApiError> {
    let conversations = with_db(&state, move |db| db.list_conversations(&claims.sub)).await?;
    Ok(Json(Envelope::success(ConversationList { conversations })))
}

/// GET /api/conversations/{conversation_id}
///
/// Only participants may read a conversation's summary.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    conversation_id: Result<Path<String>, PathRejection>,
) -> Result<Json<Envelope<Conversation>>, ApiError> {
    let Path(conversation_id) = conversation_id?;
    let conversation = with_db(&state, move |db| db.get_conversation(&conversation_id)).await?;

    if !conversation.participants.contains(&claims.sub) {
        return Err(StoreError::Forbidden("not a participant".to_string()).into());
    }
    Ok(Json(Envelope::success(conversation)))
}
