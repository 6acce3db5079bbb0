use axum::{
    Json, Router, middleware,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{conversations, messages, relations};

/// All routes. `/api/*` requires a bearer token; `/healthz` does not.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Messages
        .route("/message/send", post(messages::send_message))
        .route("/message/history", get(messages::get_history))
        .route("/message/{conversation_id}/{seq}", delete(messages::delete_message))
        .route("/room/{room_id}/message", post(messages::send_room_message))
        .route("/room/{room_id}/messages", get(messages::get_room_history))
        // Conversations
        .route("/conversations", get(conversations::list_conversations))
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        // Relations
        .route("/relation/friend/request", post(relations::create_friend_request))
        .route("/relation/friend/respond", post(relations::respond_friend_request))
        .route("/relation/friend/requests", get(relations::list_friend_requests))
        .route("/relation/friends", get(relations::list_friends))
        .route("/relation/friend/{user_id}", delete(relations::delete_friend))
        .route(
            "/relation/block/{user_id}",
            post(relations::block_user).delete(relations::unblock_user),
        )
        .route("/relation/blocks", get(relations::list_blocks))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
