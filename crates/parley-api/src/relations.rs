use axum::{
    Extension, Json,
    extract::{Path, State, rejection::{JsonRejection, PathRejection}},
};
use tracing::info;

use parley_types::api::{
    BlockList, Claims, CreateFriendRequestBody, Envelope, FriendList, FriendRequestCreated,
    FriendRequestList, RespondFriendRequestBody,
};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// POST /api/relation/friend/request
pub async fn create_friend_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateFriendRequestBody>, JsonRejection>,
) -> Result<Json<Envelope<FriendRequestCreated>>, ApiError> {
    let Json(body) = payload?;
    let request = with_db(&state, move |db| {
        db.create_friend_request(&claims.sub, &body.user_id, &body.greeting)
    })
    .await?;

    Ok(Json(Envelope::success(FriendRequestCreated {
        request_id: request.id,
    })))
}

/// POST /api/relation/friend/respond
pub async fn respond_friend_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<RespondFriendRequestBody>, JsonRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Json(body) = payload?;
    with_db(&state, move |db| {
        db.respond_friend_request(&body.request_id, &claims.sub, body.action)
    })
    .await?;

    Ok(Json(Envelope::success(())))
}

/// GET /api/relation/friend/requests
pub async fn list_friend_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Envelope<FriendRequestList>>, ApiError> {
    let list = with_db(&state, move |db| db.list_friend_requests(&claims.sub)).await?;
    Ok(Json(Envelope::success(FriendRequestList { list })))
}

/// GET /api/relation/friends
pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Envelope<FriendList>>, ApiError> {
    let friends = with_db(&state, move |db| db.list_friends(&claims.sub)).await?;
    Ok(Json(Envelope::success(FriendList { friends })))
}

/// DELETE /api/relation/friend/{user_id}
pub async fn delete_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    other: Result<Path<String>, PathRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Path(other) = other?;
    with_db(&state, move |db| db.delete_friend(&claims.sub, &other)).await?;
    Ok(Json(Envelope::success(())))
}

/// POST /api/relation/block/{user_id}
pub async fn block_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    target: Result<Path<String>, PathRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Path(target) = target?;
    let edge = with_db(&state, move |db| db.block(&claims.sub, &target)).await?;
    info!(user_id = %edge.user_id, blocked = %edge.blocked_user_id, "block added");
    Ok(Json(Envelope::success(())))
}

/// DELETE /api/relation/block/{user_id}
pub async fn unblock_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    target: Result<Path<String>, PathRejection>,
) -> Result<Json<Envelope<()>>, ApiError> {
    let Path(target) = target?;
    with_db(&state, move |db| db.unblock(&claims.sub, &target)).await?;
    Ok(Json(Envelope::success(())))
}

/// GET /api/relation/blocks
pub async fn list_blocks(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Envelope<BlockList>>, ApiError> {
    let list = with_db(&state, move |db| db.list_blocks(&claims.sub)).await?;
    Ok(Json(Envelope::success(BlockList { list })))
}
