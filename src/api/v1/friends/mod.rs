//! `/api/v1/friends` Friend list and request lifecycle

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{AppState, api::v1::auth::CurrentUser, error::Error, objects::Me};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_friends))
        .route("/{uuid}", delete(remove_friend))
        .route("/requests", get(pending_requests))
        .route("/request/{uuid}", post(send_request))
        .route("/request/{uuid}", delete(decline_request))
        .route("/accept/{uuid}", post(accept_request))
}

/// `GET /api/v1/friends` Returns the caller's friends
///
/// requires auth? yes
///
/// ### Response Example
/// ```
/// json!([
///     {
///         "uuid": "155d2291-fb23-46bd-a656-ae7c5d8218e6",
///         "username": "bob",
///         "created_at": "2025-07-08T09:14:00Z",
///         "spots_count": 2,
///         "friends_since": "2025-07-10T17:03:12Z",
///         "is_friend": true
///     }
/// ]);
/// ```
pub async fn get_friends(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let friends = me.get_friends(&mut conn, &app_state.cache_pool).await?;

    Ok((StatusCode::OK, Json(friends)))
}

/// `DELETE /api/v1/friends/{uuid}` Removes a friend
///
/// requires auth? yes
pub async fn remove_friend(
    State(app_state): State<Arc<AppState>>,
    Path(friend_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    me.remove_friend(&mut conn, friend_uuid).await?;

    Ok(StatusCode::OK)
}

/// `GET /api/v1/friends/requests` Pending incoming friend requests,
/// newest first
///
/// requires auth? yes
pub async fn pending_requests(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let requests = me
        .get_pending_requests(&mut conn, &app_state.cache_pool)
        .await?;

    Ok((StatusCode::OK, Json(requests)))
}

/// `POST /api/v1/friends/request/{uuid}` Sends a friend request to the
/// user with the given UUID
///
/// requires auth? yes
///
/// ### Responses
/// 200 Success, returns the pending request
///
/// 400 Bad Request (target is yourself)
///
/// 404 Not Found (no such user)
///
/// 409 Conflict (already friends, or a request is already pending)
///
pub async fn send_request(
    State(app_state): State<Arc<AppState>>,
    Path(target_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let request = me.send_friend_request(&mut conn, target_uuid).await?;

    Ok((StatusCode::OK, Json(request)))
}

/// `DELETE /api/v1/friends/request/{uuid}` Withdraws (as sender) or
/// rejects (as receiver) a pending request
///
/// requires auth? yes
pub async fn decline_request(
    State(app_state): State<Arc<AppState>>,
    Path(request_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    me.decline_friend_request(&mut conn, request_uuid).await?;

    Ok(StatusCode::OK)
}

/// `POST /api/v1/friends/accept/{uuid}` Accepts a pending request
///
/// requires auth? yes
///
/// ### Responses
/// 200 Success, returns the friendship
///
/// 403 Forbidden (caller is not the receiver)
///
/// 404 Not Found (no such request; a request consumed by a concurrent
/// accept or decline surfaces as 404, not 409, and is not worth
/// retrying)
///
/// 409 Conflict (friendship already exists)
///
pub async fn accept_request(
    State(app_state): State<Arc<AppState>>,
    Path(request_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let friend = me.accept_friend_request(&mut conn, request_uuid).await?;

    Ok((StatusCode::OK, Json(friend)))
}
