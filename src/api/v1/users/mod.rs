//! `/api/v1/users` User lookup and search

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    api::v1::auth::CurrentUser,
    error::Error,
    objects::{Me, User},
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/search", get(search))
        .route("/{uuid}", get(get_one))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

/// `GET /api/v1/users/search?q=` Case-insensitive username search
///
/// requires auth? yes
///
/// Queries shorter than 2 characters return an empty list. Results
/// carry `spots_count` and `is_friend` relative to the caller; the
/// caller never shows up in them.
///
/// ### Response Example
/// ```
/// json!([
///     {
///         "uuid": "155d2291-fb23-46bd-a656-ae7c5d8218e6",
///         "username": "alice",
///         "created_at": "2025-07-08T09:14:00Z",
///         "spots_count": 3,
///         "friends_since": null,
///         "is_friend": false
///     }
/// ]);
/// ```
pub async fn search(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let users = User::search(&mut conn, &me, query.q.as_deref().unwrap_or_default()).await?;

    Ok((StatusCode::OK, Json(users)))
}

/// `GET /api/v1/users/{uuid}` Public profile of one user, annotated
/// with the friendship state towards the caller
///
/// requires auth? yes
pub async fn get_one(
    State(app_state): State<Arc<AppState>>,
    Path(user_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    let user =
        User::fetch_one_with_friendship(&mut conn, &app_state.cache_pool, &me, user_uuid).await?;

    Ok((StatusCode::OK, Json(user)))
}
