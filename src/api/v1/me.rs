//! `/api/v1/me` Endpoints for the logged in account

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{AppState, api::v1::auth::CurrentUser, error::Error, objects::Me};

/// `GET /api/v1/me` Returns the caller's own profile
///
/// requires auth? yes
pub async fn get(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let me = Me::get(&mut conn, uuid).await?;

    Ok((StatusCode::OK, Json(me)))
}
