//! `/api/v1/spots/{uuid}` Spot specific endpoints

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    api::v1::auth::CurrentUser,
    error::Error,
    objects::{Rating, Spot},
};

/// `GET /api/v1/spots/{uuid}` Returns one spot
///
/// requires auth? no
pub async fn get(
    State(app_state): State<Arc<AppState>>,
    Path(spot_uuid): Path<Uuid>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let spot = Spot::fetch_one(&mut conn, &app_state.cache_pool, spot_uuid).await?;

    Ok((StatusCode::OK, Json(spot)))
}

/// `DELETE /api/v1/spots/{uuid}` Deletes a spot and its ratings
///
/// requires auth? yes (owner only)
pub async fn delete(
    State(app_state): State<Arc<AppState>>,
    Path(spot_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let spot = Spot::fetch_one(&mut conn, &app_state.cache_pool, spot_uuid).await?;

    spot.delete(&mut conn, &app_state.cache_pool, uuid).await?;

    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
pub struct RateBody {
    rating: i16,
}

#[derive(Serialize)]
struct RateResponse {
    average_rating: f64,
    rating_count: i64,
}

/// `POST /api/v1/spots/{uuid}/rate` Rates a spot from 1 to 5
///
/// requires auth? yes
///
/// Rating the same spot again replaces the earlier value instead of
/// counting twice.
///
/// ### Request Example
/// ```
/// json!({
///     "rating": 4
/// });
/// ```
///
/// ### Response Example
/// ```
/// json!({
///     "average_rating": 4.0,
///     "rating_count": 2
/// });
/// ```
pub async fn rate(
    State(app_state): State<Arc<AppState>>,
    Path(spot_uuid): Path<Uuid>,
    Extension(CurrentUser(uuid)): Extension<CurrentUser<Uuid>>,
    Json(body): Json<RateBody>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let tally = Rating::submit(
        &mut conn,
        &app_state.cache_pool,
        spot_uuid,
        uuid,
        body.rating,
    )
    .await?;

    Ok((
        StatusCode::OK,
        Json(RateResponse {
            average_rating: tally.average(),
            rating_count: tally.rating_count,
        }),
    ))
}
