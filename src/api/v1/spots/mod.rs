//! `/api/v1/spots` The map itself

use std::sync::Arc;

use ::uuid::Uuid;
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{delete, get, post},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::Deserialize;

use crate::{
    AppState,
    api::v1::auth::{self, CurrentUser, check_access_token},
    error::Error,
    objects::{Spot, VisibilityFilter},
};

mod uuid;

pub fn router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/", post(create))
        .route("/{uuid}", delete(uuid::delete))
        .route("/{uuid}/rate", post(uuid::rate))
        .layer(from_fn_with_state(app_state, auth::check_auth));

    Router::new()
        .route("/", get(list))
        .route("/{uuid}", get(uuid::get))
        .merge(protected)
}

#[derive(Deserialize)]
pub struct FilterQuery {
    filter_type: Option<VisibilityFilter>,
}

/// `GET /api/v1/spots?filter_type={global|own|friends}` Lists spots
///
/// requires auth? only for `own` and `friends`
///
/// A bearer token is optional but validated whenever present, so stale
/// sessions fail fast instead of silently degrading to `global`.
pub async fn list(
    State(app_state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<FilterQuery>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let viewer = match auth {
        Some(TypedHeader(Authorization(bearer))) => {
            Some(check_access_token(bearer.token(), &mut conn).await?)
        }
        None => None,
    };

    let spots = Spot::fetch_visible(
        &mut conn,
        viewer,
        query.filter_type.unwrap_or_default(),
        app_state.config.instance.friends_filter_includes_self,
    )
    .await?;

    Ok((StatusCode::OK, Json(spots)))
}

#[derive(Deserialize)]
pub struct NewSpot {
    title: String,
    description: String,
    photo: Option<String>,
    latitude: f64,
    longitude: f64,
}

/// `POST /api/v1/spots` Drops a new spot on the map
///
/// requires auth? yes
///
/// ### Request Example
/// ```
/// json!({
///     "title": "hidden rooftop",
///     "description": "Best view of the harbour.",
///     "photo": "data:image/jpeg;base64,...",
///     "latitude": 51.2194,
///     "longitude": 4.4025
/// });
/// ```
///
/// ### Responses
/// 200 Success, returns the spot with its derived `average_rating`
///
/// 400 Bad Request (bad title, description or coordinates)
///
pub async fn create(
    State(app_state): State<Arc<AppState>>,
    Extension(CurrentUser(user_uuid)): Extension<CurrentUser<Uuid>>,
    Json(new_spot): Json<NewSpot>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let spot = Spot::new(
        &mut conn,
        &app_state.cache_pool,
        user_uuid,
        new_spot.title,
        new_spot.description,
        new_spot.photo,
        new_spot.latitude,
        new_spot.longitude,
    )
    .await?;

    Ok((StatusCode::OK, Json(spot)))
}
