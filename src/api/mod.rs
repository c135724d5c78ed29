//! `/api` Contains the entire API

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::AppState;

mod v1;
mod versions;

#[derive(Serialize)]
struct RootResponse {
    message: String,
}

pub fn router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root))
        .route("/versions", get(versions::versions))
        .nest("/v1", v1::router(app_state))
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: String::from("Drop the Spot API"),
    })
}
