//! `/api/v1` The stable API

use std::sync::Arc;

use axum::{Router, middleware::from_fn_with_state, routing::get};

use crate::AppState;

pub mod auth;
mod friends;
mod me;
mod spots;
mod stats;
mod users;

pub fn router(app_state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(me::get))
        .nest("/users", users::router())
        .nest("/friends", friends::router())
        .layer(from_fn_with_state(app_state.clone(), auth::check_auth));

    Router::new()
        .route("/stats", get(stats::get))
        .nest("/auth", auth::router())
        .nest("/spots", spots::router(app_state))
        .merge(protected)
}
