use std::{sync::Arc, time::SystemTime};

use axum::{Json, extract::State, response::IntoResponse};
use diesel::QueryDsl;
use diesel_async::RunQueryDsl;
use serde::Serialize;

use crate::{
    AppState,
    error::Error,
    schema::{spots, users},
};

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

#[derive(Serialize)]
struct Response {
    accounts: i64,
    spots: i64,
    uptime: u64,
    version: String,
}

pub async fn get(State(app_state): State<Arc<AppState>>) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let accounts: i64 = users::table.count().get_result(&mut conn).await?;
    let spots: i64 = spots::table.count().get_result(&mut conn).await?;

    let response = Response {
        accounts,
        spots,
        uptime: SystemTime::now()
            .duration_since(app_state.start_time)?
            .as_secs(),
        version: String::from(VERSION.unwrap_or("UNKNOWN")),
    };

    Ok(Json(response))
}
