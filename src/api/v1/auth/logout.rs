use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use diesel::{ExpressionMethods, delete};
use diesel_async::RunQueryDsl;

use crate::{
    AppState,
    error::Error,
    schema::refresh_tokens::{self, dsl},
    utils::new_refresh_token_cookie,
};

/// `POST /api/v1/auth/logout` Ends the session behind the refresh
/// token cookie, access tokens go with it.
pub async fn post(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, Error> {
    let Some(cookie) = jar.get("refresh_token") else {
        return Err(Error::Unauthorized(
            "request has no refresh token".to_string(),
        ));
    };

    let refresh_token = String::from(cookie.value());

    let mut conn = app_state.pool.get().await?;

    delete(refresh_tokens::table)
        .filter(dsl::token.eq(refresh_token))
        .execute(&mut conn)
        .await?;

    Ok((
        jar.remove(new_refresh_token_cookie(String::new())),
        StatusCode::OK,
    ))
}
