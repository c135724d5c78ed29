use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response as HttpResponse},
};
use axum_extra::extract::CookieJar;
use diesel::{ExpressionMethods, QueryDsl, delete, update};
use diesel_async::RunQueryDsl;

use crate::{
    AppState,
    error::Error,
    schema::{
        access_tokens::{self, dsl as adsl},
        refresh_tokens::{self, dsl as rdsl},
    },
    utils::{generate_token, new_refresh_token_cookie},
};

use super::{REFRESH_TOKEN_LIFETIME, REFRESH_TOKEN_ROTATE_AFTER, Response};

/// `POST /api/v1/auth/refresh` Trades the refresh token cookie for a
/// new access token
///
/// requires auth? no (refresh token cookie)
///
/// Refresh tokens die after 30 days and are rotated once they get
/// within a week of that.
pub async fn post(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<HttpResponse, Error> {
    let Some(cookie) = jar.get("refresh_token") else {
        return Err(Error::Unauthorized(
            "request has no refresh token".to_string(),
        ));
    };

    let mut refresh_token = String::from(cookie.value());

    let mut conn = app_state.pool.get().await?;

    let current_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    let (created_at, device_name): (i64, String) = match rdsl::refresh_tokens
        .filter(rdsl::token.eq(&refresh_token))
        .select((rdsl::created_at, rdsl::device_name))
        .get_result(&mut conn)
        .await
    {
        Ok(row) => row,
        Err(diesel::result::Error::NotFound) => {
            return Ok((
                jar.remove(new_refresh_token_cookie(String::new())),
                StatusCode::UNAUTHORIZED,
            )
                .into_response());
        }
        Err(error) => return Err(error.into()),
    };

    let lifetime = current_time - created_at;

    if lifetime > REFRESH_TOKEN_LIFETIME {
        delete(refresh_tokens::table)
            .filter(rdsl::token.eq(&refresh_token))
            .execute(&mut conn)
            .await?;

        return Ok((
            jar.remove(new_refresh_token_cookie(String::new())),
            StatusCode::UNAUTHORIZED,
        )
            .into_response());
    }

    if lifetime > REFRESH_TOKEN_ROTATE_AFTER {
        let new_refresh_token = generate_token::<32>()?;

        // access_tokens.refresh_token follows via ON UPDATE CASCADE
        update(refresh_tokens::table)
            .filter(rdsl::token.eq(&refresh_token))
            .set((
                rdsl::token.eq(&new_refresh_token),
                rdsl::created_at.eq(current_time),
            ))
            .execute(&mut conn)
            .await?;

        refresh_token = new_refresh_token;
    }

    let access_token = generate_token::<16>()?;

    update(access_tokens::table)
        .filter(adsl::refresh_token.eq(&refresh_token))
        .set((
            adsl::token.eq(&access_token),
            adsl::created_at.eq(current_time),
        ))
        .execute(&mut conn)
        .await?;

    Ok((
        jar.add(new_refresh_token_cookie(refresh_token)),
        Json(Response {
            access_token,
            device_name,
        }),
    )
        .into_response())
}
