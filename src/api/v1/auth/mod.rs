//! `/api/v1/auth` Registration, login and token lifecycle

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    Router,
    extract::{Request, State},
    middleware::Next,
    routing::post,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use diesel::{ExpressionMethods, QueryDsl, dsl::insert_into};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState, Conn,
    error::Error,
    schema::{
        access_tokens::{self, dsl as adsl},
        refresh_tokens::{self, dsl as rdsl},
    },
    utils::{generate_device_name, generate_token},
};

mod login;
mod logout;
mod refresh;
mod register;

/// Access tokens are short-lived, refresh tokens rotate near the end of
/// their 30 days.
const ACCESS_TOKEN_LIFETIME: i64 = 3600;
const REFRESH_TOKEN_LIFETIME: i64 = 2592000;
const REFRESH_TOKEN_ROTATE_AFTER: i64 = 1987200;

#[derive(Serialize)]
struct Response {
    access_token: String,
    device_name: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register::post))
        .route("/login", post(login::post))
        .route("/refresh", post(refresh::post))
        .route("/logout", post(logout::post))
}

#[derive(Clone)]
pub struct CurrentUser<T>(pub T);

/// Resolves the bearer token to a user and stashes it for the handler.
/// Routes behind this layer can rely on `Extension(CurrentUser(uuid))`.
pub async fn check_auth(
    State(app_state): State<Arc<AppState>>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<axum::response::Response, Error> {
    let TypedHeader(Authorization(bearer)) = auth.ok_or_else(|| {
        Error::Unauthorized("No authorization header provided".to_string())
    })?;

    let mut conn = app_state.pool.get().await?;

    let uuid = check_access_token(bearer.token(), &mut conn).await?;

    req.extensions_mut().insert(CurrentUser(uuid));

    Ok(next.run(req).await)
}

pub async fn check_access_token(access_token: &str, conn: &mut Conn) -> Result<Uuid, Error> {
    let (uuid, created_at): (Uuid, i64) = adsl::access_tokens
        .filter(adsl::token.eq(access_token))
        .select((adsl::uuid, adsl::created_at))
        .get_result(conn)
        .await
        .map_err(|error| {
            if error == diesel::result::Error::NotFound {
                Error::Unauthorized("Invalid access token".to_string())
            } else {
                Error::from(error)
            }
        })?;

    let current_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    let lifetime = current_time - created_at;

    if lifetime > ACCESS_TOKEN_LIFETIME {
        return Err(Error::Unauthorized("Invalid access token".to_string()));
    }

    Ok(uuid)
}

/// Issues a fresh refresh/access token pair for `user_uuid`. Returns
/// the refresh token (for the cookie) and the response body.
async fn start_session(conn: &mut Conn, user_uuid: Uuid) -> Result<(String, Response), Error> {
    let refresh_token = generate_token::<32>()?;
    let access_token = generate_token::<16>()?;

    let current_time = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;

    let device_name = generate_device_name();

    insert_into(refresh_tokens::table)
        .values((
            rdsl::token.eq(&refresh_token),
            rdsl::uuid.eq(user_uuid),
            rdsl::created_at.eq(current_time),
            rdsl::device_name.eq(&device_name),
        ))
        .execute(conn)
        .await?;

    insert_into(access_tokens::table)
        .values((
            adsl::token.eq(&access_token),
            adsl::refresh_token.eq(&refresh_token),
            adsl::uuid.eq(user_uuid),
            adsl::created_at.eq(current_time),
        ))
        .execute(conn)
        .await?;

    Ok((
        refresh_token,
        Response {
            access_token,
            device_name,
        },
    ))
}
