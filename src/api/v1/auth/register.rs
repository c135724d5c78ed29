use std::sync::Arc;

use argon2::{
    PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;
use diesel::{ExpressionMethods, dsl::insert_into};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::Error,
    schema::users::{self, dsl as udsl},
    utils::{EMAIL_REGEX, USERNAME_REGEX, new_refresh_token_cookie},
};

use super::start_session;

#[derive(Deserialize)]
pub struct AccountInformation {
    username: String,
    email: String,
    password: String,
}

/// `POST /api/v1/auth/register` Creates an account and logs it in
///
/// requires auth? no
///
/// ### Request Example:
/// ```
/// json!({
///     "username": "alice",
///     "email": "alice@example.com",
///     "password": "correct horse battery staple"
/// });
/// ```
///
/// ### Responses
/// 200 Success, refresh token cookie + access token body
///
/// 400 Bad Request (invalid username, email or password)
///
/// 403 Forbidden (registration disabled)
///
/// 409 Conflict (username or email taken)
///
pub async fn post(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(account_information): Json<AccountInformation>,
) -> Result<impl IntoResponse, Error> {
    if !app_state.config.instance.registration {
        return Err(Error::Forbidden(
            "registration is disabled on this instance".to_string(),
        ));
    }

    if !USERNAME_REGEX.is_match(&account_information.username)
        || account_information.username.len() < 3
        || account_information.username.len() > 32
    {
        return Err(Error::BadRequest("Invalid username".to_string()));
    }

    if !EMAIL_REGEX.is_match(&account_information.email) {
        return Err(Error::BadRequest("Invalid email".to_string()));
    }

    if account_information.password.len() < 8 {
        return Err(Error::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let uuid = Uuid::now_v7();

    let salt = SaltString::generate(&mut OsRng);

    let hashed_password = app_state
        .argon2
        .hash_password(account_information.password.as_bytes(), &salt)
        .map_err(|error| Error::PasswordHashError(error.to_string()))?;

    let mut conn = app_state.pool.get().await?;

    // Unique violations on username/email surface as 409
    insert_into(users::table)
        .values((
            udsl::uuid.eq(uuid),
            udsl::username.eq(&account_information.username),
            udsl::email.eq(&account_information.email),
            udsl::password.eq(hashed_password.to_string()),
        ))
        .execute(&mut conn)
        .await?;

    let (refresh_token, response) = start_session(&mut conn, uuid).await?;

    Ok((
        jar.add(new_refresh_token_cookie(refresh_token)),
        Json(response),
    ))
}
