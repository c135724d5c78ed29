use std::sync::Arc;

use argon2::{PasswordHash, PasswordVerifier};
use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::CookieJar;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::Error,
    schema::users::dsl as udsl,
    utils::{EMAIL_REGEX, new_refresh_token_cookie},
};

use super::start_session;

#[derive(Deserialize)]
pub struct LoginInformation {
    identifier: String,
    password: String,
}

/// `POST /api/v1/auth/login` Logs into an existing account
///
/// requires auth? no
///
/// `identifier` is either the username or the email address.
pub async fn post(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(login_information): Json<LoginInformation>,
) -> Result<impl IntoResponse, Error> {
    let mut conn = app_state.pool.get().await?;

    let lookup = if EMAIL_REGEX.is_match(&login_information.identifier) {
        udsl::users
            .filter(udsl::email.eq(&login_information.identifier))
            .select((udsl::uuid, udsl::password))
            .get_result::<(Uuid, String)>(&mut conn)
            .await
    } else {
        udsl::users
            .filter(udsl::username.eq(&login_information.identifier))
            .select((udsl::uuid, udsl::password))
            .get_result::<(Uuid, String)>(&mut conn)
            .await
    };

    // An unknown identifier reads the same as a bad password
    let (uuid, password_hash) = lookup.map_err(|error| {
        if error == diesel::result::Error::NotFound {
            Error::Unauthorized("wrong identifier or password".to_string())
        } else {
            Error::from(error)
        }
    })?;

    let parsed_hash = PasswordHash::new(&password_hash)
        .map_err(|error| Error::PasswordHashError(error.to_string()))?;

    if app_state
        .argon2
        .verify_password(login_information.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return Err(Error::Unauthorized(
            "wrong identifier or password".to_string(),
        ));
    }

    let (refresh_token, response) = start_session(&mut conn, uuid).await?;

    Ok((
        jar.add(new_refresh_token_cookie(refresh_token)),
        Json(response),
    ))
}
