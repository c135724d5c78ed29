use std::{io, time::SystemTimeError};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use deadpool::managed::{BuildError, PoolError};
use diesel::{ConnectionError, result::DatabaseErrorKind, result::Error as DieselError};
use diesel_async::pooled_connection::PoolError as DieselPoolError;
use log::error;
use redis::RedisError;
use serde::Serialize;
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::task::JoinError;
use toml::de::Error as TomlError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    SqlError(#[from] DieselError),
    #[error(transparent)]
    PoolError(#[from] PoolError<DieselPoolError>),
    #[error(transparent)]
    BuildError(#[from] BuildError),
    #[error(transparent)]
    RedisError(#[from] RedisError),
    #[error(transparent)]
    ConnectionError(#[from] ConnectionError),
    #[error(transparent)]
    JoinError(#[from] JoinError),
    #[error(transparent)]
    IoError(#[from] io::Error),
    #[error(transparent)]
    TomlError(#[from] TomlError),
    #[error(transparent)]
    JsonError(#[from] JsonError),
    #[error(transparent)]
    SystemTimeError(#[from] SystemTimeError),
    #[error(transparent)]
    RandomError(#[from] getrandom::Error),
    #[error("{0}")]
    MigrationError(String),
    #[error("{0}")]
    PasswordHashError(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::SqlError(DieselError::NotFound) => StatusCode::NOT_FOUND,
            Error::SqlError(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            )) => StatusCode::CONFLICT,
            // Store unavailable or timed out, safe for the caller to retry
            Error::PoolError(_) | Error::ConnectionError(_) | Error::RedisError(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        error!("{}: {}", status_code, self);

        (status_code, Json(WebError::new(self.to_string()))).into_response()
    }
}

#[derive(Serialize)]
struct WebError {
    message: String,
}

impl WebError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let error = Error::from(DieselError::NotFound);
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let error = Error::from(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        ));
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn caller_errors_map_to_4xx() {
        assert_eq!(
            Error::BadRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::Unauthorized("no token".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Forbidden("not yours".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Conflict("already friends".to_string()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unexpected_errors_map_to_500() {
        let error = Error::from(DieselError::RollbackTransaction);
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
