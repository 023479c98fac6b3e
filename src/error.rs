//! Crate error type
//!
//! Integrity conflicts are not represented here: batch inserts and project
//! creation recover from them locally (see [`crate::db::integrity`]).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("username '{0}' is already registered")]
    UsernameTaken(String),

    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),

    #[error("failed to sign token: {0}")]
    TokenEncode(jsonwebtoken::errors::Error),

    /// The only error surfaced to end users from the session layer
    #[error("Could not decode the user. Invalid token.")]
    InvalidToken,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::UsernameTaken(_) => StatusCode::CONFLICT,
            Error::Database(_) | Error::PasswordHash(_) | Error::TokenEncode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
