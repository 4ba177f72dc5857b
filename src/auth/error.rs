//! Authentication Errors
//! Mission: Keep failure kinds distinct internally, uniform on the wire

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Every failure the auth core can produce
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("malformed token")]
    MalformedToken,

    #[error("token expired")]
    ExpiredToken,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("session not found")]
    SessionNotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AuthError {
    /// Kinds that are reported to the caller as a bare 401
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::MalformedToken
                | AuthError::ExpiredToken
                | AuthError::InvalidSignature
                | AuthError::SessionNotFound
                | AuthError::Unauthorized
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            e if e.is_token_rejection() => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserAlreadyExists => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text shown to the caller; never names the failed check
    pub fn public_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "invalid email or password".to_string(),
            e if e.is_token_rejection() => "unauthorized".to_string(),
            AuthError::Forbidden => "forbidden".to_string(),
            AuthError::UserAlreadyExists => "email or username has been used".to_string(),
            AuthError::UserNotFound => "user not found".to_string(),
            AuthError::InvalidRequest(reason) => reason.clone(),
            _ => "internal server error".to_string(),
        }
    }
}

impl From<rusqlite::Error> for AuthError {
    fn from(err: rusqlite::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Storage(format!("blocking task failed: {}", err))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "auth request failed");
        } else {
            warn!(error = %self, status = status.as_u16(), "auth request rejected");
        }

        (status, self.public_message()).into_response()
    }
}
