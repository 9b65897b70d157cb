//! Unified server error type.
//!
//! JSON endpoints return `Result<T, ServerError>`, which renders as
//! `{"success": false, "error": "..."}` with a matching status code. The
//! streaming endpoints and the Request Gate answer in plain text instead; they
//! go through [`PlainTextError`], which reuses the same status mapping.
//!
//! Internal errors (database, hashing, mail transport) are logged in full but
//! only a generic message reaches the caller.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatrelay_core::{AuthError, CompletionError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::mailer::MailerError;

/// All errors that can occur in the chatrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request Gate failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Propagated from the completion upstream before any output was sent.
    #[error(transparent)]
    Upstream(#[from] CompletionError),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The verification code could not be delivered.
    #[error(transparent)]
    Mailer(#[from] MailerError),

    /// The caller sent an invalid or malformed request.
    #[error("{0}")]
    BadRequest(String),

    #[error("invalid or expired verification code")]
    InvalidVerificationCode,

    #[error("email is already registered")]
    DuplicateRegistration,

    #[error("invalid email or password")]
    LoginFailed,

    /// The caller referenced a resource that does not exist (or is not theirs).
    #[error("{0}")]
    NotFound(String),

    /// The write collides with data the caller does not own.
    #[error("{0}")]
    Conflict(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Status code and the message safe to show the caller. Internal
    /// variants are logged here.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ServerError::Auth(AuthError::Unauthenticated)
            | ServerError::Auth(AuthError::InvalidOrExpiredCredential)
            | ServerError::LoginFailed => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::BadRequest(_) | ServerError::InvalidVerificationCode => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ServerError::DuplicateRegistration | ServerError::Conflict(_) => {
                (StatusCode::CONFLICT, self.to_string())
            }
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),

            ServerError::Upstream(e) => {
                error!(error = %e, "completion upstream error");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ServerError::Auth(e) => {
                error!(error = %e, "credential primitive failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Mailer(e) => {
                error!(error = %e, "verification mail failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to send verification code".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = self.status_and_message();
        (
            status,
            Json(json!({ "success": false, "error": client_message })),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("blocking task failed: {e}"))
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

/// Plain-text error body for the gate and the streaming endpoints.
///
/// Server-side failures read `Error: <message>`; client errors carry the
/// bare message.
#[derive(Debug)]
pub struct PlainTextError {
    pub status: StatusCode,
    pub message: String,
}

impl From<ServerError> for PlainTextError {
    fn from(e: ServerError) -> Self {
        let (status, message) = e.status_and_message();
        let message = if status.is_server_error() {
            format!("Error: {message}")
        } else {
            message
        };
        Self { status, message }
    }
}

impl From<AuthError> for PlainTextError {
    fn from(e: AuthError) -> Self {
        ServerError::from(e).into()
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plain_text_prefixes_server_errors_only() {
        let e = PlainTextError::from(ServerError::Internal("boom".into()));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.message, "Error: internal server error");

        let e = PlainTextError::from(ServerError::BadRequest("messages is required".into()));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.message, "messages is required");
    }

    #[test]
    fn gate_failures_are_unauthorized() {
        let e = PlainTextError::from(AuthError::Unauthenticated);
        assert_eq!(e.status, StatusCode::UNAUTHORIZED);
        assert_eq!(e.message, "unauthenticated");

        let e = PlainTextError::from(AuthError::InvalidOrExpiredCredential);
        assert_eq!(e.message, "invalid or expired credential");
    }

    #[test]
    fn upstream_message_is_exposed() {
        let e = PlainTextError::from(ServerError::Upstream(CompletionError::Api {
            status: 429,
            message: "rate limited".into(),
        }));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.message, "Error: upstream API error 429: rate limited");
    }
}
