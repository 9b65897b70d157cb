//! Request Gate: bearer credential check in front of every protected route.
//!
//! The credential is read from `Authorization: Bearer <token>`, falling back
//! to the `auth-token` cookie set by `/login`. On success the caller's id is
//! attached to the request as an [`AuthUser`] extension; on failure the
//! request is answered `401` in plain text and never reaches the handler.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chatrelay_core::AuthError;
use chrono::Utc;
use tracing::debug;

use crate::error::PlainTextError;
use crate::state::AppState;

/// Name of the session cookie carrying the bearer token.
pub const AUTH_COOKIE: &str = "auth-token";

/// The authenticated caller, inserted by [`require_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
}

pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = presented_token(req.headers()) else {
        return PlainTextError::from(AuthError::Unauthenticated).into_response();
    };

    match state.tokens.verify(&token, Utc::now()) {
        Ok(user_id) => {
            req.extensions_mut().insert(AuthUser { user_id });
            next.run(req).await
        }
        Err(e) => {
            debug!(error = %e, "credential rejected");
            PlainTextError::from(e).into_response()
        }
    }
}

/// Bearer header first, then the session cookie.
fn presented_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_owned());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_owned())
}
