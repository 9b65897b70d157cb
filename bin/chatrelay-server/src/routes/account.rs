//! Account routes: verification codes, registration, login and logout.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::auth::{hash_password, verify_password};
use chatrelay_core::email::is_allowed_email;
use chatrelay_core::verification::{code_ttl, generate_code};
use chrono::Utc;
use tracing::{info, warn};
use utoipa::OpenApi;
use validator::Validate;

use crate::entities::UserStore;
use crate::error::ServerError;
use crate::middleware::AUTH_COOKIE;
use crate::schemas::account::{
    AckResponse, LoginRequest, LoginResponse, RegisterRequest, SendCodeRequest, UserSummary,
};
use crate::state::AppState;

const EMAIL_NOT_ALLOWED: &str = "email address is invalid or not on the allow-list";

#[derive(OpenApi)]
#[openapi(
    paths(send_code, register, login, logout),
    components(schemas(
        SendCodeRequest,
        RegisterRequest,
        LoginRequest,
        AckResponse,
        LoginResponse,
        UserSummary
    ))
)]
pub struct AccountApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/send-code", post(send_code))
        .route("/register", post(register))
        .route("/login", post(login).delete(logout))
}

/// Issue a 6-digit verification code valid for ten minutes.
#[utoipa::path(
    post,
    path = "/send-code",
    tag = "account",
    request_body = SendCodeRequest,
    responses(
        (status = 200, description = "Code issued", body = AckResponse),
        (status = 400, description = "Email missing, malformed or not allow-listed"),
        (status = 500, description = "Code could not be delivered"),
    )
)]
pub async fn send_code(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendCodeRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate()?;
    if !is_allowed_email(&req.email) {
        return Err(ServerError::BadRequest(EMAIL_NOT_ALLOWED.to_owned()));
    }

    let code = generate_code();
    state
        .codes
        .issue(&req.email, &code, Utc::now() + code_ttl())
        .await;
    state.mailer.send_code(&req.email, &code).await?;

    info!(email = %req.email, "verification code sent");
    Ok(Json(AckResponse::ok("verification code sent")))
}

/// Create an account. The domain check runs before the code is looked at.
#[utoipa::path(
    post,
    path = "/register",
    tag = "account",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AckResponse),
        (status = 400, description = "Missing field, email not allow-listed, or bad code"),
        (status = 409, description = "Email already registered"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate()?;
    if !is_allowed_email(&req.email) {
        return Err(ServerError::BadRequest(EMAIL_NOT_ALLOWED.to_owned()));
    }
    if !state.codes.check(&req.email, &req.code, Utc::now()).await {
        return Err(ServerError::InvalidVerificationCode);
    }
    if state.store.find_user_by_email(&req.email).await?.is_some() {
        return Err(ServerError::DuplicateRegistration);
    }

    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
    let user = state
        .store
        .create_user(&req.email, &password_hash)
        .await?
        .ok_or(ServerError::DuplicateRegistration)?;
    // A code re-sent since the check stays valid.
    state.codes.consume(&req.email, &req.code, Utc::now()).await;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(Json(AckResponse::ok("registration successful")))
}

/// Exchange credentials for a bearer token, also set as the `auth-token`
/// cookie.
#[utoipa::path(
    post,
    path = "/login",
    tag = "account",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing field or invalid email"),
        (status = 401, description = "Unknown email or wrong password"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate()?;
    if !is_allowed_email(&req.email) {
        return Err(ServerError::BadRequest(EMAIL_NOT_ALLOWED.to_owned()));
    }

    let Some(user) = state.store.find_user_by_email(&req.email).await? else {
        warn!(email = %req.email, "login for unknown email");
        return Err(ServerError::LoginFailed);
    };
    let password = req.password;
    let stored = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?;
    if !matches {
        warn!(user_id = user.id, "login with wrong password");
        return Err(ServerError::LoginFailed);
    }

    let token = state.tokens.issue(user.id, Utc::now())?;
    let cookie = session_cookie(&token, state.tokens.ttl().num_seconds(), state.config.secure_cookies)?;

    info!(user_id = user.id, "user logged in");
    let body = LoginResponse {
        success: true,
        message: "login successful".to_owned(),
        token,
        user: UserSummary { email: user.email },
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Clear the session cookie. Tokens are stateless, so an already copied
/// bearer token stays valid until it expires.
#[utoipa::path(
    delete,
    path = "/login",
    tag = "account",
    responses(
        (status = 200, description = "Logged out", body = AckResponse),
    )
)]
pub async fn logout(State(state): State<Arc<AppState>>) -> Result<Response, ServerError> {
    let cookie = session_cookie("", 0, state.config.secure_cookies)?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AckResponse::ok("logged out")),
    )
        .into_response())
}

fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Result<HeaderValue, ServerError> {
    let secure = if secure { "; Secure" } else { "" };
    let cookie = format!(
        "{AUTH_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_secs}{secure}"
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ServerError::Internal(format!("invalid cookie header: {e}")))
}
