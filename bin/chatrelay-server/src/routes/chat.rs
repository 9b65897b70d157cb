//! Completion relay routes.
//!
//! `POST /chat-completion` (JSON body) and `GET /chat-completion` (query
//! string) stream `data: {"content": …}` records followed by `data: [DONE]`.
//! When the request names a chat, the newest user message is stored before
//! the upstream is contacted; if that write fails the upstream is never
//! called.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header::HeaderName;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use chatrelay_core::relay::{content_relay, EventStream};
use chatrelay_core::{ChatMessage, CompletionRequest, Role};
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::entities::{now_millis, AppendOutcome, ChatStore, NewMessage};
use crate::error::{PlainTextError, ServerError};
use crate::middleware::AuthUser;
use crate::schemas::chat::{ChatCompletionQuery, ChatCompletionRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(post_chat_completion, get_chat_completion),
    components(schemas(ChatCompletionRequest))
)]
pub struct ChatApi;

/// Register chat-completion routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/chat-completion",
        post(post_chat_completion).get(get_chat_completion),
    )
}

#[utoipa::path(
    post,
    path = "/chat-completion",
    tag = "chat",
    request_body = ChatCompletionRequest,
    responses(
        (status = 200, description = "Event stream of content records", content_type = "text/event-stream", body = String),
        (status = 400, description = "`messages` missing or malformed"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 404, description = "`chatId` belongs to another user"),
        (status = 500, description = "Persistence or upstream failure"),
    )
)]
pub async fn post_chat_completion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, PlainTextError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    relay_chat(&state, user, req).await
}

#[utoipa::path(
    get,
    path = "/chat-completion",
    tag = "chat",
    params(ChatCompletionQuery),
    responses(
        (status = 200, description = "Event stream of content records", content_type = "text/event-stream", body = String),
        (status = 400, description = "`messages` missing or malformed"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 500, description = "Persistence or upstream failure"),
    )
)]
pub async fn get_chat_completion(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<ChatCompletionQuery>, QueryRejection>,
) -> Result<Response, PlainTextError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    relay_chat(&state, user, query.try_into()?).await
}

async fn relay_chat(
    state: &AppState,
    user: AuthUser,
    req: ChatCompletionRequest,
) -> Result<Response, PlainTextError> {
    let messages = req
        .messages
        .ok_or_else(|| ServerError::BadRequest("messages is required".to_owned()))?;

    if let Some(chat_id) = req.chat_id.as_deref().filter(|id| !id.is_empty()) {
        persist_newest_user_message(state, user, chat_id, &messages).await?;
    }

    let settings = state
        .config
        .completion_settings()
        .with_model(req.model.as_deref());
    info!(
        user_id = user.user_id,
        model = %settings.model,
        messages = messages.len(),
        "relaying chat completion"
    );

    let deltas = state
        .completion
        .stream(CompletionRequest::new(messages, &settings))
        .await
        .map_err(ServerError::from)?;
    Ok(event_stream_response(content_relay(deltas)))
}

async fn persist_newest_user_message(
    state: &AppState,
    user: AuthUser,
    chat_id: &str,
    messages: &[ChatMessage],
) -> Result<(), ServerError> {
    let Some(newest) = messages.iter().rev().find(|m| m.is(Role::User)) else {
        return Ok(());
    };
    let message = NewMessage {
        id: Uuid::new_v4().to_string(),
        role: Role::User,
        content: newest.text(),
        created_at: now_millis(),
    };

    match state.store.append_message(user.user_id, chat_id, message).await? {
        AppendOutcome::Appended => Ok(()),
        AppendOutcome::ForeignChat => Err(ServerError::NotFound(format!("chat {chat_id} not found"))),
    }
}

/// Serve relay output as an event stream. Records are written as produced;
/// reverse proxies are asked not to buffer.
pub(crate) fn event_stream_response(events: EventStream) -> Response {
    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(events),
    )
        .into_response()
}
