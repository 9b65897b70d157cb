//! Chat history: list, bulk sync, delete.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Extension, Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::{now_millis, ChatStore, SyncOutcome};
use crate::error::ServerError;
use crate::middleware::AuthUser;
use crate::schemas::account::AckResponse;
use crate::schemas::history::{
    ChatListResponse, ChatPayload, MessagePayload, SyncChatsRequest, SyncChatsResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_chats, sync_chats, delete_chat),
    components(schemas(
        ChatListResponse,
        ChatPayload,
        MessagePayload,
        SyncChatsRequest,
        SyncChatsResponse
    ))
)]
pub struct ChatsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", get(list_chats).post(sync_chats))
        .route("/chats/{id}", delete(delete_chat))
}

#[utoipa::path(
    get,
    path = "/chats",
    tag = "chats",
    responses(
        (status = 200, description = "Chats newest first, messages oldest first", body = ChatListResponse),
        (status = 401, description = "Missing, invalid or expired credential"),
    )
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ChatListResponse>, ServerError> {
    let chats = state.store.list_chats(user.user_id).await?;
    Ok(Json(ChatListResponse {
        chats: chats.into_iter().map(ChatPayload::from).collect(),
    }))
}

/// Replace the caller's whole history with the payload, atomically.
#[utoipa::path(
    post,
    path = "/chats",
    tag = "chats",
    request_body = SyncChatsRequest,
    responses(
        (status = 200, description = "History replaced", body = SyncChatsResponse),
        (status = 400, description = "Malformed payload"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 409, description = "An id belongs to another user"),
    )
)]
pub async fn sync_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SyncChatsRequest>, JsonRejection>,
) -> Result<Json<SyncChatsResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if let Some(chat) = req.chats.iter().find(|c| c.id.trim().is_empty()) {
        return Err(ServerError::BadRequest(format!(
            "chat created at {} has an empty id",
            chat.created_at
        )));
    }

    let now = now_millis();
    let chats = req.chats.into_iter().map(|c| c.into_new_chat(now)).collect();
    match state.store.replace_chats(user.user_id, chats).await? {
        SyncOutcome::Replaced { chats, messages } => {
            info!(user_id = user.user_id, chats, messages, "chat history synced");
            Ok(Json(SyncChatsResponse {
                success: true,
                chats,
                messages,
            }))
        }
        SyncOutcome::Conflict(reason) => Err(ServerError::Conflict(reason)),
    }
}

#[utoipa::path(
    delete,
    path = "/chats/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat id")),
    responses(
        (status = 200, description = "Chat deleted", body = AckResponse),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 404, description = "No such chat for this user"),
    )
)]
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<AckResponse>, ServerError> {
    if !state.store.delete_chat(user.user_id, &id).await? {
        return Err(ServerError::NotFound(format!("chat {id} not found")));
    }
    Ok(Json(AckResponse::ok("chat deleted")))
}
