//! Title synthesis routes: cumulative `data: {"title": …}` records.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::relay::title_relay;
use chatrelay_core::title::{should_generate_title, title_request, TITLE_TRIGGER_LEN};
use tracing::info;
use utoipa::OpenApi;

use crate::error::{PlainTextError, ServerError};
use crate::routes::chat::event_stream_response;
use crate::schemas::chat::{TitleQuery, TitleRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(post_title, get_title), components(schemas(TitleRequest)))]
pub struct TitleApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/title", post(post_title).get(get_title))
}

#[utoipa::path(
    post,
    path = "/title",
    tag = "chat",
    request_body = TitleRequest,
    responses(
        (status = 200, description = "Event stream of cumulative title records", content_type = "text/event-stream", body = String),
        (status = 400, description = "Not exactly two messages"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 500, description = "Upstream failure"),
    )
)]
pub async fn post_title(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TitleRequest>, JsonRejection>,
) -> Result<Response, PlainTextError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    relay_title(&state, req).await
}

#[utoipa::path(
    get,
    path = "/title",
    tag = "chat",
    params(TitleQuery),
    responses(
        (status = 200, description = "Event stream of cumulative title records", content_type = "text/event-stream", body = String),
        (status = 400, description = "Not exactly two messages"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 500, description = "Upstream failure"),
    )
)]
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TitleQuery>, QueryRejection>,
) -> Result<Response, PlainTextError> {
    let Query(query) = query.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    relay_title(&state, query.try_into()?).await
}

async fn relay_title(state: &AppState, req: TitleRequest) -> Result<Response, PlainTextError> {
    let messages = req
        .messages
        .ok_or_else(|| ServerError::BadRequest("messages is required".to_owned()))?;
    if !should_generate_title(&messages) {
        return Err(ServerError::BadRequest(format!(
            "a title needs exactly {TITLE_TRIGGER_LEN} messages, got {}",
            messages.len()
        ))
        .into());
    }

    let settings = state
        .config
        .completion_settings()
        .with_model(req.model.as_deref());
    info!(model = %settings.model, "synthesizing chat title");

    let deltas = state
        .completion
        .stream(title_request(&messages, &settings))
        .await
        .map_err(ServerError::from)?;
    Ok(event_stream_response(title_relay(deltas)))
}
