use chatrelay_core::ChatMessage;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::error::ServerError;

/// Body of `POST /chat-completion`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatCompletionRequest {
    /// Conversation so far, `[{role, content}]`, relayed as received. Required.
    #[schema(value_type = Option<Vec<Object>>)]
    pub messages: Option<Vec<ChatMessage>>,
    /// Overrides the configured default model.
    pub model: Option<String>,
    /// When set, the newest user message is stored in this chat first.
    pub chat_id: Option<String>,
}

/// Query of `GET /chat-completion`; `messages` is URL-encoded JSON.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ChatCompletionQuery {
    pub messages: Option<String>,
    pub model: Option<String>,
    pub chat_id: Option<String>,
}

impl TryFrom<ChatCompletionQuery> for ChatCompletionRequest {
    type Error = ServerError;

    fn try_from(q: ChatCompletionQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            messages: parse_messages(q.messages.as_deref())?,
            model: q.model,
            chat_id: q.chat_id,
        })
    }
}

/// Body of `POST /title`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TitleRequest {
    /// Exactly two messages: the first user turn and the first reply.
    #[schema(value_type = Option<Vec<Object>>)]
    pub messages: Option<Vec<ChatMessage>>,
    pub model: Option<String>,
}

/// Query of `GET /title`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TitleQuery {
    pub messages: Option<String>,
    pub model: Option<String>,
}

impl TryFrom<TitleQuery> for TitleRequest {
    type Error = ServerError;

    fn try_from(q: TitleQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            messages: parse_messages(q.messages.as_deref())?,
            model: q.model,
        })
    }
}

fn parse_messages(raw: Option<&str>) -> Result<Option<Vec<ChatMessage>>, ServerError> {
    raw.map(|json| {
        serde_json::from_str(json)
            .map_err(|e| ServerError::BadRequest(format!("messages is not a valid message list: {e}")))
    })
    .transpose()
}
