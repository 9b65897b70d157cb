use chatrelay_core::Role;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{ChatWithMessages, MessageRecord, NewChat, NewMessage};

/// One chat as the client stores it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    #[serde(default)]
    pub messages: Vec<MessagePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: String,
    /// `user`, `assistant` or `system`.
    #[schema(value_type = String)]
    pub role: Role,
    pub content: String,
    /// Epoch milliseconds. Accepted on sync, never returned.
    #[serde(default, skip_serializing)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatListResponse {
    pub chats: Vec<ChatPayload>,
}

/// Body of `POST /chats`: the caller's complete chat history.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SyncChatsRequest {
    pub chats: Vec<ChatPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncChatsResponse {
    pub success: bool,
    pub chats: usize,
    pub messages: usize,
}

impl From<ChatWithMessages> for ChatPayload {
    fn from(c: ChatWithMessages) -> Self {
        Self {
            id: c.chat.id,
            title: c.chat.title,
            created_at: c.chat.created_at,
            messages: c.messages.into_iter().map(MessagePayload::from).collect(),
        }
    }
}

impl From<MessageRecord> for MessagePayload {
    fn from(m: MessageRecord) -> Self {
        Self {
            id: m.id,
            role: m.role,
            content: m.content,
            created_at: None,
        }
    }
}

impl ChatPayload {
    /// Rows to write for this chat. Messages without a timestamp get
    /// `now + index`, so a replayed sync keeps its order.
    pub fn into_new_chat(self, now: i64) -> NewChat {
        let messages = self
            .messages
            .into_iter()
            .enumerate()
            .map(|(index, m)| NewMessage {
                id: m.id,
                role: m.role,
                content: m.content,
                created_at: m.created_at.unwrap_or(now + index as i64),
            })
            .collect();
        NewChat {
            id: self.id,
            title: self.title,
            created_at: self.created_at,
            messages,
        }
    }
}
