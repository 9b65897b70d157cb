use chatrelay_core::Role;

/// A row in the `chats` table. `created_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRecord {
    pub id: String,
    pub user_id: i64,
    pub title: String,
    pub created_at: i64,
}

/// A row in the `messages` table. `created_at` is epoch milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// A chat and its messages, oldest message first.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatWithMessages {
    pub chat: ChatRecord,
    pub messages: Vec<MessageRecord>,
}

/// A message about to be written.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

/// A chat about to be written by a bulk sync.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub id: String,
    pub title: String,
    pub created_at: i64,
    pub messages: Vec<NewMessage>,
}

/// Result of appending a message to a possibly new chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// The chat id exists and belongs to someone else; nothing was written.
    ForeignChat,
}

/// Result of replacing a user's chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Replaced { chats: usize, messages: usize },
    /// An id in the payload is already taken by another user's data; the
    /// transaction was rolled back.
    Conflict(String),
}
