pub mod chat;
pub mod user;

pub use chat::{AppendOutcome, ChatRecord, ChatWithMessages, MessageRecord, NewChat, NewMessage, SyncOutcome};
pub use user::UserRecord;
