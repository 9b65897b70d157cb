use std::collections::HashMap;
use std::future::Future;

use chatrelay_core::Role;
use sqlx::{Sqlite, Transaction};

use crate::entities::{
    is_unique_violation, AppendOutcome, ChatRecord, ChatWithMessages, MessageRecord, NewChat,
    NewMessage, SqlStore, SyncOutcome,
};

pub trait ChatStore: Send + Sync + 'static {
    /// Create `chat_id` for `user_id` if it does not exist yet (empty title,
    /// `created_at` = the message's timestamp), then append `message`. Both
    /// writes commit together.
    fn append_message(
        &self,
        user_id: i64,
        chat_id: &str,
        message: NewMessage,
    ) -> impl Future<Output = Result<AppendOutcome, sqlx::Error>> + Send;

    /// All chats of `user_id`, newest first, each with messages oldest first.
    fn list_chats(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ChatWithMessages>, sqlx::Error>> + Send;

    /// Replace every chat of `user_id` with `chats` in one transaction.
    fn replace_chats(
        &self,
        user_id: i64,
        chats: Vec<NewChat>,
    ) -> impl Future<Output = Result<SyncOutcome, sqlx::Error>> + Send;

    /// Delete one chat and its messages. `false` if `user_id` has no such chat.
    fn delete_chat(
        &self,
        user_id: i64,
        chat_id: &str,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl ChatStore for SqlStore {
    async fn append_message(
        &self,
        user_id: i64,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<AppendOutcome, sqlx::Error> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at) VALUES (?1, ?2, '', ?3) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        if chat_owner(&mut tx, chat_id).await? != Some(user_id) {
            tx.rollback().await?;
            return Ok(AppendOutcome::ForeignChat);
        }

        insert_message(&mut tx, chat_id, &message).await?;
        tx.commit().await?;
        Ok(AppendOutcome::Appended)
    }

    async fn list_chats(&self, user_id: i64) -> Result<Vec<ChatWithMessages>, sqlx::Error> {
        let pool = self.pool().await?;
        let chats: Vec<(String, i64, String, i64)> = sqlx::query_as(
            "SELECT id, user_id, title, created_at FROM chats \
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT m.id, m.chat_id, m.role, m.content, m.created_at \
             FROM messages m JOIN chats c ON c.id = m.chat_id \
             WHERE c.user_id = ?1 ORDER BY m.created_at ASC, m.rowid ASC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        let mut by_chat: HashMap<String, Vec<MessageRecord>> = HashMap::new();
        for (id, chat_id, role, content, created_at) in rows {
            let role = role.parse::<Role>().unwrap_or_else(|_| {
                tracing::warn!(message_id = %id, raw = %role, "unknown message role; treating as user");
                Role::User
            });
            by_chat.entry(chat_id.clone()).or_default().push(MessageRecord {
                id,
                chat_id,
                role,
                content,
                created_at,
            });
        }

        Ok(chats
            .into_iter()
            .map(|(id, user_id, title, created_at)| {
                let messages = by_chat.remove(&id).unwrap_or_default();
                ChatWithMessages {
                    chat: ChatRecord { id, user_id, title, created_at },
                    messages,
                }
            })
            .collect())
    }

    async fn replace_chats(
        &self,
        user_id: i64,
        chats: Vec<NewChat>,
    ) -> Result<SyncOutcome, sqlx::Error> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM chats WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let mut message_count = 0;
        for chat in &chats {
            let inserted = sqlx::query(
                "INSERT INTO chats (id, user_id, title, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&chat.id)
            .bind(user_id)
            .bind(&chat.title)
            .bind(chat.created_at)
            .execute(&mut *tx)
            .await;
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    tx.rollback().await?;
                    return Ok(SyncOutcome::Conflict(format!("chat id {} is already in use", chat.id)));
                }
                Err(e) => return Err(e),
            }

            for message in &chat.messages {
                match insert_message(&mut tx, &chat.id, message).await {
                    Ok(()) => {}
                    Err(e) if is_unique_violation(&e) => {
                        tx.rollback().await?;
                        return Ok(SyncOutcome::Conflict(format!(
                            "message id {} is already in use",
                            message.id
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
            message_count += chat.messages.len();
        }

        tx.commit().await?;
        Ok(SyncOutcome::Replaced {
            chats: chats.len(),
            messages: message_count,
        })
    }

    async fn delete_chat(&self, user_id: i64, chat_id: &str) -> Result<bool, sqlx::Error> {
        let pool = self.pool().await?;
        let result = sqlx::query("DELETE FROM chats WHERE id = ?1 AND user_id = ?2")
            .bind(chat_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

async fn chat_owner(
    tx: &mut Transaction<'_, Sqlite>,
    chat_id: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM chats WHERE id = ?1")
        .bind(chat_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.map(|(owner,)| owner))
}

async fn insert_message(
    tx: &mut Transaction<'_, Sqlite>,
    chat_id: &str,
    message: &NewMessage,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO messages (id, chat_id, role, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&message.id)
    .bind(chat_id)
    .bind(message.role.as_ref())
    .bind(&message.content)
    .bind(message.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
