use std::future::Future;

use chrono::{DateTime, Utc};

use crate::entities::{is_unique_violation, SqlStore, UserRecord};

pub trait UserStore: Send + Sync + 'static {
    /// Insert a user. `Ok(None)` when the email is already registered.
    fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;

    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
}

impl UserStore for SqlStore {
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error> {
        let pool = self.pool().await?;
        let created_at = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(created_at.to_rfc3339())
        .execute(pool)
        .await;

        match inserted {
            Ok(result) => Ok(Some(UserRecord {
                id: result.last_insert_rowid(),
                email: email.to_owned(),
                password_hash: password_hash.to_owned(),
                created_at,
            })),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let pool = self.pool().await?;
        let row: Option<(i64, String, String, String)> = sqlx::query_as(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(id, email, password_hash, created_at)| UserRecord {
            id,
            email,
            password_hash,
            created_at: created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|e| {
                    tracing::warn!(raw = %created_at, error = %e, "failed to parse user created_at; using now");
                    Utc::now()
                }),
        }))
    }
}
