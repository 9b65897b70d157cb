//! Persistence layer.
//!
//! [`UserStore`] and [`ChatStore`] define what handlers need from storage;
//! [`SqlStore`] implements both on SQLite. To move to another database,
//! implement the traits for a new type and change the concrete type in
//! [`crate::state::AppState`].
//!
//! Trait methods use `impl Future` in their signatures so no `async-trait` is
//! needed for these.

pub mod chat;
pub mod dao;
pub mod user;

pub use chat::ChatStore;
pub use dao::{AppendOutcome, ChatRecord, ChatWithMessages, MessageRecord, NewChat, NewMessage, SyncOutcome, UserRecord};
pub use user::UserStore;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::OnceCell;
use tracing::info;

/// SQLite-backed store. The pool is opened, and migrations run, on first use.
#[derive(Debug)]
pub struct SqlStore {
    url: String,
    pool: OnceCell<SqlitePool>,
}

impl SqlStore {
    /// `url` is a sqlx SQLite URL, e.g. `"sqlite://chatrelay.db"` or
    /// `"sqlite::memory:"` for tests. Nothing is opened yet.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    /// The shared pool, connecting on the first call. Concurrent first
    /// callers wait on a single initialisation.
    pub async fn pool(&self) -> Result<&SqlitePool, sqlx::Error> {
        self.pool.get_or_try_init(|| connect(&self.url)).await
    }
}

async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database; keep exactly one
    // alive for the lifetime of the pool.
    let in_memory = url.contains(":memory:");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(8)
    };
    let pool = pool_options.connect_with(options).await?;

    // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!(database_url = %url, "database ready");
    Ok(pool)
}

/// `true` when `e` is a UNIQUE / PRIMARY KEY violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Current time in epoch milliseconds, the unit of the chat tables.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
