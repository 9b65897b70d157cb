//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use chatrelay_core::auth::TokenSigner;
use chatrelay_core::verification::CodeStore;
use chatrelay_core::CompletionClient;

use crate::config::Config;
use crate::entities::SqlStore;
use crate::mailer::CodeMailer;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Users, chats and messages.
    pub store: Arc<SqlStore>,
    /// Streaming completion upstream.
    pub completion: Arc<dyn CompletionClient>,
    /// Outstanding email verification codes.
    pub codes: Arc<dyn CodeStore>,
    pub mailer: Arc<dyn CodeMailer>,
    /// Issues and verifies bearer credentials.
    pub tokens: TokenSigner,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("bind_address", &self.config.bind_address)
            .field("store", &self.store)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
