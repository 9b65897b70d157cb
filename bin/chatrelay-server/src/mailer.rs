//! Verification-code delivery.
//!
//! [`CodeMailer`] is the seam an SMTP transport plugs into. The built-in
//! [`LogMailer`] writes the code to the log, which is what local setups and
//! tests want.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait CodeMailer: Send + Sync + 'static {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailerError>;
}

/// Logs codes instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer {
    sender: Option<String>,
}

impl LogMailer {
    pub fn new(sender: Option<String>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl CodeMailer for LogMailer {
    async fn send_code(&self, email: &str, code: &str) -> Result<(), MailerError> {
        info!(
            to = %email,
            from = self.sender.as_deref().unwrap_or("<unset>"),
            "verification code issued"
        );
        debug!(to = %email, %code, "verification code");
        Ok(())
    }
}
