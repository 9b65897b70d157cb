use thiserror::Error;

/// Failures of the Request Gate and the account primitives.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was presented at all.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Malformed token, bad signature, or expired.
    #[error("invalid or expired credential")]
    InvalidOrExpiredCredential,

    /// The signing key could not be used (empty secret).
    #[error("signing key rejected: {0}")]
    SigningKey(String),

    /// The token lifetime is not positive or pushes `exp` past the
    /// representable date range.
    #[error("token lifetime out of range")]
    TokenLifetime,

    /// Password hashing failed (salt generation or parameter error).
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Errors raised by a [`crate::CompletionClient`].
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Transport-level failure talking to the upstream (connect, read, TLS).
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream answered with a non-success status.
    #[error("upstream API error {status}: {message}")]
    Api { status: u16, message: String },

    /// An upstream record could not be decoded.
    #[error("malformed upstream record: {0}")]
    Decode(String),
}

/// Errors surfaced on the relay output stream.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The upstream delta sequence failed after streaming began.
    #[error("upstream completion failed: {0}")]
    Upstream(#[from] CompletionError),

    /// An event record could not be serialised.
    #[error("failed to encode event record: {0}")]
    Encode(#[from] axum::Error),
}
