//! chatrelay-core – protocol and domain logic shared by the chatrelay server.
//!
//! Nothing in this crate knows about HTTP routing or SQL; it provides:
//!
//! - [`sse`]: an incremental decoder for `data: …` event records.
//! - [`completion`]: the completion capability trait and its request types.
//! - [`openai`]: an OpenAI-compatible streaming client implementing it.
//! - [`relay`]: the delta → `Sse` event pipelines (content and title).
//! - [`title`]: the title-synthesis request builder and trigger policy.
//! - [`auth`]: HS256 JWT bearer credentials and password hashing.
//! - [`verification`]: one-time email verification codes with a TTL.
//! - [`email`]: email shape and provider allow-list checks.

pub mod auth;
pub mod completion;
pub mod email;
pub mod error;
pub mod openai;
pub mod relay;
pub mod sse;
pub mod title;
pub mod verification;

pub use completion::{ChatMessage, CompletionClient, CompletionRequest, CompletionSettings, DeltaStream, Role};
pub use error::{AuthError, CompletionError, RelayError};
