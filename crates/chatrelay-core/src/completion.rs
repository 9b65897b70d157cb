//! The completion capability: "submit a role-tagged message list and a model
//! id, receive an incremental sequence of text deltas".

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString};

use crate::error::CompletionError;

/// Author of a stored message.
///
/// Only persisted history is held to these three roles; conversations handed
/// to the model use [`ChatMessage`], which carries whatever role the client
/// sent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry of the conversation handed to the model.
///
/// Relayed as received: `role` is not checked against [`Role`], `content` may
/// be a string or structured parts, and unknown fields (`name`, ...) are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User.as_ref(), content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant.as_ref(), content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System.as_ref(), content)
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role.as_ref()
    }

    /// Content as storable text: plain strings as-is, structured content as
    /// compact JSON.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Model selection and sampling parameters for one exchange.
///
/// Built per request (request overrides on top of configured defaults) and
/// passed explicitly; there is no ambient "current model".
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionSettings {
    /// Same settings with a different model, when the caller picked one.
    pub fn with_model(mut self, model: Option<&str>) -> Self {
        if let Some(m) = model.map(str::trim).filter(|m| !m.is_empty()) {
            self.model = m.to_owned();
        }
        self
    }
}

/// A fully specified streaming completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, settings: &CompletionSettings) -> Self {
        Self {
            model: settings.model.clone(),
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Incremental model output. Items may be empty strings; consumers decide
/// whether to skip them.
pub type DeltaStream = BoxStream<'static, Result<String, CompletionError>>;

/// A hosted completion API that can stream its output.
#[async_trait]
pub trait CompletionClient: Send + Sync + 'static {
    /// Open one streaming completion. Errors returned here happen before any
    /// delta was produced; later failures arrive as `Err` items on the stream.
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError>;
}

// ── Tests ──────────────────────────────────────────────────────────────────────
