//! Title synthesis: ask the model for a short label for a fresh conversation.
//!
//! The streaming side is [`crate::relay::title_relay`]; this module owns the
//! request shape and the trigger policy.

use crate::completion::{ChatMessage, CompletionRequest, CompletionSettings};

/// Instruction prepended to the conversation. Asks for a title of at most 15
/// characters, returned as bare text.
pub const TITLE_INSTRUCTION: &str = "请为这个对话生成一个简短的标题（不超过15个字），直接返回标题文本，不要加任何其他内容。根据对话的主要内容和主题来总结。";

/// Output budget for a title.
pub const TITLE_MAX_TOKENS: u32 = 50;

/// Number of messages in a conversation that triggers titling: the first
/// user turn plus the first assistant reply.
pub const TITLE_TRIGGER_LEN: usize = 2;

/// Titles are generated exactly once, after the first exchange.
pub fn should_generate_title(messages: &[ChatMessage]) -> bool {
    messages.len() == TITLE_TRIGGER_LEN
}

/// Build the completion request for a title.
pub fn title_request(messages: &[ChatMessage], settings: &CompletionSettings) -> CompletionRequest {
    let mut prompt = Vec::with_capacity(messages.len() + 1);
    prompt.push(ChatMessage::system(TITLE_INSTRUCTION));
    prompt.extend_from_slice(messages);

    let mut request = CompletionRequest::new(prompt, settings);
    request.max_tokens = TITLE_MAX_TOKENS;
    request
}
