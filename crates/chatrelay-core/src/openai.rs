//! OpenAI-compatible streaming client.
//!
//! Talks to any endpoint that implements `POST {base}/chat/completions` with
//! `stream: true` and answers with `data: {chunk}` records terminated by
//! `data: [DONE]`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{ChatMessage, CompletionClient, CompletionRequest, DeltaStream};
use crate::error::CompletionError;
use crate::sse::{SseDecoder, SseRecord};

/// Longest slice of an upstream error body kept in the error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Streaming client for an OpenAI-compatible completion API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    /// Build a client.
    ///
    /// Only the connect phase is bounded by `connect_timeout`; a stream that
    /// stalls after the response headers arrived is waited on indefinitely.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct WireChunk {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireChoice {
    #[serde(default)]
    delta: WireDelta,
}

#[derive(Default, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn stream(&self, request: CompletionRequest) -> Result<DeltaStream, CompletionError> {
        let url = self.endpoint();
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        debug!(%url, model = %request.model, messages = request.messages.len(), "opening completion stream");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            error!(status = status.as_u16(), body = %message, "upstream rejected completion request");
            return Err(CompletionError::Api { status: status.as_u16(), message });
        }

        Ok(decode_deltas(response.bytes_stream().boxed()))
    }
}

struct DecodeState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    finished: bool,
}

/// Turn the upstream byte stream into a delta stream.
///
/// Ends at `[DONE]` or end of body; the first error is yielded once and then
/// the stream ends.
fn decode_deltas(body: BoxStream<'static, reqwest::Result<Bytes>>) -> DeltaStream {
    let state = DecodeState {
        body,
        decoder: SseDecoder::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        if st.finished {
            return None;
        }
        loop {
            match st.decoder.next_record() {
                Some(SseRecord::Done) => {
                    st.finished = true;
                    return None;
                }
                Some(SseRecord::Data(data)) => {
                    let item = parse_delta(&data);
                    st.finished = item.is_err();
                    return Some((item, st));
                }
                None => {}
            }

            match st.body.next().await {
                Some(Ok(chunk)) => st.decoder.push(&chunk),
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(CompletionError::Http(e)), st));
                }
                None => {
                    st.finished = true;
                    return match st.decoder.finish() {
                        Some(SseRecord::Data(data)) => Some((parse_delta(&data), st)),
                        _ => None,
                    };
                }
            }
        }
    })
    .boxed()
}

fn parse_delta(data: &str) -> Result<String, CompletionError> {
    let chunk: WireChunk =
        serde_json::from_str(data).map_err(|e| CompletionError::Decode(e.to_string()))?;

    if let Some(err) = chunk.error {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_owned)
            .unwrap_or_else(|| err.to_string());
        return Err(CompletionError::Api { status: 200, message });
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
