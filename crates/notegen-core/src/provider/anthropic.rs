//! Anthropic API provider
//!
//! Uses reqwest for streaming message completions via SSE. Long note documents
//! take a while to generate, so the response is streamed and accumulated rather
//! than waiting on a single body.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TextProvider;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model used when settings do not name one
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Upper bound on generated tokens per step
const MAX_TOKENS: u32 = 16384;

/// Anthropic API provider
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the given API key and model
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: Some(true),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key).context("Invalid API key")?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .headers(headers)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error: AnthropicError = response
                .json()
                .await
                .with_context(|| format!("Anthropic API error ({})", status))?;
            return Err(anyhow::anyhow!(
                "Anthropic API error: {}",
                error.error.message
            ));
        }

        // Process SSE stream
        let mut stream = response.bytes_stream();
        let mut accumulator = SseAccumulator::default();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.context("Stream error")?;
            accumulator.push(&chunk)?;
        }

        let text = accumulator.finish()?;
        debug!(model = %self.model, chars = text.len(), "Anthropic completion received");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Accumulates text deltas from a stream of SSE bytes.
///
/// Network chunks can end inside a multi-byte character, so bytes are
/// buffered and only complete events are decoded.
#[derive(Default)]
struct SseAccumulator {
    buffer: Vec<u8>,
    text: String,
    stop_reason: Option<String>,
    finished: bool,
}

impl SseAccumulator {
    /// Feed more stream data, processing every complete event.
    fn push(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);

        while let Some(event_end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..event_end + 2).collect();
            let event_data = String::from_utf8_lossy(&event[..event_end]);

            for line in event_data.lines() {
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
                    continue;
                };

                match event {
                    StreamEvent::ContentBlockDelta {
                        delta: ContentBlockDelta::TextDelta { text },
                    } => self.text.push_str(&text),
                    StreamEvent::MessageDelta { delta } => {
                        if let Some(reason) = delta.stop_reason {
                            self.stop_reason = Some(reason);
                        }
                    }
                    StreamEvent::MessageStop => {
                        self.finished = true;
                    }
                    StreamEvent::Error { error } => {
                        return Err(anyhow::anyhow!("Anthropic stream error: {}", error.message));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Return the accumulated text once the message is complete.
    fn finish(self) -> Result<String> {
        if !self.finished {
            return Err(anyhow::anyhow!("Anthropic stream ended before message_stop"));
        }
        if self.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!("Anthropic response truncated at max_tokens");
        }
        if self.text.trim().is_empty() {
            return Err(anyhow::anyhow!("Anthropic returned an empty response"));
        }
        Ok(self.text)
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: String,
}

// Stream event types
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)] // Fields required for deserialization but not all are read
enum StreamEvent {
    MessageStart {
        message: serde_json::Value,
    },
    ContentBlockStart {
        index: usize,
        content_block: serde_json::Value,
    },
    ContentBlockDelta {
        delta: ContentBlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDeltaBody,
    },
    MessageStop,
    Ping,
    Error {
        error: AnthropicErrorDetail,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(dead_code)]
enum ContentBlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    stop_reason: Option<String>,
}
