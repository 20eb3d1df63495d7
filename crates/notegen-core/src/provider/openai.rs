//! OpenAI API provider
//!
//! Uses the Responses API via async-openai, streaming the output text.

use std::time::Duration;

use anyhow::{Context, Result};
use async_openai::{
    config::OpenAIConfig,
    types::responses::{
        CreateResponse, EasyInputContent, EasyInputMessage, InputItem, InputParam, MessageType,
        ResponseStreamEvent, Role,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::debug;

use super::TextProvider;

/// Model used when settings do not name one
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI API provider using the Responses API
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the given API key and model
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> crate::Result<Self> {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Ok(Self {
            client: Client::with_config(config).with_http_client(super::http_client(timeout)?),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl TextProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CreateResponse {
            model: Some(self.model.clone()),
            input: InputParam::Items(vec![InputItem::EasyMessage(EasyInputMessage {
                r#type: MessageType::Message,
                role: Role::User,
                content: EasyInputContent::Text(prompt.to_string()),
            })]),
            stream: Some(true),
            ..Default::default()
        };

        let mut stream = self
            .client
            .responses()
            .create_stream(request)
            .await
            .context("Failed to create response stream")?;

        let mut text_content = String::new();
        let mut completed = false;

        while let Some(event_result) = stream.next().await {
            let event = event_result.context("Stream error")?;

            match event {
                ResponseStreamEvent::ResponseOutputTextDelta(delta) => {
                    text_content.push_str(&delta.delta);
                }

                ResponseStreamEvent::ResponseCompleted(_) => {
                    debug!("Response completed");
                    completed = true;
                }

                ResponseStreamEvent::ResponseFailed(failed) => {
                    return Err(anyhow::anyhow!(
                        "Response failed: {:?}",
                        failed.response.error
                    ));
                }

                ResponseStreamEvent::ResponseError(err) => {
                    return Err(anyhow::anyhow!("OpenAI error: {}", err.message));
                }

                _ => {
                    // Other events we don't need to handle
                }
            }
        }

        if !completed {
            return Err(anyhow::anyhow!("OpenAI stream ended before completion"));
        }
        if text_content.trim().is_empty() {
            return Err(anyhow::anyhow!("OpenAI returned an empty response"));
        }

        Ok(text_content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
