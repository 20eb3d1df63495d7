//! Google Gemini API provider
//!
//! Uses reqwest against the `generateContent` REST endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::TextProvider;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Model used when settings do not name one
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini API provider
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given API key and model
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: super::http_client(timeout)?,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.model)
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.api_key).context("Invalid API key")?,
        );

        let response = self
            .client
            .post(self.endpoint())
            .headers(headers)
            .json(&request)
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini API error ({}): {}",
                status,
                error_message(&body)
            ));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let text = extract_text(body)?;
        debug!(model = %self.model, chars = text.len(), "Gemini completion received");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Pull the first candidate's text out of a response, or explain why there is none.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(anyhow::anyhow!("Prompt blocked by Gemini: {}", reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .context("Gemini returned no candidates")?;

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "Gemini returned an empty candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ));
    }

    Ok(text)
}

/// Best-effort extraction of the API's error message from a response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<GeminiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
