//! Text generation provider abstraction
//!
//! This module provides a unified interface for the remote LLM backends used to
//! write notes:
//! - Google Gemini API
//! - OpenAI API
//! - Anthropic API

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;

use crate::error::Error;

/// Unified text completion interface
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Send a single prompt and return the model's full response text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the provider name (e.g., "gemini", "openai", "anthropic")
    fn provider_name(&self) -> &'static str;

    /// Get the model identifier
    fn model_id(&self) -> &str;
}

/// Provider configuration stored in settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Google Gemini API
    Gemini {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        model: String,
    },
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        model: String,
    },
    /// Anthropic API
    Anthropic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
        model: String,
    },
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::Gemini {
            api_key: None,
            model: gemini::DEFAULT_MODEL.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Build a config for the named provider family with its default model.
    pub fn for_family(family: &str) -> Option<Self> {
        match family {
            "gemini" => Some(Self::Gemini {
                api_key: None,
                model: gemini::DEFAULT_MODEL.to_string(),
            }),
            "openai" => Some(Self::OpenAI {
                api_key: None,
                model: openai::DEFAULT_MODEL.to_string(),
            }),
            "anthropic" => Some(Self::Anthropic {
                api_key: None,
                model: anthropic::DEFAULT_MODEL.to_string(),
            }),
            _ => None,
        }
    }

    /// Get the provider type name
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini { .. } => "gemini",
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Anthropic { .. } => "anthropic",
        }
    }

    /// Get the model ID
    pub fn model_id(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } => model,
            ProviderConfig::OpenAI { model, .. } => model,
            ProviderConfig::Anthropic { model, .. } => model,
        }
    }

    /// Replace the model ID
    pub fn set_model(&mut self, new_model: impl Into<String>) {
        let new_model = new_model.into();
        match self {
            ProviderConfig::Gemini { model, .. }
            | ProviderConfig::OpenAI { model, .. }
            | ProviderConfig::Anthropic { model, .. } => *model = new_model,
        }
    }

    /// Environment variable consulted when no API key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderConfig::Gemini { .. } => "GEMINI_API_KEY",
            ProviderConfig::OpenAI { .. } => "OPENAI_API_KEY",
            ProviderConfig::Anthropic { .. } => "ANTHROPIC_API_KEY",
        }
    }

    /// Resolve the API key from settings, falling back to the environment.
    pub fn resolve_api_key(&self) -> crate::Result<String> {
        let configured = match self {
            ProviderConfig::Gemini { api_key, .. }
            | ProviderConfig::OpenAI { api_key, .. }
            | ProviderConfig::Anthropic { api_key, .. } => api_key.clone(),
        };

        configured
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                std::env::var(self.api_key_env())
                    .ok()
                    .filter(|k| !k.trim().is_empty())
            })
            .ok_or_else(|| {
                Error::config(format!(
                    "{} environment variable not set",
                    self.api_key_env()
                ))
            })
    }

    /// Construct the provider this config describes.
    pub fn build(&self, timeout: Duration) -> crate::Result<Arc<dyn TextProvider>> {
        let api_key = self.resolve_api_key()?;
        let provider: Arc<dyn TextProvider> = match self {
            ProviderConfig::Gemini { model, .. } => {
                Arc::new(GeminiProvider::new(&api_key, model, timeout)?)
            }
            ProviderConfig::OpenAI { model, .. } => {
                Arc::new(OpenAIProvider::new(&api_key, model, timeout)?)
            }
            ProviderConfig::Anthropic { model, .. } => {
                Arc::new(AnthropicProvider::new(&api_key, model, timeout)?)
            }
        };

        tracing::info!(
            provider = provider.provider_name(),
            model = provider.model_id(),
            "Text provider ready"
        );
        Ok(provider)
    }
}

/// Build a reqwest client with the configured request timeout.
pub(crate) fn http_client(timeout: Duration) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}
