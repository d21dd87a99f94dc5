mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::traits::{ChatModel, Message, ResponseFormat};
use client::{OllamaClient, DEFAULT_OLLAMA_URL};
use types::*;

// =============================================================================
// Ollama Agent
// =============================================================================

/// Chat against a model served by a local Ollama daemon.
pub struct Ollama {
    model: String,
    base_url: String,
    temperature: f32,
    client: OllamaClient,
}

impl Ollama {
    pub fn new(model: impl Into<String>, base_url: Option<&str>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.unwrap_or(DEFAULT_OLLAMA_URL).to_string();
        let client = OllamaClient::new(&base_url, timeout)?;
        Ok(Self {
            model: model.into(),
            base_url,
            temperature: 0.0,
            client,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for Ollama {
    async fn chat(&self, messages: Vec<Message>, format: ResponseFormat) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: &messages,
            stream: false,
            format: match format {
                ResponseFormat::Json => Some("json"),
                ResponseFormat::Text => None,
            },
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self.client.chat(&request).await?;

        response
            .message
            .map(|m| m.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("Empty response from Ollama model {}", self.model))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
