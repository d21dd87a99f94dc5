use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use super::types::*;

pub(crate) const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub(crate) struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Ollama HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn chat(&self, request: &ChatRequest<'_>) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = request.model, json = request.format.is_some(), "Ollama chat request");

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Ollama unreachable at {}", self.base_url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ollama API error ({}): {}", status, error_text));
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        if let Some(error) = body.error {
            return Err(anyhow!("Ollama error: {error}"));
        }
        Ok(body)
    }
}
