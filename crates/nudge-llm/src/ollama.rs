//! HTTP client for an Ollama-compatible `/api/generate` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use nudge_core::config::LlmConfig;

use crate::completion::{CompletionRequest, CompletionService};
use crate::error::{LlmError, Result};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(tags
            .models
            .into_iter()
            .map(|m| m.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    async fn resolve_model(&self) -> Result<String> {
        if !self.model.is_empty() {
            return Ok(self.model.clone());
        }
        match self.list_models().await {
            Ok(models) => models.into_iter().next().ok_or(LlmError::NoModel),
            Err(e) => {
                warn!(error = %e, "Could not list models");
                Err(LlmError::NoModel)
            }
        }
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let model = self.resolve_model().await?;
        let images = request
            .image
            .as_deref()
            .map(|bytes| vec![base64::engine::general_purpose::STANDARD.encode(bytes)])
            .unwrap_or_default();
        let body = GenerateRequest {
            model: &model,
            prompt: &request.prompt,
            stream: false,
            images,
        };

        debug!(model = %model, prompt_chars = request.prompt.len(), "Sending completion");
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(parsed.response.trim().to_string())
    }
}
