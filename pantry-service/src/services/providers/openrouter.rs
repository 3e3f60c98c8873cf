//! OpenRouter (OpenAI-compatible) chat-completion client.

use super::{ChatModel, ChatRequest, ModelError};
use crate::config::ModelConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use service_core::observability::trace_headers;
use std::time::Duration;

pub struct OpenRouterChatModel {
    client: Client,
    endpoint: String,
    api_key: Secret<String>,
}

impl OpenRouterChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenRouterChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, ModelError> {
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(trace_headers())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Chat model returned an error");
            return Err(ModelError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ModelError::Transport(format!("model response is not JSON: {}", e)))
    }
}
