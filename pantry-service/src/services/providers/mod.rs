//! Chat-completion model abstraction.

pub mod openrouter;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use openrouter::OpenRouterChatModel;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("model transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// OpenAI-compatible `chat/completions` request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one completion request and return the raw response document.
    async fn complete(&self, request: &ChatRequest) -> Result<Value, ModelError>;
}
