//! Chat completion backends used by the fallback responder.
//!
//! Two backends: a hosted OpenAI-compatible API (Groq by default) and a local Ollama instance.

mod ollama;
mod openai_compat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ollama::OllamaClient;
pub use openai_compat::OpenAiCompatClient;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion quota exceeded: {0}")]
    RateLimited(String),
    #[error("completion timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("completion returned no content")]
    EmptyCompletion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            temperature: 0.7,
        }
    }
}

/// A chat completion backend.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Backend name for logs (e.g. "openai", "ollama").
    fn name(&self) -> &str;

    /// Non-streaming chat completion; returns the assistant text.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError>;
}

/// Map a non-success HTTP response to an error, keeping the body for logs.
pub(crate) async fn error_for_status(res: reqwest::Response) -> LlmError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::RateLimited(format!("{} {}", status, body))
    } else {
        LlmError::Api(format!("{} {}", status, body))
    }
}
