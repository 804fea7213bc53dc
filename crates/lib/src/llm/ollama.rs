//! Ollama API client (http://127.0.0.1:11434 by default).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::llm::{error_for_status, ChatMessage, ChatOptions, LlmBackend, LlmError};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Client for the Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, LlmError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    /// POST /api/chat with stream: false.
    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            options: RequestOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            return Err(error_for_status(res).await);
        }
        let data: ChatResponse = res.json().await?;
        data.message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
}
