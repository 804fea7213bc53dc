//! OpenAI-compatible chat completions client (Groq, OpenAI, LM Studio, ...).
//!
//! Uses POST {base}/chat/completions with a bearer key; non-streaming only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::llm::{error_for_status, ChatMessage, ChatOptions, LlmBackend, LlmError};

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Client for an OpenAI-compatible completion API.
#[derive(Clone)]
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(base_url: Option<String>, api_key: String, timeout: Duration) -> Result<Self, LlmError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            api_key,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmBackend for OpenAiCompatClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        options: ChatOptions,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(error_for_status(res).await);
        }
        let data: OpenAiChatResponse = res.json().await?;
        first_choice_content(data)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

fn first_choice_content(data: OpenAiChatResponse) -> Result<String, LlmError> {
    data.choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyCompletion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice() {
        let data: OpenAiChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"}},
                {"index":1,"message":{"role":"assistant","content":"ignored"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_content(data).unwrap(), "Hello!");
    }

    #[test]
    fn empty_choices_are_an_error() {
        for raw in [
            r#"{"choices":[]}"#,
            r#"{}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":"  "}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        ] {
            let data: OpenAiChatResponse = serde_json::from_str(raw).unwrap();
            assert!(matches!(first_choice_content(data), Err(LlmError::EmptyCompletion)));
        }
    }

    #[test]
    fn default_base_url_is_groq() {
        let c = OpenAiCompatClient::new(None, "k".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(c.base_url(), "https://api.groq.com/openai/v1");
    }
}
