//! Generative fallback for messages that match no FAQ or course.
//!
//! Every failure mode (no backend, unreachable, quota, timeout, empty completion) degrades to a
//! static reply; callers always get a string.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, Config, FallbackBackend};
use crate::knowledge::KnowledgeSnapshot;
use crate::llm::{ChatMessage, ChatOptions, LlmBackend, LlmError, OllamaClient, OpenAiCompatClient};

/// Reply when the completion backend fails or times out.
pub const FALLBACK_REPLY: &str = "I'm here to help with course information and answer your questions about our educational programs. What would you like to know?";

/// Reply when no completion backend is configured.
pub const UNCONFIGURED_REPLY: &str = "I'm here to help with course information! Ask me about our Python, Java, React, or Data Science courses.";

const MAX_CONTEXT_COURSES: usize = 5;
const MAX_CONTEXT_FAQS: usize = 3;

const SYSTEM_INSTRUCTION: &str = "You are a helpful EdTech support assistant answering on WhatsApp. \
Be friendly, encouraging, and educational. Answer using only the course and FAQ context below; \
if the context does not cover the question, say so and suggest asking about our courses. \
Keep responses concise (under 200 words).";

/// Calls a completion backend with catalog context, bounded by a timeout.
#[derive(Clone)]
pub struct FallbackResponder {
    backend: Option<Arc<dyn LlmBackend>>,
    model: String,
    options: ChatOptions,
    timeout: Duration,
}

impl FallbackResponder {
    pub fn new(
        backend: Option<Arc<dyn LlmBackend>>,
        model: impl Into<String>,
        options: ChatOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            options,
            timeout,
        }
    }

    /// Build from config. The hosted backend needs an API key; without one the responder
    /// answers with [`UNCONFIGURED_REPLY`].
    pub fn from_config(config: &Config) -> Self {
        let fb = &config.fallback;
        let timeout = Duration::from_secs(fb.timeout_secs.max(1));
        let backend: Option<Arc<dyn LlmBackend>> = match fb.backend {
            FallbackBackend::Openai => match config::resolve_fallback_api_key(config) {
                Some(key) => match OpenAiCompatClient::new(fb.base_url.clone(), key, timeout) {
                    Ok(c) => Some(Arc::new(c)),
                    Err(e) => {
                        log::warn!("fallback: building completion client failed: {}", e);
                        None
                    }
                },
                None => {
                    log::warn!("fallback: GROQ_API_KEY not set; generative replies disabled");
                    None
                }
            },
            FallbackBackend::Ollama => match OllamaClient::new(fb.base_url.clone(), timeout) {
                Ok(c) => Some(Arc::new(c)),
                Err(e) => {
                    log::warn!("fallback: building ollama client failed: {}", e);
                    None
                }
            },
        };
        Self::new(
            backend,
            fb.model.clone(),
            ChatOptions {
                max_tokens: fb.max_tokens,
                temperature: fb.temperature,
            },
            timeout,
        )
    }

    /// Backend name, or "none".
    pub fn backend_name(&self) -> &str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("none")
    }

    /// Answer `text` generatively. Never fails.
    pub async fn respond(&self, text: &str, snapshot: &KnowledgeSnapshot) -> String {
        let Some(backend) = self.backend.as_ref() else {
            return UNCONFIGURED_REPLY.to_string();
        };
        match self.complete(backend.as_ref(), text, snapshot).await {
            Ok(reply) => {
                log::info!(
                    "fallback: {} reply generated ({} chars)",
                    backend.name(),
                    reply.len()
                );
                reply.trim().to_string()
            }
            Err(e) => {
                log::warn!("fallback: {} unavailable: {}", backend.name(), e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn complete(
        &self,
        backend: &dyn LlmBackend,
        text: &str,
        snapshot: &KnowledgeSnapshot,
    ) -> Result<String, LlmError> {
        let messages = vec![
            ChatMessage::system(build_system_prompt(snapshot)),
            ChatMessage::user(text),
        ];
        tokio::time::timeout(self.timeout, backend.chat(&self.model, messages, self.options))
            .await
            .map_err(|_| LlmError::Timeout(self.timeout))?
    }
}

/// System instruction plus a compact catalog context.
pub fn build_system_prompt(snapshot: &KnowledgeSnapshot) -> String {
    let courses: Vec<String> = snapshot
        .courses
        .iter()
        .take(MAX_CONTEXT_COURSES)
        .map(|c| {
            format!(
                "- {}: {} (${:.2}, {} weeks, Instructor: {})",
                c.title, c.description, c.price, c.duration_weeks, c.instructor
            )
        })
        .collect();
    let faqs: Vec<String> = snapshot
        .faqs
        .iter()
        .take(MAX_CONTEXT_FAQS)
        .map(|f| format!("Q: {}\nA: {}", f.question, f.answer))
        .collect();

    let mut prompt = String::from(SYSTEM_INSTRUCTION);
    if !courses.is_empty() {
        prompt.push_str("\n\nAvailable Courses:\n");
        prompt.push_str(&courses.join("\n"));
    }
    if !faqs.is_empty() {
        prompt.push_str("\n\nCommon FAQs:\n");
        prompt.push_str(&faqs.join("\n"));
    }
    prompt
}
