//! WhatsApp channel: send text replies via the Graph API `/{phone_number_id}/messages`.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::channels::dispatcher::{DispatchError, ReplyDispatcher};
use crate::config::{self, Config};

const GRAPH_API_BASE: &str = "https://graph.facebook.com";
const SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// WhatsApp platform message length limit for text bodies.
const MAX_TEXT_LEN: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    typ: &'static str,
    text: SendText<'a>,
}

#[derive(Debug, Serialize)]
struct SendText<'a> {
    preview_url: bool,
    body: &'a str,
}

/// WhatsApp Business Cloud API sender.
pub struct WhatsAppChannel {
    id: String,
    token: Option<String>,
    phone_number_id: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        token: Option<String>,
        phone_number_id: Option<String>,
        api_version: &str,
        graph_api_base: Option<&str>,
    ) -> Result<Self, DispatchError> {
        let base = graph_api_base
            .unwrap_or(GRAPH_API_BASE)
            .trim_end_matches('/');
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            id: "whatsapp".to_string(),
            token,
            phone_number_id,
            base_url: format!("{}/{}", base, api_version.trim_matches('/')),
            client,
        })
    }

    /// Build from config (env overrides applied).
    pub fn from_config(config: &Config) -> Result<Self, DispatchError> {
        Self::new(
            config::resolve_access_token(config),
            config::resolve_phone_number_id(config),
            &config::resolve_api_version(config),
            config.whatsapp.graph_api_base.as_deref(),
        )
    }

    /// True when both the access token and phone number id are set.
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.phone_number_id.is_some()
    }

    fn messages_url(&self, phone_number_id: &str) -> String {
        format!("{}/{}/messages", self.base_url, phone_number_id)
    }

    /// POST a text message to `to`.
    pub async fn send_message(&self, to: &str, text: &str) -> Result<(), DispatchError> {
        let token = self
            .token
            .as_ref()
            .ok_or(DispatchError::NotConfigured("WHATSAPP_TOKEN"))?;
        let phone_number_id = self
            .phone_number_id
            .as_ref()
            .ok_or(DispatchError::NotConfigured("PHONE_NUMBER_ID"))?;
        let body = SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            typ: "text",
            text: SendText {
                preview_url: false,
                body: truncate_text(text, MAX_TEXT_LEN),
            },
        };
        let url = self.messages_url(phone_number_id);
        log::debug!("whatsapp: POST {}", url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(DispatchError::Api(format!("{} {}", status, body)));
        }
        Ok(())
    }
}

/// Cut `text` to at most `max` bytes on a char boundary.
fn truncate_text(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl ReplyDispatcher for WhatsAppChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DispatchError> {
        self.send_message(recipient, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_url_includes_version_and_phone_id() {
        let ch = WhatsAppChannel::new(Some("t".into()), Some("123".into()), "v18.0", None).unwrap();
        assert_eq!(
            ch.messages_url("123"),
            "https://graph.facebook.com/v18.0/123/messages"
        );
        let ch = WhatsAppChannel::new(None, None, "/v19.0/", Some("http://127.0.0.1:9/")).unwrap();
        assert_eq!(ch.messages_url("9"), "http://127.0.0.1:9/v19.0/9/messages");
    }

    #[tokio::test]
    async fn unconfigured_send_fails_without_request() {
        let ch = WhatsAppChannel::new(None, Some("123".into()), "v18.0", None).unwrap();
        assert!(!ch.is_configured());
        let err = ch.send_text("15551234567", "hi").await.unwrap_err();
        assert!(matches!(err, DispatchError::NotConfigured("WHATSAPP_TOKEN")));
    }

    #[test]
    fn request_body_shape() {
        let body = SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to: "15551234567",
            typ: "text",
            text: SendText {
                preview_url: false,
                body: "hello",
            },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["type"], "text");
        assert_eq!(v["to"], "15551234567");
        assert_eq!(v["text"]["body"], "hello");
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello", 3), "hel");
        // "é" is two bytes; cutting inside it backs off.
        assert_eq!(truncate_text("aé", 2), "a");
    }
}
