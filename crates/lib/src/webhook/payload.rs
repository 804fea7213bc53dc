//! Webhook event envelope and text-message extraction.
//!
//! Envelope: `{ object, entry: [{ id, changes: [{ field, value: { messages, statuses, ... } }] }] }`.
//! The nesting down to `value` is required; everything under `value` is optional because the
//! platform uses the same envelope for delivery statuses, reactions, media and text.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

const BUSINESS_ACCOUNT_OBJECT: &str = "whatsapp_business_account";
const MESSAGES_FIELD: &str = "messages";
const TEXT_TYPE: &str = "text";

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    pub value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub display_phone_number: Option<String>,
    #[serde(default)]
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Unix seconds, as a string.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<WebhookText>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookText {
    #[serde(default)]
    pub body: String,
}

/// A text message extracted from a webhook event. Lives for one resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    pub sender_id: String,
    pub raw_text: String,
    pub received_at: DateTime<Utc>,
    pub message_id: Option<String>,
}

/// Why an event carried nothing to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMessageReason {
    /// `entry` (or every `changes`) was empty.
    NoEntries,
    /// Not a WhatsApp Business Account event.
    UnsupportedObject(String),
    /// Delivery/read status callback.
    StatusUpdate,
    /// Image, audio, reaction, etc.
    NonText(String),
    /// Text message with a blank body.
    EmptyText,
}

/// Outcome of parsing one webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    Text(IncomingMessage),
    NoMessage(NoMessageReason),
    /// Body is not JSON or lacks the required nesting.
    Malformed(String),
}

impl WebhookMessage {
    fn received_at(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|t| t.trim().parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }
}

impl WebhookPayload {
    /// First text message in the envelope, or the reason there is none.
    pub fn first_text_message(&self) -> Result<IncomingMessage, NoMessageReason> {
        if let Some(object) = self.object.as_deref() {
            if object != BUSINESS_ACCOUNT_OBJECT {
                return Err(NoMessageReason::UnsupportedObject(object.to_string()));
            }
        }

        // Report the most specific reason seen when no text message is found.
        let mut reason = NoMessageReason::NoEntries;
        for change in self.entry.iter().flat_map(|e| e.changes.iter()) {
            if change.field != MESSAGES_FIELD {
                log::debug!("ignoring webhook change for field {:?}", change.field);
                continue;
            }
            if change.value.messages.is_empty() && !change.value.statuses.is_empty() {
                reason = NoMessageReason::StatusUpdate;
                continue;
            }
            for msg in &change.value.messages {
                if msg.message_type != TEXT_TYPE {
                    reason = NoMessageReason::NonText(msg.message_type.clone());
                    continue;
                }
                let body = msg.text.as_ref().map(|t| t.body.trim()).unwrap_or("");
                if body.is_empty() {
                    reason = NoMessageReason::EmptyText;
                    continue;
                }
                return Ok(IncomingMessage {
                    sender_id: msg.from.clone(),
                    raw_text: body.to_string(),
                    received_at: msg.received_at(),
                    message_id: msg.id.clone(),
                });
            }
        }
        Err(reason)
    }
}

/// Parse a raw webhook body. Never fails: structural problems become [`ParsedEvent::Malformed`].
pub fn parse_event(body: &[u8]) -> ParsedEvent {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => return ParsedEvent::Malformed(e.to_string()),
    };
    match payload.first_text_message() {
        Ok(msg) => ParsedEvent::Text(msg),
        Err(reason) => ParsedEvent::NoMessage(reason),
    }
}
