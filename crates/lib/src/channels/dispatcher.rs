//! Reply dispatcher seam.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher not configured: {0}")]
    NotConfigured(&'static str),
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("send rejected: {0}")]
    Api(String),
}

/// Delivers a text reply to a recipient (e.g. a WhatsApp phone number).
#[async_trait]
pub trait ReplyDispatcher: Send + Sync {
    /// Channel id (e.g. "whatsapp").
    fn id(&self) -> &str;

    /// Send a text message to `recipient`.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), DispatchError>;
}
