//! Gateway HTTP request and response bodies.

use serde::{Deserialize, Serialize};

use crate::resolver::ReplySource;

/// Query string of the subscription handshake: `hub.mode`, `hub.verify_token`, `hub.challenge`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Body of `POST /test`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestRequest {
    pub message: String,
}

/// Response of `POST /test`.
#[derive(Debug, Clone, Serialize)]
pub struct TestResponse {
    pub input: String,
    pub reply: String,
    pub source: ReplySource,
    pub courses: u64,
    pub faqs: u64,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub courses: u64,
    pub faqs: u64,
}

/// Response of `GET /meta`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaResponse {
    pub version: &'static str,
    pub api_version: String,
    pub fallback_backend: String,
    /// "hmac-sha256" when an app secret is configured, else "open".
    pub signature_mode: &'static str,
    pub dispatch_configured: bool,
}

/// Error body for 4xx responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
