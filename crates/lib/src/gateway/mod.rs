//! Gateway: HTTP server for the WhatsApp webhook.
//!
//! Verified events are queued to a processor task, so the webhook answers immediately while
//! replies are resolved and sent in the background.

mod protocol;
mod server;

pub use protocol::{
    ErrorResponse, HealthResponse, MetaResponse, TestRequest, TestResponse, WebhookQuery,
};
pub use server::{process_inbound, router, run_gateway, serve, GatewayState};
