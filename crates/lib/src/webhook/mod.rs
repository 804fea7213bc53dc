//! WhatsApp webhook: subscription handshake, payload signatures, and event parsing.

mod challenge;
mod payload;
mod signature;

pub use challenge::{verify_subscription, SUBSCRIBE_MODE};
pub use payload::{parse_event, IncomingMessage, NoMessageReason, ParsedEvent, WebhookPayload};
pub use signature::{verify_signature, SIGNATURE_HEADER};
