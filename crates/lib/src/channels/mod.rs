//! Outbound reply delivery.
//!
//! The resolver hands a finished reply to a [`ReplyDispatcher`]; the WhatsApp Graph API
//! client is the production implementation.

mod dispatcher;
mod whatsapp;

pub use dispatcher::{DispatchError, ReplyDispatcher};
pub use whatsapp::WhatsAppChannel;
