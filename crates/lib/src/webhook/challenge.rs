//! Subscription handshake (GET /webhook).
//!
//! The platform sends:
//! - `hub.mode=subscribe`
//! - `hub.verify_token=<configured token>`
//! - `hub.challenge=<random string>`
//!
//! and expects the challenge echoed back before it delivers events.

pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Returns `Some(challenge)` when mode is `subscribe` and the token matches exactly.
/// A missing expected token rejects every handshake.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: Option<&str>,
) -> Option<String> {
    let expected = expected_token?;
    let mode = mode?;
    let token = token?;
    let challenge = challenge?;

    if mode == SUBSCRIBE_MODE && token == expected {
        Some(challenge.to_string())
    } else {
        None
    }
}
