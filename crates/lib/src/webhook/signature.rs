//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `sha256=<hex digest>` of the raw body.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Verify that `body` was signed with `app_secret`.
///
/// With no secret configured every request passes (open mode for local development).
/// With a secret, a missing header, a header without the `sha256=` prefix, or a digest that is
/// not hex is rejected. The digest comparison is constant time.
pub fn verify_signature(body: &[u8], signature_header: Option<&str>, app_secret: Option<&str>) -> bool {
    let Some(secret) = app_secret.filter(|s| !s.is_empty()) else {
        return true;
    };
    let Some(header) = signature_header else {
        log::debug!("webhook signature header missing");
        return false;
    };
    let Some(hex_digest) = header.trim().strip_prefix(SIGNATURE_PREFIX) else {
        log::debug!("webhook signature header has no sha256= prefix");
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        log::debug!("webhook signature is not hex");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// `sha256=<hex>` signature for `body`, as the platform would send it.
#[cfg(test)]
pub(crate) fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret";

    #[test]
    fn open_mode_accepts_anything() {
        assert!(verify_signature(b"body", None, None));
        assert!(verify_signature(b"body", Some("garbage"), None));
        assert!(verify_signature(b"body", None, Some("")));
    }

    #[test]
    fn valid_signature() {
        let body = br#"{"object":"whatsapp_business_account","entry":[]}"#;
        let header = sign(body, SECRET);
        assert!(verify_signature(body, Some(&header), Some(SECRET)));
    }

    #[test]
    fn uppercase_hex_is_accepted() {
        let body = b"test body";
        let header = sign(body, SECRET);
        let upper = format!("sha256={}", header.trim_start_matches("sha256=").to_uppercase());
        assert!(verify_signature(body, Some(&upper), Some(SECRET)));
    }

    #[test]
    fn any_single_byte_mutation_is_rejected() {
        let body = b"{\"entry\":[{\"changes\":[]}]}".to_vec();
        let header = sign(&body, SECRET);
        for i in 0..body.len() {
            let mut mutated = body.clone();
            mutated[i] ^= 0x01;
            assert!(
                !verify_signature(&mutated, Some(&header), Some(SECRET)),
                "mutation at byte {} accepted",
                i
            );
        }
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"test body";
        let header = sign(body, "other_secret");
        assert!(!verify_signature(body, Some(&header), Some(SECRET)));
    }

    #[test]
    fn missing_or_malformed_header_is_rejected() {
        let body = b"test body";
        assert!(!verify_signature(body, None, Some(SECRET)));
        assert!(!verify_signature(body, Some(""), Some(SECRET)));
        assert!(!verify_signature(body, Some("sha256="), Some(SECRET)));
        assert!(!verify_signature(body, Some("invalid_format"), Some(SECRET)));
        assert!(!verify_signature(body, Some("sha256=not-hex!"), Some(SECRET)));
        assert!(!verify_signature(
            body,
            Some("sha256=0000000000000000000000000000000000000000000000000000000000000000"),
            Some(SECRET)
        ));
    }
}
