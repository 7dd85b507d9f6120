//! Shared-secret verification of webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a webhook delivery against the configured shared secret.
///
/// Two header forms satisfy verification, for compatibility with both signed
/// and simple webhook senders: a 64-hex-character HMAC-SHA256 of the raw
/// request body keyed by the secret, or the raw secret value itself. The
/// secret must never appear in logs.
pub fn verify_signature(secret: &str, body: &[u8], header_value: &str) -> bool {
    if looks_like_hex_digest(header_value) {
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());
        if header_value.eq_ignore_ascii_case(&expected) {
            return true;
        }
    }
    header_value == secret
}

fn looks_like_hex_digest(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
