//! Webhook signature verification
//!
//! The gateway signs every webhook with HMAC-SHA256 over the raw request body
//! using the shared webhook secret and sends the hex digest in a header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Check `provided_signature` against the raw body bytes.
///
/// Returns `false` for a missing signature or secret, a signature that is not
/// hex, or any mismatch. Comparison is constant-time.
pub fn verify(raw_body: &[u8], provided_signature: &str, shared_secret: &str) -> bool {
    let provided_signature = provided_signature.trim();
    if provided_signature.is_empty() || shared_secret.is_empty() {
        return false;
    }

    let Ok(expected) = hex::decode(provided_signature) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(shared_secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature the gateway would send for `raw_body`
pub fn sign(raw_body: &[u8], shared_secret: &str) -> String {
    // HMAC accepts keys of any length, including empty ones
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}
