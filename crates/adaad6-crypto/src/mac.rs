//! HMAC-SHA256 for configuration signatures and readiness gates

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// The only MAC algorithm the config controller accepts.
pub const MAC_ALGORITHM: &str = "HMAC-SHA256";

/// Compute an HMAC-SHA256 tag as lowercase hex.
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a lowercase hex HMAC-SHA256 tag.
pub fn verify_hmac_sha256_hex(key: &[u8], message: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let tag = hmac_sha256_hex(b"secret", b"payload");
        assert_eq!(tag.len(), 64);
        assert!(verify_hmac_sha256_hex(b"secret", b"payload", &tag));
    }

    #[test]
    fn rejects_wrong_key() {
        let tag = hmac_sha256_hex(b"secret", b"payload");
        assert!(!verify_hmac_sha256_hex(b"other", b"payload", &tag));
    }

    #[test]
    fn rejects_tampered_message() {
        let tag = hmac_sha256_hex(b"secret", b"payload");
        assert!(!verify_hmac_sha256_hex(b"secret", b"payload2", &tag));
    }

    #[test]
    fn rejects_non_hex_signature() {
        assert!(!verify_hmac_sha256_hex(b"secret", b"payload", "zz-not-hex"));
    }
}
