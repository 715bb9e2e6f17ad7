//! Payment callback signature verification
//!
//! The gateway signs `orderId|paymentId` with HMAC-SHA256 under the shared
//! key secret; the hex digest must match the caller-supplied signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the expected hex signature for an order/payment pair
pub fn expected_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a caller-supplied payment signature
pub fn verify_signature(order_id: &str, payment_id: &str, secret: &str, signature: &str) -> bool {
    expected_signature(order_id, payment_id, secret) == signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature_verifies() {
        let sig = expected_signature("O1", "P1", "S");
        assert!(verify_signature("O1", "P1", "S", &sig));
    }

    #[test]
    fn test_any_single_character_mutation_fails() {
        let sig = expected_signature("O1", "P1", "S");

        for i in 0..sig.len() {
            let mut mutated: Vec<u8> = sig.bytes().collect();
            mutated[i] = if mutated[i] == b'0' { b'1' } else { b'0' };
            let mutated = String::from_utf8(mutated).unwrap();
            if mutated != sig {
                assert!(!verify_signature("O1", "P1", "S", &mutated));
            }
        }
    }

    #[test]
    fn test_signature_binds_both_ids() {
        let sig = expected_signature("O1", "P1", "S");
        assert!(!verify_signature("O2", "P1", "S", &sig));
        assert!(!verify_signature("O1", "P2", "S", &sig));
        assert!(!verify_signature("O1", "P1", "other", &sig));
    }

    #[test]
    fn test_separator_is_part_of_the_message() {
        // "O1|" + "P1" and "O1" + "|P1" must agree, "O1P1" must not
        let sig = expected_signature("O1", "P1", "S");

        let mut mac = HmacSha256::new_from_slice(b"S").unwrap();
        mac.update(b"O1|P1");
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));

        let mut mac = HmacSha256::new_from_slice(b"S").unwrap();
        mac.update(b"O1P1");
        assert_ne!(sig, hex::encode(mac.finalize().into_bytes()));
    }
}
