//! Hash integrity utility
//!
//! Computes the deterministic fingerprint both sides of the handshake use to
//! detect payload tampering. Issuer and verifier must feed byte-identical
//! input: any whitespace or encoding drift produces a valid-looking but
//! wrong digest, not an error.

use sha2::{Digest, Sha256};

/// SHA-256 over the UTF-8 bytes of `input`, returned as lowercase hex.
///
/// Deterministic, fixed 64-character output, no side effects.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_deterministic() {
        let a = sha256_hex("u1alices12320240101");
        let b = sha256_hex("u1alices12320240101");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_changes_with_any_field() {
        let base = sha256_hex("u1alices12320240101");
        // One character changed in each concatenated field
        assert_ne!(base, sha256_hex("u2alices12320240101"));
        assert_ne!(base, sha256_hex("u1alipes12320240101"));
        assert_ne!(base, sha256_hex("u1alices12420240101"));
        assert_ne!(base, sha256_hex("u1alices12320240102"));
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
