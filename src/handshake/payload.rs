//! Handshake payload construction and integrity hashing

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;

/// Length of a generated session identifier
const SESSION_ID_LEN: usize = 16;

const SESSION_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// The claim payload exchanged during the handshake.
///
/// Field order matters twice: the wire JSON is serialized in declaration
/// order, and the integrity hash covers the first four fields concatenated
/// in exactly this order with no separators. Both sides must agree byte for
/// byte or verification fails silently with a wrong-but-well-formed digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakePayload {
    /// Caller-supplied identity claim, never empty
    pub user_id: String,
    /// Caller-supplied display name, never empty
    pub user_name: String,
    /// Generated per handshake, unique per issuance
    pub session_id: String,
    /// Compact `YYYYMMDD` creation date, carried unmodified end to end
    pub request_date_time: String,
    /// Hex SHA-256 over `userId || userName || sessionId || requestDateTime`
    pub hash_value: String,
}

impl HandshakePayload {
    /// Assemble a payload with a fresh session id and request date.
    ///
    /// The hash is computed after `session_id` and `request_date_time` are
    /// final, before the payload is handed to the cipher, and never changes
    /// afterwards.
    pub fn build(user_id: &str, user_name: &str) -> Self {
        let session_id = generate_session_id();
        let request_date_time = request_date();
        let hash_value = compute_hash(user_id, user_name, &session_id, &request_date_time);

        Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            session_id,
            request_date_time,
            hash_value,
        }
    }

    /// Recompute the hash over the carried fields and compare it
    /// byte-for-byte against `hash_value`.
    pub fn verify_hash(&self) -> bool {
        let expected = compute_hash(
            &self.user_id,
            &self.user_name,
            &self.session_id,
            &self.request_date_time,
        );
        self.hash_value == expected
    }
}

/// Digest over the canonical concatenation of the four hashed fields.
///
/// No delimiter, no length prefix. This matches the verifying side's wire
/// contract and is kept as-is; adding separators would break every deployed
/// verifier.
pub fn compute_hash(
    user_id: &str,
    user_name: &str,
    session_id: &str,
    request_date_time: &str,
) -> String {
    let input = format!("{}{}{}{}", user_id, user_name, session_id, request_date_time);
    sha256_hex(&input)
}

/// Random 16-character lowercase alphanumeric session id.
///
/// Collision probability is negligible for a demo flow; uniqueness is not
/// cryptographically guaranteed.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SESSION_ID_CHARSET.len());
            SESSION_ID_CHARSET[idx] as char
        })
        .collect()
}

/// Current UTC date in compact `YYYYMMDD` form.
///
/// The compact format keeps the serialized payload inside the OAEP
/// plaintext budget of a 2048-bit key.
pub fn request_date() -> String {
    Utc::now().format("%Y%m%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_reference_vector() {
        // userId=u1, userName=alice, sessionId=s123, requestDateTime=20240101
        // concatenates to "u1alices12320240101"
        let hash = compute_hash("u1", "alice", "s123", "20240101");
        assert_eq!(hash, sha256_hex("u1alices12320240101"));
        assert_eq!(hash.len(), 64);

        // Changing any single field changes the digest
        assert_ne!(hash, compute_hash("u2", "alice", "s123", "20240101"));
        assert_ne!(hash, compute_hash("u1", "alicf", "s123", "20240101"));
        assert_ne!(hash, compute_hash("u1", "alice", "s124", "20240101"));
        assert_ne!(hash, compute_hash("u1", "alice", "s123", "20240102"));
    }

    #[test]
    fn test_build_produces_verifiable_payload() {
        let payload = HandshakePayload::build("u1", "alice");

        assert_eq!(payload.user_id, "u1");
        assert_eq!(payload.user_name, "alice");
        assert_eq!(payload.session_id.len(), 16);
        assert_eq!(payload.request_date_time.len(), 8);
        assert!(payload.verify_hash());
    }

    #[test]
    fn test_tampered_field_fails_verification() {
        let mut payload = HandshakePayload::build("u1", "alice");
        payload.user_name = "mallory".into();
        assert!(!payload.verify_hash());

        let mut payload = HandshakePayload::build("u1", "alice");
        payload.request_date_time = "19990101".into();
        assert!(!payload.verify_hash());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_wire_json_uses_camel_case_in_declaration_order() {
        let payload = HandshakePayload {
            user_id: "u1".into(),
            user_name: "alice".into(),
            session_id: "s123".into(),
            request_date_time: "20240101".into(),
            hash_value: "deadbeef".into(),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            r#"{"userId":"u1","userName":"alice","sessionId":"s123","requestDateTime":"20240101","hashValue":"deadbeef"}"#
        );
    }
}
