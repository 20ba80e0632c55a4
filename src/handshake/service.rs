//! Handshake orchestration
//!
//! One-shot per call, no state carried between handshakes. The forward path
//! runs build → hash → serialize → encrypt → issue token; the reverse path
//! runs decrypt → parse → recompute hash. Multiple in-flight handshakes are
//! safe to run concurrently: the only shared inputs are the read-only token
//! secret and key material.

use serde::Serialize;
use tracing::{info, warn};

use crate::auth::TokenService;
use crate::crypto::{decrypt_with_private_key, encrypt_with_public_key, validate_public_key_pem};
use crate::handshake::payload::HandshakePayload;
use crate::types::{PorticoError, Result};

/// Outcome of a successful forward handshake
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
    pub token: String,
    pub encrypted_payload: String,
    pub session_id: String,
    pub request_date_time: String,
}

/// Outcome of the decrypt-and-verify path.
///
/// A decrypted payload with `hash_valid == false` is a valid outcome, not an
/// error: the caller decides what tampering means for it.
#[derive(Debug, Clone)]
pub struct DecryptedHandshake {
    pub payload: HandshakePayload,
    pub hash_valid: bool,
}

/// Composes payload construction, hashing, encryption, and token issuance.
#[derive(Clone)]
pub struct HandshakeService {
    tokens: TokenService,
}

impl HandshakeService {
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }

    /// Forward path: build and encrypt a payload for the relying party and
    /// mint a session token for the same identity.
    ///
    /// Validation failures (empty identity claims, malformed key PEM) are
    /// rejected before any cryptographic work runs.
    pub fn initiate(
        &self,
        user_id: &str,
        user_name: &str,
        public_key_pem: &str,
    ) -> Result<HandshakeResponse> {
        if user_id.trim().is_empty() {
            return Err(PorticoError::MissingField("userId".into()));
        }
        if user_name.trim().is_empty() {
            return Err(PorticoError::MissingField("username".into()));
        }
        if public_key_pem.trim().is_empty() {
            return Err(PorticoError::MissingField("publicKey".into()));
        }
        validate_public_key_pem(public_key_pem)?;

        let payload = HandshakePayload::build(user_id, user_name);
        let serialized = serde_json::to_string(&payload)
            .map_err(|e| PorticoError::Internal(format!("payload serialization failed: {}", e)))?;

        let encrypted_payload = encrypt_with_public_key(&serialized, public_key_pem)?;
        let token = self
            .tokens
            .issue(user_id, user_name, &payload.session_id)?;

        info!(
            session_id = %payload.session_id,
            user_id = %user_id,
            "handshake issued"
        );

        Ok(HandshakeResponse {
            token,
            encrypted_payload,
            session_id: payload.session_id,
            request_date_time: payload.request_date_time,
        })
    }

    /// Reverse path: recover the payload with the relying party's private
    /// key and check its integrity hash.
    ///
    /// Decryption failure is terminal; a hash mismatch is reported as a
    /// flag on the result.
    pub fn decrypt_and_verify(
        &self,
        encrypted_payload: &str,
        private_key_pem: &str,
    ) -> Result<DecryptedHandshake> {
        if encrypted_payload.trim().is_empty() {
            return Err(PorticoError::MissingField("encryptedPayload".into()));
        }
        if private_key_pem.trim().is_empty() {
            return Err(PorticoError::MissingField("privateKey".into()));
        }

        let plaintext = decrypt_with_private_key(encrypted_payload, private_key_pem)?;

        let payload: HandshakePayload = serde_json::from_str(&plaintext)
            .map_err(|e| PorticoError::BadRequest(format!("payload is not valid JSON: {}", e)))?;

        let hash_valid = payload.verify_hash();
        if !hash_valid {
            warn!(session_id = %payload.session_id, "payload hash mismatch");
        }

        Ok(DecryptedHandshake {
            payload,
            hash_valid,
        })
    }
}
