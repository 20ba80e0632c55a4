//! Session token issuance and verification
//!
//! Mints and validates the signed, time-bounded token the relying party
//! receives alongside the encrypted payload. The token is self-contained
//! and independent of the payload cipher.
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - The signing secret is process-wide configuration loaded once at
//!   startup; rotating it invalidates every previously issued token
//! - Default handshake token expiry is 24 hours

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{PorticoError, Result};

/// Claim set embedded in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user identifier
    pub sub: String,
    /// Display username
    pub username: String,
    /// Handshake session identifier
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of token verification
#[derive(Debug)]
pub struct TokenVerification {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

impl TokenVerification {
    pub fn valid(claims: Claims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            claims: None,
            error: Some(error.into()),
        }
    }
}

/// Token issuer and verifier bound to one shared secret
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    ttl_seconds: u64,
}

impl TokenService {
    /// Create a new token service.
    ///
    /// Returns an error if the secret is empty. Production-strength secret
    /// policy (length, not the shipped placeholder) is enforced at config
    /// validation, not here, so dev mode can run with the defaults.
    pub fn new(secret: String, ttl_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(PorticoError::Config(
                "JWT_SECRET must not be empty".into(),
            ));
        }

        Ok(Self {
            secret,
            ttl_seconds,
        })
    }

    /// Issue a signed token for an identity/session pair.
    ///
    /// `exp` is fixed at issuance: `iat + ttl_seconds`.
    pub fn issue(&self, sub: &str, username: &str, session_id: &str) -> Result<String> {
        let now = unix_now()?;

        let claims = Claims {
            sub: sub.to_string(),
            username: username.to_string(),
            session_id: session_id.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| PorticoError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(token)
    }

    /// Verify and decode a token.
    ///
    /// Fails on bad signature, malformed structure, or expired timestamp.
    /// Any failure is terminal: no claims are returned, no partial trust.
    pub fn verify(&self, token: &str) -> TokenVerification {
        let mut validation = Validation::default();
        validation.leeway = 0;

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => TokenVerification::valid(token_data.claims),
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let error_msg = match err.kind() {
                    ErrorKind::ExpiredSignature => "Token expired",
                    ErrorKind::InvalidToken => "Invalid token",
                    ErrorKind::InvalidSignature => "Invalid signature",
                    _ => "Token validation failed",
                };
                TokenVerification::invalid(error_msg)
            }
        }
    }

    /// Configured token lifetime in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PorticoError::Internal(format!("System time error: {}", e)))?
        .as_secs())
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}
