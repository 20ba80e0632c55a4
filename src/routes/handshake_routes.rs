//! HTTP Routes for the SSO handshake
//!
//! Provides REST API endpoints for the handshake exchange:
//! - POST /handshake       - Build, hash, and encrypt a payload; mint a token
//! - POST /decrypt-payload - Decrypt a payload and verify its integrity hash
//! - POST /verify-token    - Verify a session token and return its claims
//! - POST /generate-keys   - Generate a fresh RSA keypair (development aid)

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::extract_token_from_header;
use crate::crypto::generate_keypair;
use crate::handshake::HandshakePayload;
use crate::routes::{
    cors_preflight, error_response, get_auth_header, json_response, parse_json_body, BoxBody,
    ErrorResponse,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    #[serde(default)]
    pub user_id: String,
    /// Accepted as `username` or the payload-style `userName`
    #[serde(default, alias = "userName")]
    pub username: String,
    #[serde(default)]
    pub public_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeHttpResponse {
    pub success: bool,
    #[serde(flatten)]
    pub handshake: crate::handshake::HandshakeResponse,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    #[serde(default)]
    pub encrypted_payload: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptResponse {
    pub success: bool,
    pub payload: HandshakePayload,
    pub hash_valid: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
    #[serde(rename = "payload", skip_serializing_if = "Option::is_none")]
    pub claims: Option<crate::auth::Claims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeypairResponse {
    pub public_key: String,
    pub private_key: String,
    pub message: String,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /handshake
///
/// Flow:
/// 1. Validate identity fields and the caller's public key PEM
/// 2. Build the payload (fresh sessionId and requestDateTime, then hash)
/// 3. Encrypt the payload JSON under the caller's public key
/// 4. Mint a session token for the same identity
async fn handle_handshake(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: HandshakeRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    match state
        .handshake
        .initiate(&body.user_id, &body.username, &body.public_key)
    {
        Ok(response) => json_response(
            StatusCode::OK,
            &HandshakeHttpResponse {
                success: true,
                handshake: response,
                message: "Handshake payload encrypted and token issued".into(),
            },
        ),
        Err(e) => error_response(e),
    }
}

/// POST /decrypt-payload
///
/// A hash mismatch is reported in the body (`hashValid: false`), not as an
/// HTTP error; decryption failure itself is a 500 with a generic message.
async fn handle_decrypt_payload(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: DecryptRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    match state
        .handshake
        .decrypt_and_verify(&body.encrypted_payload, &body.private_key)
    {
        Ok(result) => {
            if !result.hash_valid {
                warn!(
                    session_id = %result.payload.session_id,
                    "decrypted payload failed hash verification"
                );
            }
            let message = if result.hash_valid {
                "Payload decrypted and hash verified".into()
            } else {
                "Payload decrypted but hash verification failed".into()
            };
            json_response(
                StatusCode::OK,
                &DecryptResponse {
                    success: true,
                    payload: result.payload,
                    hash_valid: result.hash_valid,
                    message,
                },
            )
        }
        Err(e) => error_response(e),
    }
}

/// POST /verify-token
///
/// Accepts the token either in the JSON body or as a Bearer header. An
/// invalid token is a 401 whose body still explains which check failed.
async fn handle_verify_token(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let header_token = extract_token_from_header(get_auth_header(&req)).map(|t| t.to_string());

    let token = match header_token {
        Some(t) => t,
        None => {
            let body: VerifyRequest = match parse_json_body(req).await {
                Ok(b) => b,
                Err(e) => return error_response(e),
            };
            body.token
        }
    };

    if token.is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required field: token".into(),
                code: Some("MISSING_FIELD".into()),
            },
        );
    }

    let result = state.tokens.verify(&token);
    let status = if result.valid {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };

    json_response(
        status,
        &VerifyResponse {
            valid: result.valid,
            message: result.valid.then(|| "Token is valid".to_string()),
            claims: result.claims,
            error: result.error,
        },
    )
}

/// POST /generate-keys
///
/// Development convenience for parties that do not bring their own keypair.
async fn handle_generate_keys(state: Arc<AppState>) -> Response<BoxBody> {
    if !state.args.dev_mode {
        return json_response(
            StatusCode::FORBIDDEN,
            &ErrorResponse {
                error: "Key generation is only available in dev mode".into(),
                code: Some("UNAUTHORIZED".into()),
            },
        );
    }

    match generate_keypair() {
        Ok((private_key, public_key)) => {
            info!("generated RSA keypair");
            json_response(
                StatusCode::OK,
                &KeypairResponse {
                    public_key,
                    private_key,
                    message: "Keypair generated; keep the private key on the relying party".into(),
                },
            )
        }
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle handshake-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None otherwise.
pub async fn handle_handshake_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    let handled = matches!(
        path,
        "/handshake" | "/decrypt-payload" | "/verify-token" | "/generate-keys"
    );
    if !handled {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path) {
        (&Method::POST, "/handshake") => handle_handshake(req, state).await,
        (&Method::POST, "/decrypt-payload") => handle_decrypt_payload(req, state).await,
        (&Method::POST, "/verify-token") => handle_verify_token(req, state).await,
        (&Method::POST, "/generate-keys") => handle_generate_keys(state).await,

        _ => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
                code: None,
            },
        ),
    };

    Some(response)
}
