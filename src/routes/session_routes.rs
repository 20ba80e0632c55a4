//! HTTP Routes for session refresh
//!
//! - POST /refresh-session - Grant a session one more TTL window
//! - GET  /refresh-session - Validation probe for an existing session
//! - POST /server-refresh  - Backend-initiated refresh, guarded by API key

use chrono::{Duration, Utc};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::routes::{
    cors_preflight, error_response, json_response, parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub expires_at: String,
    pub message: String,
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResponse {
    pub valid: bool,
    pub user_id: String,
    pub session_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRefreshRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerRefreshResponse {
    pub success: bool,
    pub user_id: String,
    pub session_id: String,
    pub expires_at: String,
    pub message: String,
    pub refreshed_at: String,
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /refresh-session
///
/// Grants the named session one more TTL window counted from now.
async fn handle_refresh_session(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: RefreshRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    if body.user_id.trim().is_empty() || body.username.trim().is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required fields: userId, username".into(),
                code: Some("MISSING_FIELD".into()),
            },
        );
    }

    let ttl = state.args.session_ttl_seconds;
    let expires_at = Utc::now() + Duration::seconds(ttl as i64);

    info!(user_id = %body.user_id, %expires_at, "session refreshed");

    json_response(
        StatusCode::OK,
        &RefreshResponse {
            success: true,
            expires_at: expires_at.to_rfc3339(),
            message: format!("Session extended by {} seconds", ttl),
            user_id: body.user_id,
            username: body.username,
        },
    )
}

/// GET /refresh-session?userId=&sessionId=
///
/// Cheap probe for clients that only want to know whether their session
/// identifiers are still accepted before attempting a real refresh.
fn handle_refresh_probe(req: &Request<hyper::body::Incoming>) -> Response<BoxBody> {
    let query = req.uri().query().unwrap_or("");
    let user_id = query_param(query, "userId");
    let session_id = query_param(query, "sessionId");

    let (user_id, session_id) = match (user_id, session_id) {
        (Some(u), Some(s)) if !u.is_empty() && !s.is_empty() => (u, s),
        _ => {
            return json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    error: "Missing required query parameters: userId, sessionId".into(),
                    code: Some("MISSING_FIELD".into()),
                },
            )
        }
    };

    json_response(
        StatusCode::OK,
        &ProbeResponse {
            valid: true,
            user_id,
            session_id,
            message: "Session is valid".into(),
        },
    )
}

/// POST /server-refresh
///
/// Backend-to-backend refresh. No user token is involved; possession of the
/// configured API key is the whole credential.
async fn handle_server_refresh(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let body: ServerRefreshRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_response(e),
    };

    if body.api_key != state.args.backend_api_key {
        warn!("server refresh rejected: bad API key");
        return json_response(
            StatusCode::UNAUTHORIZED,
            &ErrorResponse {
                error: "Invalid API key".into(),
                code: Some("UNAUTHORIZED".into()),
            },
        );
    }

    if body.user_id.trim().is_empty() || body.session_id.trim().is_empty() {
        return json_response(
            StatusCode::BAD_REQUEST,
            &ErrorResponse {
                error: "Missing required fields: userId, sessionId".into(),
                code: Some("MISSING_FIELD".into()),
            },
        );
    }

    let ttl = state.args.session_ttl_seconds;
    let now = Utc::now();
    let expires_at = now + Duration::seconds(ttl as i64);

    info!(
        user_id = %body.user_id,
        session_id = %body.session_id,
        %expires_at,
        "server-initiated session refresh"
    );

    json_response(
        StatusCode::OK,
        &ServerRefreshResponse {
            success: true,
            user_id: body.user_id,
            session_id: body.session_id,
            expires_at: expires_at.to_rfc3339(),
            message: format!("Session extended by {} seconds", ttl),
            refreshed_at: now.to_rfc3339(),
        },
    )
}

/// Pull one parameter out of a raw query string. Values are expected to be
/// plain identifiers, so no percent-decoding is done.
fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

// =============================================================================
// Main Router
// =============================================================================

/// Handle session-related HTTP requests.
///
/// Returns Some(response) if the request was handled, None otherwise.
pub async fn handle_session_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if path != "/refresh-session" && path != "/server-refresh" {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let response = match (method, path) {
        (&Method::POST, "/refresh-session") => handle_refresh_session(req, state).await,
        (&Method::GET, "/refresh-session") => handle_refresh_probe(&req),
        (&Method::POST, "/server-refresh") => handle_server_refresh(req, state).await,

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
