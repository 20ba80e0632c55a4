//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. One spawned task per
//! accepted connection; all shared state sits behind an Arc'd `AppState`.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::auth::TokenService;
use crate::config::Args;
use crate::handshake::HandshakeService;
use crate::routes;
use crate::routes::BoxBody;
use crate::types::PorticoError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub handshake: HandshakeService,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(args: Args) -> Result<Self, PorticoError> {
        let tokens = TokenService::new(args.jwt_secret.clone(), args.token_ttl_seconds)?;
        let handshake = HandshakeService::new(tokens.clone());
        Ok(Self {
            args,
            handshake,
            tokens,
        })
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), PorticoError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Portico listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - placeholder secrets accepted");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // Health check endpoints
    if method == Method::GET && (path == "/health" || path == "/healthz") {
        return Ok(to_boxed(routes::health_check(&state.args)));
    }

    // Handshake routes - these consume the request
    if matches!(
        path.as_str(),
        "/handshake" | "/decrypt-payload" | "/verify-token" | "/generate-keys"
    ) {
        if let Some(response) = routes::handle_handshake_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    // Session routes - these consume the request too
    if path == "/refresh-session" || path == "/server-refresh" {
        if let Some(response) = routes::handle_session_request(req, Arc::clone(&state)).await {
            return Ok(response);
        }
        return Ok(to_boxed(not_found_response(&path)));
    }

    // CORS preflight for anything else
    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    Ok(to_boxed(not_found_response(&path)))
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
