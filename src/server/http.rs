//! HTTP server implementation
//!
//! A "gate check" endpoint: every request is run through the gate and
//! answered with 401 on deny, or 200 plus a `Set-Cookie` carrying the
//! session token on pass. Meant to sit behind a reverse proxy doing
//! sub-request authorization, or to be embedded via `gate_request`.
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::spawn_compaction_task;
use crate::config::Args;
use crate::gate::{GatewayVerifier, RouteClass};
use crate::types::{Decision, GateError, GateRequest};

/// Method of the request being authorized, set by the fronting proxy
pub const ORIGINAL_METHOD_HEADER: &str = "x-original-method";
/// URI of the request being authorized, set by the fronting proxy
pub const ORIGINAL_URI_HEADER: &str = "x-original-uri";
/// Client address as seen by the fronting proxy
pub const REAL_IP_HEADER: &str = "x-real-ip";
/// User authenticated by the fronting proxy
pub const AUTHENTICATED_USER_HEADER: &str = "x-authenticated-user";

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub gate: GatewayVerifier,
}

impl AppState {
    pub fn new(args: Args, gate: GatewayVerifier) -> Self {
        Self { args, gate }
    }

    /// Build the gate from the CLI configuration
    pub fn from_args(args: Args) -> Result<Self, GateError> {
        let gate = GatewayVerifier::new(args.gate_config()?)?;
        Ok(Self::new(args, gate))
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), GateError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Gatehouse listening on {}", state.args.listen);

    if state.args.trust_proxy_headers {
        warn!("Trusting proxy headers - only expose this port to the fronting proxy");
    }

    if state.args.vault_compaction_secs > 0 {
        spawn_compaction_task(
            Arc::clone(state.gate.sessions().vault()),
            Duration::from_secs(state.args.vault_compaction_secs),
        );
        info!(
            "Vault compaction every {}s",
            state.args.vault_compaction_secs
        );
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

/// Gate an incoming HTTP request
async fn handle_request<B>(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<B>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let request = gate_request(&req, addr, &state.args);

    // Gated rules covering /health take precedence over the health check
    if req.method() == Method::GET
        && req.uri().path() == "/health"
        && !req.headers().contains_key(ORIGINAL_URI_HEADER)
        && state.gate.classify(&request).class() == RouteClass::Unprotected
    {
        return Ok(health_response(&state));
    }

    let decision = state.gate.verify(&request);

    debug!(
        "[{}] {} {} -> pass={}",
        addr, request.method, request.path, decision.pass
    );

    Ok(decision_response(&decision, &state.args.token_cookie))
}

/// Translate an HTTP request into a `GateRequest`
pub fn gate_request<B>(req: &Request<B>, peer: SocketAddr, args: &Args) -> GateRequest {
    let headers = req.headers();
    let trusted = args.trust_proxy_headers;

    let method = trusted
        .then(|| header_str(headers, ORIGINAL_METHOD_HEADER))
        .flatten()
        .unwrap_or_else(|| req.method().as_str())
        .to_string();

    let path = trusted
        .then(|| header_str(headers, ORIGINAL_URI_HEADER))
        .flatten()
        .map(strip_query)
        .unwrap_or_else(|| req.uri().path())
        .to_string();

    let address = trusted
        .then(|| header_str(headers, REAL_IP_HEADER))
        .flatten()
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
        .unwrap_or_else(|| peer.ip());

    let externally_authenticated = trusted
        && header_str(headers, AUTHENTICATED_USER_HEADER)
            .map(|v| !v.trim().is_empty())
            .unwrap_or(false);

    let mut request = GateRequest::new(method, path)
        .with_address(address)
        .with_external_auth(externally_authenticated);
    if let Some(token) = cookie_value(headers, &args.token_cookie) {
        request = request.with_token(token);
    }
    request
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn strip_query(uri: &str) -> &str {
    uri.split_once('?').map(|(path, _)| path).unwrap_or(uri)
}

/// Find a cookie by name across all Cookie headers
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// Map a decision onto an HTTP response
fn decision_response(decision: &Decision, cookie_name: &str) -> Response<Full<Bytes>> {
    if !decision.pass {
        return Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(CONTENT_TYPE, "text/plain")
            .body(Full::new(Bytes::from("Access Denied for unauthorized user")))
            .unwrap_or_else(|_| fallback_response(StatusCode::UNAUTHORIZED));
    }

    // token travels in the cookie only
    let body = Decision {
        token: None,
        ..decision.clone()
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json");

    if let Some(token) = &decision.token {
        match HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            cookie_name, token
        )) {
            Ok(value) => builder = builder.header(SET_COOKIE, value),
            Err(e) => warn!("Cannot encode session cookie: {}", e),
        }
    }

    let body = match serde_json::to_vec(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Cannot encode decision: {}", e);
            return fallback_response(StatusCode::OK);
        }
    };

    builder
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| fallback_response(StatusCode::OK))
}

/// Health check response
fn health_response(state: &AppState) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "status": "ok",
        "protocols": state.gate.config().protocols,
        "vault_entries": state.gate.sessions().vault().len(),
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| fallback_response(StatusCode::OK))
}

fn fallback_response(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
