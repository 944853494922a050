//! HTTP server.
//!
//! Accepts connections, hands every non-utility request to the resolver,
//! applies the configured delay, and serializes the outcome. Also serves
//! the two fixed utility routes (`/health`, `/endpoints`) and injects the
//! CORS policy on every response.

use crate::config::{ConfigStore, FileConfigStore};
use crate::error::{ErrorShape, ResolveError};
use crate::fixtures::DirFixtureStore;
use crate::resolver::{ResolvedResponse, Resolver};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared per-server state: the resolver, a configuration handle for the
/// endpoint listing, and request counters.
pub struct ServerState {
    resolver: Resolver<FileConfigStore, DirFixtureStore>,
    config: FileConfigStore,
    error_shape: ErrorShape,
    requests_total: AtomicU64,
    requests_resolved: AtomicU64,
    requests_failed: AtomicU64,
}

impl ServerState {
    pub fn new(
        resolver: Resolver<FileConfigStore, DirFixtureStore>,
        config: FileConfigStore,
        error_shape: ErrorShape,
    ) -> Self {
        Self {
            resolver,
            config,
            error_shape,
            requests_total: AtomicU64::new(0),
            requests_resolved: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn total_resolved(&self) -> u64 {
        self.requests_resolved.load(Ordering::Relaxed)
    }

    pub fn total_failed(&self) -> u64 {
        self.requests_failed.load(Ordering::Relaxed)
    }
}

/// The mock server.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockServer {
    pub fn new(addr: SocketAddr, state: ServerState) -> Self {
        Self {
            addr,
            state: Arc::new(state),
        }
    }

    /// Run the accept loop until a shutdown signal arrives.
    ///
    /// Each connection is served on its own task; a failed connection never
    /// tears down the loop.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("API mock server listening on http://{}", self.addr);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, _) = accepted?;
                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(req, state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Connection error: {}", e);
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping");
                    return Ok(());
                }
            }
        }
    }
}

/// Handle one request: utility routes first, everything else through the
/// resolver.
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    state.requests_total.fetch_add(1, Ordering::Relaxed);

    // Preflight: CORS is a fixed cross-cutting policy
    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    match (&method, path.as_str()) {
        (&Method::GET, "/health") => return Ok(handle_health()),
        (&Method::GET, "/endpoints") => return Ok(handle_endpoints(&state).await),
        _ => {}
    }

    let headers = flatten_headers(req.headers());
    let body = req.into_body().collect().await?.to_bytes();
    let body = if body.is_empty() {
        None
    } else {
        Some(body.as_ref())
    };

    let response = match state
        .resolver
        .resolve(method.as_str(), &path, &headers, body)
        .await
    {
        Ok(resolved) => {
            state.requests_resolved.fetch_add(1, Ordering::Relaxed);
            info!(method = %method, %path, status = resolved.status, "Request resolved");

            if !resolved.delay.is_zero() {
                debug!(%path, delay = ?resolved.delay, "Applying response delay");
                tokio::time::sleep(resolved.delay).await;
            }

            resolved_response(&resolved)
        }
        Err(err) => {
            state.requests_failed.fetch_add(1, Ordering::Relaxed);
            if err.is_server_error() {
                error!(method = %method, %path, error = %err, "Request failed");
            } else {
                warn!(method = %method, %path, error = %err, "Request rejected");
            }
            error_response(&err, state.error_shape)
        }
    };

    Ok(response)
}

/// GET /health
fn handle_health() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "healthy",
            "message": "API mock server is running",
        }),
    )
}

/// GET /endpoints - list everything currently configured
async fn handle_endpoints(state: &ServerState) -> Response<Full<Bytes>> {
    let config = match state.config.load().await {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration for listing");
            return error_response(&ResolveError::Internal(e), state.error_shape);
        }
    };

    let mut endpoints: Vec<serde_json::Value> = config
        .endpoints
        .iter()
        .map(|(path, endpoint)| {
            serde_json::json!({
                "path": path,
                "methods": endpoint.allowed_methods(),
                "description": endpoint.description,
                "response_file": endpoint.response_file.clone().unwrap_or_default(),
            })
        })
        .collect();
    endpoints.sort_by(|a, b| a["path"].as_str().cmp(&b["path"].as_str()));

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "total": endpoints.len(),
            "endpoints": endpoints,
        }),
    )
}

/// Flatten a hyper header map to single-value entries (first value wins).
fn flatten_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .keys()
        .filter_map(|name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Build the response for a successful resolution.
fn resolved_response(resolved: &ResolvedResponse) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(resolved.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_vec(&resolved.body).unwrap_or_default();

    with_cors(
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, resolved.content_type)
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
    )
}

/// Build the response for a resolution failure.
fn error_response(err: &ResolveError, shape: ErrorShape) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &err.to_body(shape))
}

/// Serialize a JSON body with the standard headers.
fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(body).unwrap_or_default();
    with_cors(
        Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
    )
}

/// Empty 204 answer for CORS preflight requests.
fn preflight_response() -> Response<Full<Bytes>> {
    with_cors(
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(Bytes::new()))
            .unwrap(),
    )
}

/// Attach the fixed CORS policy.
fn with_cors(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        header::HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        header::HeaderValue::from_static("GET, POST, PUT, DELETE, PATCH, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        header::HeaderValue::from_static("Content-Type, applicationId, accessKey"),
    );
    response
}
