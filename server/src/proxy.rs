//! Minimal forwarding proxy in front of the API server.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, HeaderName, Method, header},
    response::{IntoResponse, Response},
};
use platform_api::{ApiError, ApiResult};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub const DEFAULT_UPSTREAM: &str = "http://localhost:8000";
const MAX_PROXY_BODY: usize = 10 * 1024 * 1024;

const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    upstream: Arc<str>,
}

pub fn proxy_router(upstream: &str, client: reqwest::Client) -> Router {
    let state = ProxyState {
        client,
        upstream: Arc::from(upstream.trim_end_matches('/')),
    };
    Router::new()
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(addr: SocketAddr, upstream: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let router = proxy_router(upstream, client);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, %upstream, "proxy listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(crate::http::shutdown_signal())
        .await
        .context("proxy server error")?;
    Ok(())
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

async fn forward(State(state): State<ProxyState>, request: Request) -> Response {
    match forward_inner(&state, request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn forward_inner(state: &ProxyState, request: Request) -> ApiResult<Response> {
    let (parts, body) = request.into_parts();
    if ![Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(&parts.method) {
        return Ok(axum::http::StatusCode::METHOD_NOT_ALLOWED.into_response());
    }
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.upstream, path_and_query);
    let body = to_bytes(body, MAX_PROXY_BODY)
        .await
        .map_err(|_| ApiError::BadRequest("request body too large".into()))?;

    let mut headers = parts.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let upstream = state
        .client
        .request(parts.method.clone(), &url)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|err| {
            warn!(error = %err, %url, "upstream request failed");
            ApiError::BadGateway("upstream unavailable".into())
        })?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    response_headers.remove(header::CONTENT_LENGTH);
    let bytes = upstream.bytes().await.map_err(|err| {
        warn!(error = %err, %url, "upstream body read failed");
        ApiError::BadGateway("upstream response was interrupted".into())
    })?;

    info!(
        method = %parts.method,
        path = %parts.uri.path(),
        status = status.as_u16(),
        "request forwarded"
    );
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}
