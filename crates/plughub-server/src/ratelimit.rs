//! Rate-limit middleware in front of the catalog routes.

use crate::server::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use plughub_core::config::RateLimitConfig;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Proxy headers carrying the client address, most trusted first.
const IDENTITY_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "x-forwarded-for"];

/// Identity used to key the client's token bucket.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in IDENTITY_HEADERS {
        let first_hop = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .unwrap_or_default();
        if !first_hop.is_empty() {
            return first_hop.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer);

    if state.limiter.allow(&identity) {
        return next.run(request).await;
    }

    debug!("Rate limit exceeded for {}", identity);
    too_many_requests()
}

fn too_many_requests() -> Response {
    let retry_after = RateLimitConfig::RETRY_AFTER_SECS;
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(json!({"error": "rate limit exceeded", "retry_after": retry_after})),
    )
        .into_response()
}
