//! HTTP server implementation using Axum.

use crate::handlers::{health, list_plugins, list_themes, status, version};
use crate::ratelimit::rate_limit;
use axum::http::{HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use plughub_core::{Catalog, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Server-side settings that are not exposed as flags.
pub struct ServerConfig;

impl ServerConfig {
    pub const PUBLIC_ORIGIN: &'static str = "https://danklinux.com";
    pub const DEV_ORIGIN: &'static str = "http://localhost:3000";
    pub const DEVELOPMENT: &'static str = "development";
    pub const CORS_MAX_AGE: Duration = Duration::from_secs(300);
    /// How long in-flight requests may drain after a shutdown signal.
    pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
}

/// Application state shared across handlers.
pub struct AppState {
    pub catalog: Catalog,
    pub limiter: Arc<RateLimiter>,
    pub environment: String,
}

impl AppState {
    pub fn new(catalog: Catalog, limiter: Arc<RateLimiter>, environment: String) -> Self {
        Self {
            catalog,
            limiter,
            environment,
        }
    }
}

/// Origins allowed by CORS in `environment`.
pub fn allowed_origins(environment: &str) -> Vec<&'static str> {
    if environment == ServerConfig::DEVELOPMENT {
        vec![ServerConfig::DEV_ORIGIN, ServerConfig::PUBLIC_ORIGIN]
    } else {
        vec![ServerConfig::PUBLIC_ORIGIN]
    }
}

fn cors_layer(environment: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins(environment)
        .into_iter()
        .map(HeaderValue::from_static)
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(ServerConfig::CORS_MAX_AGE)
}

/// Build the router. Catalog routes sit behind the rate limiter; health and
/// version probes do not.
pub fn build_router(state: Arc<AppState>) -> Router {
    let catalog_routes = Router::new()
        .route("/plugins", get(list_plugins))
        .route("/themes", get(list_themes))
        .route("/status", get(status))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .merge(catalog_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.environment))
        .with_state(state)
}
