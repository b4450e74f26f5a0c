//! REST request handlers.

use crate::server::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use plughub_core::query::{filter_plugins, sort_records};
use plughub_core::{FilterOptions, PlughubError, Plugin, SkipNotice, Snapshot, SortBy, Theme};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Core(PlughubError),
}

impl From<PlughubError> for ApiError {
    fn from(err: PlughubError) -> Self {
        ApiError::Core(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Core(err) => {
                let status = match &err {
                    PlughubError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    PlughubError::Provider { .. }
                    | PlughubError::SourceUnavailable { .. }
                    | PlughubError::RateLimited { .. } => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error!("Request failed: {}", err);
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn parse_sort(value: &str) -> Result<SortBy, ApiError> {
    SortBy::parse(value).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "invalid sortBy '{}': expected updated_at, name or random",
            value
        ))
    })
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn version() -> impl IntoResponse {
    Json(json!({"version": env!("CARGO_PKG_VERSION")}))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginQuery {
    category: String,
    compositor: String,
    first_party: bool,
    capability: String,
    sort_by: String,
}

#[derive(Debug, Serialize)]
pub struct PluginsResponse {
    plugins: Vec<Plugin>,
    count: usize,
}

pub async fn list_plugins(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PluginQuery>,
) -> Result<Json<PluginsResponse>, ApiError> {
    let sort_by = parse_sort(&query.sort_by)?;
    let options = FilterOptions {
        category: query.category,
        compositor: query.compositor,
        first_party: query.first_party,
        capability: query.capability,
    };

    let snapshot = state.catalog.plugins().ready_snapshot()?;
    let mut plugins = filter_plugins(snapshot.records(), &options);
    sort_records(&mut plugins, sort_by);

    Ok(Json(PluginsResponse {
        count: plugins.len(),
        plugins,
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeQuery {
    sort_by: String,
}

#[derive(Debug, Serialize)]
pub struct ThemesResponse {
    themes: Vec<Theme>,
    count: usize,
}

pub async fn list_themes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ThemeQuery>,
) -> Result<Json<ThemesResponse>, ApiError> {
    let sort_by = parse_sort(&query.sort_by)?;
    let snapshot = state.catalog.themes().ready_snapshot()?;
    let mut themes = snapshot.records().to_vec();
    sort_records(&mut themes, sort_by);

    Ok(Json(ThemesResponse {
        count: themes.len(),
        themes,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    ready: bool,
    last_update: Option<DateTime<Utc>>,
    count: usize,
    skipped: usize,
    skipped_entries: Vec<SkipNotice>,
}

impl<T> From<&Snapshot<T>> for CacheStatus {
    fn from(snapshot: &Snapshot<T>) -> Self {
        Self {
            ready: snapshot.is_ready(),
            last_update: snapshot.last_update(),
            count: snapshot.len(),
            skipped: snapshot.skipped().len(),
            skipped_entries: snapshot.skipped().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    plugins: CacheStatus,
    themes: CacheStatus,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        plugins: CacheStatus::from(state.catalog.plugins().read().as_ref()),
        themes: CacheStatus::from(state.catalog.themes().read().as_ref()),
    })
}
