//! Error types for the plughub aggregation cache.
//!
//! `PlughubError` covers failures that abort an operation as a whole (a
//! failed canonical listing, a cancelled refresh, a transport failure seen
//! by a provider client). Failures confined to one registry entry are
//! described by [`EntryError`] and never escape the enrichment pipeline.

use thiserror::Error;

/// Main error type for the plughub library.
#[derive(Debug, Error)]
pub enum PlughubError {
    // Source errors
    #[error("Registry source {source_name} unavailable: {cause}")]
    SourceUnavailable {
        source_name: String,
        #[source]
        cause: Box<PlughubError>,
    },

    // Provider errors
    #[error("Provider error from {host}{}: {message}", fmt_status(.status))]
    Provider {
        host: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Unsupported repository host: {host}")]
    UnsupportedHost { host: String },

    #[error("Invalid repository URL {url}: {reason}")]
    InvalidRepoUrl { url: String, reason: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Cache errors
    #[error("{kind} cache is not ready")]
    NotReady { kind: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

/// Result type alias for plughub operations.
pub type Result<T> = std::result::Result<T, PlughubError>;

impl From<serde_json::Error> for PlughubError {
    fn from(err: serde_json::Error) -> Self {
        PlughubError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for PlughubError {
    fn from(err: reqwest::Error) -> Self {
        let host = err
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("unknown")
            .to_string();
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        PlughubError::Provider {
            host,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

impl PlughubError {
    /// Wrap a failure of the canonical listing step.
    pub fn source_unavailable(source_name: impl Into<String>, cause: PlughubError) -> Self {
        PlughubError::SourceUnavailable {
            source_name: source_name.into(),
            cause: Box::new(cause),
        }
    }

    /// HTTP status reported by the upstream host, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlughubError::Provider { status, .. } => *status,
            PlughubError::RateLimited { .. } => Some(429),
            PlughubError::SourceUnavailable { cause, .. } => cause.status(),
            _ => None,
        }
    }

    /// Check if this error is expected to clear up by the next refresh cycle.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlughubError::Provider { .. } | PlughubError::RateLimited { .. } => true,
            PlughubError::SourceUnavailable { cause, .. } => cause.is_retryable(),
            _ => false,
        }
    }
}

/// Reason a single registry entry was left out of a snapshot.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("malformed registry entry: {message}")]
    Malformed { message: String },

    #[error("invalid repo URL {url}: {reason}")]
    InvalidRepoUrl { url: String, reason: String },

    #[error("unsupported host {host}")]
    UnsupportedHost { host: String },

    #[error("{file} not found at {path}")]
    ManifestMissing { file: String, path: String },

    #[error("invalid {file}: {message}")]
    ManifestInvalid { file: String, message: String },

    #[error("{file} missing version")]
    MissingVersion { file: String },

    #[error("mandatory field {field} is empty")]
    MissingField { field: &'static str },

    #[error("failed to fetch last commit: {message}")]
    CommitUnavailable { message: String },

    #[error(transparent)]
    Provider(PlughubError),

    #[error("cancelled")]
    Cancelled,
}

impl From<PlughubError> for EntryError {
    fn from(err: PlughubError) -> Self {
        match err {
            PlughubError::Cancelled => EntryError::Cancelled,
            PlughubError::UnsupportedHost { host } => EntryError::UnsupportedHost { host },
            PlughubError::InvalidRepoUrl { url, reason } => EntryError::InvalidRepoUrl { url, reason },
            other => EntryError::Provider(other),
        }
    }
}
