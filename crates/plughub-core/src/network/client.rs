//! Per-host HTTP client for provider APIs.
//!
//! Every request gets the configured timeout and user agent, plus a bearer
//! token when one is set for the host. The client remembers the most recent
//! `X-RateLimit-*` headers and briefly backs off while the upstream quota is
//! nearly spent. Transport errors and non-2xx statuses all surface as
//! `PlughubError::Provider`, except 429 which becomes `RateLimited`.

use crate::config::NetworkConfig;
use crate::{PlughubError, Result};
use bytes::Bytes;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Upstream quota as last reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
    /// Epoch seconds.
    pub reset: Option<u64>,
}

impl RateLimitState {
    /// True once fewer than a tenth of the quota (and at least one call) is left.
    pub fn is_low(&self) -> bool {
        let (Some(remaining), Some(limit)) = (self.remaining, self.limit) else {
            return false;
        };
        limit > 0 && remaining < (limit / 10).max(1)
    }

    pub fn time_until_reset(&self) -> Option<Duration> {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        self.reset
            .filter(|reset| *reset > now)
            .map(|reset| Duration::from_secs(reset - now))
    }

    fn absorb(&mut self, response: &Response) {
        let read = |name: &str| -> Option<u64> {
            response.headers().get(name)?.to_str().ok()?.parse().ok()
        };
        if let Some(remaining) = read("x-ratelimit-remaining") {
            self.remaining = Some(remaining);
        }
        if let Some(limit) = read("x-ratelimit-limit") {
            self.limit = Some(limit).filter(|l| *l > 0);
        }
        if let Some(reset) = read("x-ratelimit-reset") {
            self.reset = Some(reset).filter(|r| *r > 0);
        }
    }
}

/// HTTP client bound to one upstream host.
pub struct HttpClient {
    inner: Client,
    host: String,
    token: Option<String>,
    quota: Mutex<RateLimitState>,
    backoff: Duration,
}

impl HttpClient {
    pub fn new(host: impl Into<String>, token: Option<String>) -> Result<Self> {
        let host = host.into();
        let inner = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| PlughubError::Config {
                message: format!("Cannot build HTTP client for {}: {}", host, e),
            })?;

        Ok(Self {
            inner,
            host,
            token: token.filter(|t| !t.is_empty()),
            quota: Mutex::new(RateLimitState::default()),
            backoff: NetworkConfig::THROTTLE_DELAY,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether requests carry a bearer token.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn rate_limit_state(&self) -> RateLimitState {
        *self.quota.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// GET `url` with the given `Accept` header and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T> {
        let body = self
            .send(self.inner.get(url).header(header::ACCEPT, accept), url)
            .await?;
        serde_json::from_slice(&body)
            .map_err(|e| self.provider_error(None, format!("invalid JSON from {}: {}", url, e)))
    }

    /// GET `url` and return the raw body.
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        self.send(self.inner.get(url), url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Bytes> {
        self.pace().await;
        debug!("GET {}", url);

        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| self.provider_error(None, format!("GET {} failed: {}", url, e)))?;

        self.record_quota(&response);
        let response = self.reject_failure(response, url)?;
        response
            .bytes()
            .await
            .map_err(|e| self.provider_error(None, format!("reading {} failed: {}", url, e)))
    }

    /// Back off while the quota is low, never longer than the reset horizon.
    async fn pace(&self) {
        let quota = self.rate_limit_state();
        if !quota.is_low() {
            return;
        }
        let pause = quota
            .time_until_reset()
            .map_or(self.backoff, |wait| wait.min(self.backoff));
        warn!(
            "{} quota nearly spent ({:?} of {:?} left), pausing {:?}",
            self.host, quota.remaining, quota.limit, pause
        );
        tokio::time::sleep(pause).await;
    }

    fn record_quota(&self, response: &Response) {
        let mut quota = self.quota.lock().unwrap_or_else(PoisonError::into_inner);
        quota.absorb(response);
        if let (Some(remaining), Some(limit)) = (quota.remaining, quota.limit) {
            debug!("{} quota: {}/{}", self.host, remaining, limit);
        }
    }

    fn reject_failure(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok());
            return Err(PlughubError::RateLimited {
                service: self.host.clone(),
                retry_after_secs,
            });
        }

        Err(self.provider_error(Some(status), format!("GET {} returned {}", url, status)))
    }

    fn provider_error(&self, status: Option<StatusCode>, message: String) -> PlughubError {
        PlughubError::Provider {
            host: self.host.clone(),
            status: status.map(|s| s.as_u16()),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota(remaining: u64, limit: u64) -> RateLimitState {
        RateLimitState {
            remaining: Some(remaining),
            limit: Some(limit),
            reset: None,
        }
    }

    #[test]
    fn test_low_quota_threshold() {
        assert!(quota(5, 100).is_low());
        assert!(!quota(10, 100).is_low());
        assert!(!quota(50, 100).is_low());
        // Small quotas still keep one call in reserve.
        assert!(quota(0, 5).is_low());
        assert!(!quota(1, 5).is_low());
    }

    #[test]
    fn test_unknown_quota_is_never_low() {
        let state = RateLimitState::default();
        assert!(!state.is_low());
        assert!(state.time_until_reset().is_none());

        let past = RateLimitState {
            reset: Some(1),
            ..state
        };
        assert!(past.time_until_reset().is_none());
    }

    #[test]
    fn test_empty_token_means_anonymous() {
        let client = HttpClient::new("github.com", Some("token".into())).unwrap();
        assert_eq!(client.host(), "github.com");
        assert!(client.is_authenticated());
        assert_eq!(client.rate_limit_state(), RateLimitState::default());

        let anonymous = HttpClient::new("codeberg.org", Some(String::new())).unwrap();
        assert!(!anonymous.is_authenticated());
    }
}
