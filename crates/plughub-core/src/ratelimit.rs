//! Per-client token-bucket rate limiter.
//!
//! A new identity starts with `burst - 1` tokens (its first request is
//! allowed). Every later request first refills `elapsed * rate` tokens,
//! capped at `burst`, then spends one if available. A background sweep drops
//! identities idle for longer than the idle window.

use crate::cancel::CancellationToken;
use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_check: Instant,
}

/// Token buckets keyed by client identity.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    rate: f64,
    burst: f64,
    idle_window: Duration,
}

impl RateLimiter {
    /// `rate` tokens per second, at most `burst` (at least 1) banked.
    pub fn new(rate: f64, burst: u32) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            rate: rate.max(0.0),
            burst: f64::from(burst.max(1)),
            idle_window: RateLimitConfig::SWEEP_INTERVAL,
        }
    }

    pub fn with_idle_window(mut self, idle_window: Duration) -> Self {
        self.idle_window = idle_window;
        self
    }

    /// Spend a token for `identity` if one is available.
    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    /// [`allow`](Self::allow) evaluated at `now`.
    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(bucket) = buckets.get_mut(identity) else {
            buckets.insert(
                identity.to_string(),
                Bucket {
                    tokens: self.burst - 1.0,
                    last_check: now,
                },
            );
            return true;
        };

        let elapsed = now.saturating_duration_since(bucket.last_check).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last_check = now;

        if bucket.tokens < 1.0 {
            return false;
        }
        bucket.tokens -= 1.0;
        true
    }

    /// Drop identities idle for longer than the idle window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) evaluated at `now`. Returns the number removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_check) <= self.idle_window);
        before - buckets.len()
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sweep every `interval` until `cancel` fires.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!("Rate limiter swept {} idle clients, {} remain", removed, limiter.tracked());
                        }
                    }
                }
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::REQUESTS_PER_SECOND, RateLimitConfig::BURST)
    }
}
