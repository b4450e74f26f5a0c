//! Periodic background refresh of snapshot caches.

use super::snapshot::{RecordSource, SnapshotCache};
use crate::cancel::CancellationToken;
use crate::{PlughubError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

/// A cache the scheduler can refresh.
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn name(&self) -> &str;

    async fn refresh_now(&self, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
impl<S: RecordSource> Refreshable for SnapshotCache<S> {
    fn name(&self) -> &str {
        self.kind()
    }

    async fn refresh_now(&self, cancel: &CancellationToken) -> Result<()> {
        self.refresh(cancel).await
    }
}

/// Refreshes its targets, in registration order, once per interval.
pub struct RefreshScheduler {
    targets: Vec<Arc<dyn Refreshable>>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            targets: Vec::new(),
            interval,
        }
    }

    pub fn with_target(mut self, target: Arc<dyn Refreshable>) -> Self {
        self.targets.push(target);
        self
    }

    /// Refresh every target once. Failures are logged and do not stop the
    /// remaining targets.
    pub async fn run_once(&self, cancel: &CancellationToken) {
        for target in &self.targets {
            if cancel.is_cancelled() {
                return;
            }
            match target.refresh_now(cancel).await {
                Ok(()) => {}
                Err(PlughubError::Cancelled) => {
                    debug!("Scheduled {} refresh cancelled", target.name());
                }
                Err(e) if e.is_retryable() => error!(
                    "Scheduled {} refresh failed, retrying next cycle: {}",
                    target.name(),
                    e
                ),
                Err(e) => error!("Scheduled {} refresh failed: {}", target.name(), e),
            }
        }
    }

    /// Start the background loop. The first run happens one interval from
    /// now; the loop exits when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = time::Instant::now() + self.interval;
            let mut ticker = time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                "Refresh scheduler started ({} targets, every {}s)",
                self.targets.len(),
                self.interval.as_secs()
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => self.run_once(&cancel).await,
                }
            }

            info!("Refresh scheduler stopped");
        })
    }
}
