//! Snapshot caches for enriched records.

use crate::cancel::CancellationToken;
use crate::models::{CatalogRecord, Plugin, Theme};
use crate::pipeline::{EnrichmentPipeline, FetchReport, SkipNotice};
use crate::{PlughubError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Immutable result of one successful pipeline run.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    records: Vec<T>,
    last_update: Option<DateTime<Utc>>,
    skipped: Vec<SkipNotice>,
}

impl<T> Snapshot<T> {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            last_update: None,
            skipped: Vec::new(),
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Completion time of the run that produced this snapshot.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    /// True once a run has succeeded.
    pub fn is_ready(&self) -> bool {
        self.last_update.is_some()
    }

    /// Entries left out of the run that produced this snapshot.
    pub fn skipped(&self) -> &[SkipNotice] {
        &self.skipped
    }
}

/// Something a [`SnapshotCache`] can be filled from.
#[async_trait]
pub trait RecordSource: Send + Sync + 'static {
    type Record: CatalogRecord;

    /// Entity kind, used in logs and errors.
    fn kind(&self) -> &'static str;

    async fn fetch(&self, cancel: &CancellationToken) -> Result<FetchReport<Self::Record>>;
}

/// Plugins from the enrichment pipeline.
pub struct PluginSource(Arc<EnrichmentPipeline>);

impl PluginSource {
    pub fn new(pipeline: Arc<EnrichmentPipeline>) -> Self {
        Self(pipeline)
    }
}

#[async_trait]
impl RecordSource for PluginSource {
    type Record = Plugin;

    fn kind(&self) -> &'static str {
        "plugins"
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<FetchReport<Plugin>> {
        self.0.fetch_plugins(cancel).await
    }
}

/// Themes from the enrichment pipeline.
pub struct ThemeSource(Arc<EnrichmentPipeline>);

impl ThemeSource {
    pub fn new(pipeline: Arc<EnrichmentPipeline>) -> Self {
        Self(pipeline)
    }
}

#[async_trait]
impl RecordSource for ThemeSource {
    type Record = Theme;

    fn kind(&self) -> &'static str {
        "themes"
    }

    async fn fetch(&self, cancel: &CancellationToken) -> Result<FetchReport<Theme>> {
        self.0.fetch_themes(cancel).await
    }
}

/// Holds the latest successful snapshot for one entity kind.
///
/// Readers clone an `Arc` under a short read lock and never wait on a
/// refresh; the write lock is only taken for the swap itself. Refresh runs
/// are serialized so an older run can never overwrite a newer one.
pub struct SnapshotCache<S: RecordSource> {
    source: S,
    current: RwLock<Arc<Snapshot<S::Record>>>,
    refresh_lock: Mutex<()>,
}

pub type PluginCache = SnapshotCache<PluginSource>;
pub type ThemeCache = SnapshotCache<ThemeSource>;

impl<S: RecordSource> SnapshotCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(Snapshot::empty())),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    /// First fill, before serving starts. An error here means there is
    /// nothing to serve.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Initializing {} cache", self.kind());
        self.refresh(cancel).await
    }

    /// Run the pipeline and swap in its result. On failure the held
    /// snapshot and its `last_update` stay as they were.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<()> {
        let _running = self.refresh_lock.lock().await;
        let started = Instant::now();

        let report = match self.source.fetch(cancel).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Refresh of {} cache failed: {}", self.kind(), e);
                return Err(e);
            }
        };

        let snapshot = Snapshot {
            skipped: report.skipped.iter().map(|s| s.notice()).collect(),
            records: report.records,
            last_update: Some(Utc::now()),
        };
        let count = snapshot.len();
        let skipped = snapshot.skipped.len();

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        info!(
            "Refreshed {} cache: {} records, {} skipped in {:.1}s",
            self.kind(),
            count,
            skipped,
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Current snapshot. The handle stays valid across later refreshes.
    pub fn read(&self) -> Arc<Snapshot<S::Record>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current snapshot, or [`PlughubError::NotReady`] before the first
    /// successful refresh.
    pub fn ready_snapshot(&self) -> Result<Arc<Snapshot<S::Record>>> {
        let snapshot = self.read();
        if snapshot.is_ready() {
            Ok(snapshot)
        } else {
            Err(PlughubError::NotReady {
                kind: self.kind().to_string(),
            })
        }
    }

    pub fn is_ready(&self) -> bool {
        self.read().is_ready()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.read().last_update()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntryError;
    use crate::pipeline::SkippedEntry;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    struct Record {
        id: String,
    }

    impl CatalogRecord for Record {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            &self.id
        }
        fn version(&self) -> &str {
            "1.0.0"
        }
        fn updated_at(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        }
    }

    #[derive(Default)]
    struct FakeSource {
        fail: AtomicBool,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl RecordSource for Arc<FakeSource> {
        type Record = Record;

        fn kind(&self) -> &'static str {
            "records"
        }

        async fn fetch(&self, _cancel: &CancellationToken) -> Result<FetchReport<Record>> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlughubError::source_unavailable(
                    "records",
                    PlughubError::Provider {
                        host: "github.com".into(),
                        status: Some(502),
                        message: "bad gateway".into(),
                    },
                ));
            }
            Ok(FetchReport {
                records: (0..run).map(|i| Record { id: format!("r{}", i) }).collect(),
                skipped: vec![SkippedEntry {
                    entry: "broken".into(),
                    reason: EntryError::MissingField { field: "version" },
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_empty_until_first_refresh() {
        let cache = SnapshotCache::new(Arc::new(FakeSource::default()));
        assert!(!cache.is_ready());
        assert!(cache.read().is_empty());
        assert!(cache.last_update().is_none());
        assert!(matches!(cache.ready_snapshot(), Err(PlughubError::NotReady { .. })));

        cache.initialize(&CancellationToken::new()).await.unwrap();
        assert!(cache.is_ready());
        assert_eq!(cache.read().len(), 1);
        assert_eq!(cache.read().skipped()[0].entry, "broken");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(FakeSource::default());
        let cache = SnapshotCache::new(source.clone());
        let cancel = CancellationToken::new();
        cache.refresh(&cancel).await.unwrap();
        let before = cache.read();
        let last_update = cache.last_update();

        source.fail.store(true, Ordering::SeqCst);
        assert!(cache.refresh(&cancel).await.is_err());
        assert_eq!(cache.last_update(), last_update);
        assert!(Arc::ptr_eq(&before, &cache.read()));
    }

    #[tokio::test]
    async fn test_reader_handle_survives_swap() {
        let cache = SnapshotCache::new(Arc::new(FakeSource::default()));
        let cancel = CancellationToken::new();
        cache.refresh(&cancel).await.unwrap();
        let held = cache.read();

        cache.refresh(&cancel).await.unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(cache.read().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_initialize_is_not_ready() {
        let source = Arc::new(FakeSource::default());
        source.fail.store(true, Ordering::SeqCst);
        let cache = SnapshotCache::new(source);
        let err = cache.initialize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PlughubError::SourceUnavailable { .. }));
        assert!(!cache.is_ready());
    }
}
