//! Wiring of the client registry, pipeline and caches into one handle.

use crate::cache::{PluginCache, PluginSource, RefreshScheduler, ThemeCache, ThemeSource};
use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, ProviderCredentials, RegistryLocation};
use crate::pipeline::EnrichmentPipeline;
use crate::provider::ClientRegistry;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`Catalog`].
///
/// # Example
///
/// ```rust,ignore
/// use plughub_core::{Catalog, CancellationToken, ProviderCredentials};
///
/// let catalog = Catalog::builder()
///     .credentials(ProviderCredentials::new().with_token("github.com", token))
///     .build();
/// catalog.initialize(&CancellationToken::new()).await?;
/// ```
pub struct CatalogBuilder {
    credentials: ProviderCredentials,
    location: RegistryLocation,
    concurrency: usize,
    clients: Option<Arc<ClientRegistry>>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self {
            credentials: ProviderCredentials::default(),
            location: RegistryLocation::default(),
            concurrency: NetworkConfig::ENRICH_CONCURRENCY,
            clients: None,
        }
    }

    /// Bearer tokens per host. Ignored when a client registry is supplied.
    pub fn credentials(mut self, credentials: ProviderCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Canonical registry to read from.
    ///
    /// Default: `github.com/AvengeMedia/dms-plugin-registry@main`
    pub fn location(mut self, location: RegistryLocation) -> Self {
        self.location = location;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Use an existing client registry, e.g. one with fixture providers registered.
    pub fn client_registry(mut self, clients: Arc<ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn build(self) -> Catalog {
        let clients = self
            .clients
            .unwrap_or_else(|| Arc::new(ClientRegistry::new(self.credentials)));
        let pipeline = Arc::new(
            EnrichmentPipeline::new(clients.clone())
                .with_location(self.location)
                .with_concurrency(self.concurrency),
        );

        Catalog {
            clients,
            plugins: Arc::new(PluginCache::new(PluginSource::new(pipeline.clone()))),
            themes: Arc::new(ThemeCache::new(ThemeSource::new(pipeline))),
        }
    }
}

impl Default for CatalogBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Plugin and theme caches sharing one pipeline and client registry.
#[derive(Clone)]
pub struct Catalog {
    clients: Arc<ClientRegistry>,
    plugins: Arc<PluginCache>,
    themes: Arc<ThemeCache>,
}

impl Catalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::new()
    }

    pub fn plugins(&self) -> &Arc<PluginCache> {
        &self.plugins
    }

    pub fn themes(&self) -> &Arc<ThemeCache> {
        &self.themes
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// Fill the plugin cache, then the theme cache. Stops at the first failure.
    pub async fn initialize(&self, cancel: &CancellationToken) -> Result<()> {
        self.plugins.initialize(cancel).await?;
        self.themes.initialize(cancel).await
    }

    /// Scheduler refreshing plugins, then themes, every `interval`.
    pub fn scheduler(&self, interval: Duration) -> RefreshScheduler {
        RefreshScheduler::new(interval)
            .with_target(self.plugins.clone())
            .with_target(self.themes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryProvider;
    use crate::PlughubError;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_initialize_fills_both_caches() {
        let github = Arc::new(MemoryProvider::new("github.com"));
        github.add_json(
            "AvengeMedia",
            "dms-plugin-registry",
            "themes/nord/theme.json",
            &json!({"id": "nord", "name": "Nord", "version": "1.0.0"}),
        );
        github.add_file("AvengeMedia", "dms-plugin-registry", "plugins/.keep.json", "{}");
        github.set_commit(
            "AvengeMedia",
            "dms-plugin-registry",
            "",
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        );

        let clients = Arc::new(ClientRegistry::default());
        clients.register("github.com", github);
        let catalog = Catalog::builder().client_registry(clients).build();

        catalog.initialize(&CancellationToken::new()).await.unwrap();
        assert!(catalog.plugins().is_ready());
        assert!(catalog.themes().is_ready());
        assert_eq!(catalog.themes().read().len(), 1);
        // `.keep.json` parses but has no repo URL.
        assert_eq!(catalog.plugins().read().skipped().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_stops_at_plugins() {
        let github = Arc::new(MemoryProvider::new("github.com"));
        github.set_unavailable(true);
        let clients = Arc::new(ClientRegistry::default());
        clients.register("github.com", github.clone());
        let catalog = Catalog::builder().client_registry(clients).build();

        let err = catalog.initialize(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PlughubError::SourceUnavailable { .. }));
        assert!(!catalog.themes().is_ready());
        assert_eq!(github.request_count(), 1);
    }
}
