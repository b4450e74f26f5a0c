//! Plugin enrichment: registry entry + `plugin.json` + last commit.

use super::{commit_lookup_error, fold_outcomes, guarded, manifest_lookup_error, EnrichmentPipeline, FetchReport};
use crate::cancel::CancellationToken;
use crate::config::RegistryConfig;
use crate::error::EntryError;
use crate::models::{Plugin, PluginManifest, RegistryPlugin, RepoContent};
use crate::provider::{ProviderClient, RepoRef};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

type EntryResult<T> = std::result::Result<T, EntryError>;

impl EnrichmentPipeline {
    /// Fetch every plugin listed in the canonical registry.
    pub async fn fetch_plugins(&self, cancel: &CancellationToken) -> Result<FetchReport<Plugin>> {
        let (canonical, listing) = self.list_canonical(RegistryConfig::PLUGINS_DIR, cancel).await?;

        let files: Vec<RepoContent> = listing
            .into_iter()
            .filter(|item| item.is_file() && item.name.ends_with(".json"))
            .collect();
        debug!("Found {} plugin registry files", files.len());

        let outcomes = stream::iter(files)
            .map(|file| self.load_plugin(&canonical, file, cancel))
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = fold_outcomes("plugin", outcomes)?;
        info!(
            "Fetched {} plugins ({} skipped)",
            report.records.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Parse one registry file and enrich it. Returns the label used for
    /// diagnostics alongside the outcome.
    async fn load_plugin(
        &self,
        canonical: &Arc<dyn ProviderClient>,
        file: RepoContent,
        cancel: &CancellationToken,
    ) -> (String, EntryResult<Plugin>) {
        let entry = match self.read_registry_entry(canonical, &file, cancel).await {
            Ok(entry) => entry,
            Err(e) => return (file.name, Err(e)),
        };
        let label = if entry.id.is_empty() { file.name } else { entry.id.clone() };
        (label, self.enrich_plugin(entry, cancel).await)
    }

    async fn read_registry_entry(
        &self,
        canonical: &Arc<dyn ProviderClient>,
        file: &RepoContent,
        cancel: &CancellationToken,
    ) -> EntryResult<RegistryPlugin> {
        let url = file.download_url.as_deref().ok_or_else(|| EntryError::Malformed {
            message: format!("{} has no download URL", file.path),
        })?;
        let bytes = guarded(cancel, canonical.fetch_file(url)).await?;
        serde_json::from_slice(&bytes).map_err(|e| EntryError::Malformed {
            message: format!("{}: {}", file.name, e),
        })
    }

    /// Merge a registry entry with its repository's manifest and last commit.
    pub async fn enrich_plugin(
        &self,
        entry: RegistryPlugin,
        cancel: &CancellationToken,
    ) -> EntryResult<Plugin> {
        let repo = RepoRef::parse(&entry.repo)?;
        let client = self.clients.get_client(&repo.host)?;

        let sub_path = entry.sub_path().to_string();
        let manifest_path = if sub_path.is_empty() {
            RegistryConfig::MANIFEST_FILE.to_string()
        } else {
            format!("{}/{}", sub_path, RegistryConfig::MANIFEST_FILE)
        };

        let manifest = self
            .read_manifest(&client, &repo, &manifest_path, cancel)
            .await?;

        let updated_at = guarded(cancel, client.last_commit(&repo.owner, &repo.name, &sub_path))
            .await
            .map_err(commit_lookup_error)?;

        Plugin::merge(entry, manifest, updated_at)
    }

    async fn read_manifest(
        &self,
        client: &Arc<dyn ProviderClient>,
        repo: &RepoRef,
        manifest_path: &str,
        cancel: &CancellationToken,
    ) -> EntryResult<PluginManifest> {
        let file = RegistryConfig::MANIFEST_FILE;
        let missing = || EntryError::ManifestMissing {
            file: file.to_string(),
            path: format!("{}/{}", repo, manifest_path),
        };

        let contents = guarded(cancel, client.list_contents(&repo.owner, &repo.name, manifest_path))
            .await
            .map_err(|e| manifest_lookup_error(e, file, format!("{}/{}", repo, manifest_path)))?;

        let url = contents
            .into_iter()
            .find(|item| item.is_file())
            .and_then(|item| item.download_url)
            .ok_or_else(missing)?;

        let bytes = guarded(cancel, client.fetch_file(&url)).await?;
        let manifest: PluginManifest =
            serde_json::from_slice(&bytes).map_err(|e| EntryError::ManifestInvalid {
                file: file.to_string(),
                message: e.to_string(),
            })?;

        if manifest.version.trim().is_empty() {
            return Err(EntryError::MissingVersion {
                file: file.to_string(),
            });
        }

        Ok(manifest)
    }
}
