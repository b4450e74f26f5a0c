//! Theme enrichment. Themes live entirely inside the canonical registry as
//! `themes/<name>/theme.json` with a sibling `preview.svg`.

use super::{commit_lookup_error, fold_outcomes, guarded, manifest_lookup_error, EnrichmentPipeline, FetchReport};
use crate::cancel::CancellationToken;
use crate::config::RegistryConfig;
use crate::error::EntryError;
use crate::models::{Theme, ThemeManifest};
use crate::provider::ProviderClient;
use crate::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info};

impl EnrichmentPipeline {
    /// Fetch every theme directory in the canonical registry.
    pub async fn fetch_themes(&self, cancel: &CancellationToken) -> Result<FetchReport<Theme>> {
        let (canonical, listing) = self.list_canonical(RegistryConfig::THEMES_DIR, cancel).await?;

        let dirs: Vec<String> = listing
            .into_iter()
            .filter(|item| item.is_dir())
            .map(|item| item.name)
            .collect();
        debug!("Found {} theme directories", dirs.len());

        let outcomes = stream::iter(dirs)
            .map(|name| {
                let canonical = &canonical;
                async move {
                    let outcome = self.load_theme(canonical, &name, cancel).await;
                    (name, outcome)
                }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = fold_outcomes("theme", outcomes)?;
        info!(
            "Fetched {} themes ({} skipped)",
            report.records.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn load_theme(
        &self,
        client: &Arc<dyn ProviderClient>,
        name: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<Theme, EntryError> {
        let location = &self.location;
        let theme_dir = format!("{}/{}", RegistryConfig::THEMES_DIR, name);
        let theme_path = format!("{}/{}", theme_dir, RegistryConfig::THEME_FILE);
        let file = RegistryConfig::THEME_FILE;

        let contents = guarded(cancel, client.list_contents(&location.owner, &location.repo, &theme_path))
            .await
            .map_err(|e| manifest_lookup_error(e, file, format!("{}/{}", location.label(), theme_path)))?;

        let url = contents
            .into_iter()
            .find(|item| item.is_file())
            .and_then(|item| item.download_url)
            .ok_or_else(|| EntryError::ManifestMissing {
                file: file.to_string(),
                path: format!("{}/{}", location.label(), theme_path),
            })?;

        let bytes = guarded(cancel, client.fetch_file(&url)).await?;
        let manifest: ThemeManifest =
            serde_json::from_slice(&bytes).map_err(|e| EntryError::ManifestInvalid {
                file: file.to_string(),
                message: e.to_string(),
            })?;

        let updated_at = guarded(cancel, client.last_commit(&location.owner, &location.repo, &theme_dir))
            .await
            .map_err(commit_lookup_error)?;

        Theme::from_manifest(manifest, self.preview_url(&theme_dir), updated_at)
    }

    /// Raw-content URL of a theme's preview image.
    fn preview_url(&self, theme_dir: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            RegistryConfig::RAW_CONTENT_BASE,
            self.location.owner,
            self.location.repo,
            self.location.branch,
            theme_dir,
            RegistryConfig::PREVIEW_FILE
        )
    }
}
