//! Enrichment pipeline.
//!
//! Lists the canonical registry, then enriches every entry with data from
//! its own repository. Per-entry failures are folded into the
//! [`FetchReport::skipped`] side channel; only a failure to list the
//! canonical registry (or cancellation) fails the run.

mod plugins;
mod themes;

use crate::cancel::CancellationToken;
use crate::config::{NetworkConfig, RegistryLocation};
use crate::error::EntryError;
use crate::models::RepoContent;
use crate::provider::{ClientRegistry, ProviderClient};
use crate::{PlughubError, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Records produced by one pipeline run plus the entries left out of it.
#[derive(Debug)]
pub struct FetchReport<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedEntry>,
}

impl<T> FetchReport<T> {
    /// Entries attempted in this run, kept or not.
    pub fn attempted(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

/// A registry entry dropped from this run and why.
#[derive(Debug)]
pub struct SkippedEntry {
    /// Entry id, or the registry file/directory name when the entry could not be parsed.
    pub entry: String,
    pub reason: EntryError,
}

impl SkippedEntry {
    pub fn notice(&self) -> SkipNotice {
        SkipNotice {
            entry: self.entry.clone(),
            reason: self.reason.to_string(),
        }
    }
}

/// Serializable summary of a [`SkippedEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipNotice {
    pub entry: String,
    pub reason: String,
}

/// Orchestrates provider clients to build plugin and theme records.
pub struct EnrichmentPipeline {
    clients: Arc<ClientRegistry>,
    location: RegistryLocation,
    concurrency: usize,
}

impl EnrichmentPipeline {
    /// Pipeline over the default canonical registry.
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self {
            clients,
            location: RegistryLocation::default(),
            concurrency: NetworkConfig::ENRICH_CONCURRENCY,
        }
    }

    pub fn with_location(mut self, location: RegistryLocation) -> Self {
        self.location = location;
        self
    }

    /// Maximum entries enriched at once (at least one).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// List a directory of the canonical registry.
    ///
    /// Any failure here means no entry can even be attempted, so it is
    /// reported as [`PlughubError::SourceUnavailable`].
    async fn list_canonical(
        &self,
        dir: &str,
        cancel: &CancellationToken,
    ) -> Result<(Arc<dyn ProviderClient>, Vec<RepoContent>)> {
        let source = format!("{}/{}", self.location.label(), dir);
        let client = self
            .clients
            .get_client(&self.location.host)
            .map_err(|e| PlughubError::source_unavailable(&source, e))?;

        let listing = guarded(
            cancel,
            client.list_contents(&self.location.owner, &self.location.repo, dir),
        )
        .await
        .map_err(|e| match e {
            PlughubError::Cancelled => e,
            other => PlughubError::source_unavailable(&source, other),
        })?;

        Ok((client, listing))
    }
}

/// Run a provider call, abandoning it as soon as `cancel` fires.
async fn guarded<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    cancel.run_until_cancelled(fut).await?
}

/// Split per-entry outcomes into kept records and skip notices.
///
/// A cancelled entry cancels the whole run.
fn fold_outcomes<T>(kind: &str, outcomes: Vec<(String, std::result::Result<T, EntryError>)>) -> Result<FetchReport<T>> {
    let mut report = FetchReport {
        records: Vec::with_capacity(outcomes.len()),
        skipped: Vec::new(),
    };

    for (entry, outcome) in outcomes {
        match outcome {
            Ok(record) => report.records.push(record),
            Err(EntryError::Cancelled) => return Err(PlughubError::Cancelled),
            Err(reason) => {
                warn!("Skipping {} {}: {}", kind, entry, reason);
                report.skipped.push(SkippedEntry { entry, reason });
            }
        }
    }

    Ok(report)
}

/// Map a failed manifest lookup: 404 means the file is missing, anything
/// else is a provider failure.
fn manifest_lookup_error(err: PlughubError, file: &str, path: String) -> EntryError {
    if err.status() == Some(404) {
        EntryError::ManifestMissing {
            file: file.to_string(),
            path,
        }
    } else {
        EntryError::from(err)
    }
}

/// Map a failed commit lookup, keeping cancellation distinct.
fn commit_lookup_error(err: PlughubError) -> EntryError {
    match err {
        PlughubError::Cancelled => EntryError::Cancelled,
        other => EntryError::CommitUnavailable {
            message: other.to_string(),
        },
    }
}
