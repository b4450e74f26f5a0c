//! In-memory provider backend serving fixture repositories.
//!
//! Files are addressed as `owner/repo/path`; directories exist implicitly
//! through the files below them. Commit times are looked up for the exact
//! path first and then for each parent directory up to the repository root.

use super::ProviderClient;
use crate::models::{ContentKind, RepoContent};
use crate::{PlughubError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

const SCHEME: &str = "memory://";

#[derive(Default)]
struct RepoFixture {
    files: BTreeMap<String, Bytes>,
    commits: HashMap<String, DateTime<Utc>>,
}

/// Provider backed by in-memory fixtures.
pub struct MemoryProvider {
    host: String,
    repos: RwLock<HashMap<String, RepoFixture>>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    requests: AtomicUsize,
}

impl MemoryProvider {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            repos: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    /// Add or replace a file.
    pub fn add_file(&self, owner: &str, repo: &str, path: &str, contents: impl Into<Bytes>) {
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        repos
            .entry(repo_key(owner, repo))
            .or_default()
            .files
            .insert(clean(path).to_string(), contents.into());
    }

    /// Add or replace a file holding `value` serialized as JSON.
    pub fn add_json(&self, owner: &str, repo: &str, path: &str, value: &serde_json::Value) {
        self.add_file(owner, repo, path, value.to_string());
    }

    pub fn remove_file(&self, owner: &str, repo: &str, path: &str) {
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(fixture) = repos.get_mut(&repo_key(owner, repo)) {
            fixture.files.remove(clean(path));
        }
    }

    /// Record the last commit time for `path` (empty for the whole repository).
    pub fn set_commit(&self, owner: &str, repo: &str, path: &str, at: DateTime<Utc>) {
        let mut repos = self.repos.write().unwrap_or_else(PoisonError::into_inner);
        repos
            .entry(repo_key(owner, repo))
            .or_default()
            .commits
            .insert(clean(path).to_string(), at);
    }

    /// Make every call fail with HTTP 503 until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis().min(u64::MAX as u128) as u64, Ordering::SeqCst);
    }

    /// Number of calls served, including failed ones.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn download_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!("{}{}/{}/{}/{}", SCHEME, self.host, owner, repo, path)
    }

    async fn begin_request(&self) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(self.error(Some(503), "service unavailable".to_string()));
        }
        Ok(())
    }

    fn error(&self, status: Option<u16>, message: String) -> PlughubError {
        PlughubError::Provider {
            host: self.host.clone(),
            status,
            message,
        }
    }

    fn not_found(&self, what: String) -> PlughubError {
        self.error(Some(404), format!("{} not found", what))
    }
}

#[async_trait]
impl ProviderClient for MemoryProvider {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoContent>> {
        self.begin_request().await?;
        let path = clean(path);
        let repos = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        let fixture = repos
            .get(&repo_key(owner, repo))
            .ok_or_else(|| self.not_found(repo_key(owner, repo)))?;

        if fixture.files.contains_key(path) {
            return Ok(vec![RepoContent {
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                path: path.to_string(),
                kind: ContentKind::File,
                download_url: Some(self.download_url(owner, repo, path)),
                url: None,
            }]);
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        let mut children: BTreeMap<String, ContentKind> = BTreeMap::new();
        for key in fixture.files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir.to_string(), ContentKind::Dir);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(ContentKind::File);
                }
            }
        }

        if children.is_empty() {
            return Err(self.not_found(format!("{}/{}", repo_key(owner, repo), path)));
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| {
                let child_path = format!("{}{}", prefix, name);
                RepoContent {
                    download_url: (kind == ContentKind::File)
                        .then(|| self.download_url(owner, repo, &child_path)),
                    name,
                    path: child_path,
                    kind,
                    url: None,
                }
            })
            .collect())
    }

    async fn fetch_file(&self, download_url: &str) -> Result<Bytes> {
        self.begin_request().await?;
        let location = download_url
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(self.host.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| self.error(None, format!("foreign download URL {}", download_url)))?;

        let mut parts = location.splitn(3, '/');
        let (owner, repo, path) = match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), Some(path)) => (owner, repo, path),
            _ => return Err(self.not_found(download_url.to_string())),
        };

        let repos = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        repos
            .get(&repo_key(owner, repo))
            .and_then(|fixture| fixture.files.get(path))
            .cloned()
            .ok_or_else(|| self.not_found(download_url.to_string()))
    }

    async fn last_commit(&self, owner: &str, repo: &str, path: &str) -> Result<DateTime<Utc>> {
        self.begin_request().await?;
        let repos = self.repos.read().unwrap_or_else(PoisonError::into_inner);
        let fixture = repos
            .get(&repo_key(owner, repo))
            .ok_or_else(|| self.not_found(repo_key(owner, repo)))?;

        let mut current = clean(path);
        loop {
            if let Some(at) = fixture.commits.get(current) {
                return Ok(*at);
            }
            if current.is_empty() {
                break;
            }
            current = current.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        }

        Err(self.error(None, format!("no commit history for '{}'", path)))
    }
}

fn repo_key(owner: &str, repo: &str) -> String {
    format!("{}/{}", owner, repo)
}

fn clean(path: &str) -> &str {
    path.trim_matches('/')
}
