//! Git hosting provider clients.
//!
//! Every backend implements [`ProviderClient`]: list a repository path,
//! fetch a raw file, and report the last commit touching a path. The
//! [`ClientRegistry`] picks a backend per hostname from the static
//! [`KNOWN_HOSTS`](crate::config::KNOWN_HOSTS) table and memoizes it.

mod gitea;
mod github;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod registry;

pub use gitea::GiteaProvider;
pub use github::GitHubProvider;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryProvider;
pub use registry::ClientRegistry;

use crate::config::normalize_host;
use crate::models::RepoContent;
use crate::{PlughubError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Capability interface of a git hosting backend.
///
/// Implementations perform exactly one outbound request per call and report
/// every failure as a [`PlughubError`]; callers decide whether the failure
/// is fatal to the run or only to the entry being enriched.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Hostname this client talks to.
    fn host(&self) -> &str;

    /// List the items at `path` (empty for the repository root).
    async fn list_contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoContent>>;

    /// Fetch raw file bytes from a `download_url` returned by `list_contents`.
    async fn fetch_file(&self, download_url: &str) -> Result<Bytes>;

    /// Timestamp of the most recent commit touching `path`.
    async fn last_commit(&self, owner: &str, repo: &str, path: &str) -> Result<DateTime<Utc>>;
}

/// Host, owner and name of a repository, parsed from its web URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse `https://<host>/<owner>/<repo>` (an optional `.git` suffix is dropped).
    pub fn parse(repo_url: &str) -> Result<Self> {
        let invalid = |reason: &str| PlughubError::InvalidRepoUrl {
            url: repo_url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = url::Url::parse(repo_url.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) URL"));
        }
        let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;

        let segments: Vec<&str> = parsed.path().trim_matches('/').split('/').collect();
        match segments.as_slice() {
            &[owner, name] if !owner.is_empty() && !name.is_empty() => {
                let name = name.strip_suffix(".git").unwrap_or(name);
                if name.is_empty() {
                    return Err(invalid("empty repository name"));
                }
                Ok(Self {
                    host: normalize_host(host),
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(invalid("expected an owner/repo path")),
        }
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

/// Percent-encode each segment of a repository path, keeping the separators.
pub(crate) fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `{api_base}/repos/{owner}/{repo}/contents[/{path}]`, shared by the
/// GitHub and Gitea dialects.
pub(crate) fn contents_url(api_base: &str, owner: &str, repo: &str, path: &str) -> String {
    let mut url = format!(
        "{}/repos/{}/{}/contents",
        api_base.trim_end_matches('/'),
        urlencoding::encode(owner),
        urlencoding::encode(repo)
    );
    let path = encode_path(path);
    if !path.is_empty() {
        url.push('/');
        url.push_str(&path);
    }
    url
}

/// One element of a commit history response.
#[derive(Debug, Deserialize)]
pub(crate) struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    committer: Option<CommitSignature>,
    #[serde(default)]
    author: Option<CommitSignature>,
}

#[derive(Debug, Deserialize)]
struct CommitSignature {
    #[serde(default)]
    date: Option<DateTime<Utc>>,
}

/// Committer time of the newest commit, falling back to its author time.
pub(crate) fn newest_commit_time(host: &str, path: &str, entries: Vec<CommitEntry>) -> Result<DateTime<Utc>> {
    entries
        .into_iter()
        .next()
        .and_then(|entry| {
            let CommitDetail { committer, author } = entry.commit;
            committer
                .and_then(|s| s.date)
                .or_else(|| author.and_then(|s| s.date))
        })
        .ok_or_else(|| PlughubError::Provider {
            host: host.to_string(),
            status: None,
            message: format!("no commit history for '{}'", path),
        })
}
