//! GitHub REST backend.

use super::{contents_url, encode_path, newest_commit_time, CommitEntry, ProviderClient};
use crate::models::{ContentsResponse, RepoContent};
use crate::network::HttpClient;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

const ACCEPT: &str = "application/vnd.github.v3+json";

/// Client for `api.github.com` style endpoints.
pub struct GitHubProvider {
    http: HttpClient,
    api_base: String,
}

impl GitHubProvider {
    pub fn new(http: HttpClient, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into(),
        }
    }

    fn commits_url(&self, owner: &str, repo: &str, path: &str) -> String {
        let mut url = format!(
            "{}/repos/{}/{}/commits?per_page=1",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        );
        let path = encode_path(path);
        if !path.is_empty() {
            url.push_str("&path=");
            url.push_str(&path);
        }
        url
    }
}

#[async_trait]
impl ProviderClient for GitHubProvider {
    fn host(&self) -> &str {
        self.http.host()
    }

    async fn list_contents(&self, owner: &str, repo: &str, path: &str) -> Result<Vec<RepoContent>> {
        let url = contents_url(&self.api_base, owner, repo, path);
        let response: ContentsResponse = self.http.get_json(&url, ACCEPT).await?;
        Ok(response.into_vec())
    }

    async fn fetch_file(&self, download_url: &str) -> Result<Bytes> {
        self.http.get_bytes(download_url).await
    }

    async fn last_commit(&self, owner: &str, repo: &str, path: &str) -> Result<DateTime<Utc>> {
        let url = self.commits_url(owner, repo, path);
        let entries: Vec<CommitEntry> = self.http.get_json(&url, ACCEPT).await?;
        newest_commit_time(self.host(), path, entries)
    }
}
