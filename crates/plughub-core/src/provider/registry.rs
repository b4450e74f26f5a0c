//! Lazily built, memoized provider clients keyed by hostname.

use super::{GitHubProvider, GiteaProvider, ProviderClient};
use crate::config::{lookup_host, normalize_host, HostEntry, ProviderCredentials, ProviderKind};
use crate::network::HttpClient;
use crate::{PlughubError, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Registry of provider clients.
///
/// One client is created per host the first time it is asked for and kept
/// for the lifetime of the process. Hosts outside the allow-list fail with
/// [`PlughubError::UnsupportedHost`].
pub struct ClientRegistry {
    credentials: ProviderCredentials,
    clients: RwLock<HashMap<String, Arc<dyn ProviderClient>>>,
}

impl ClientRegistry {
    pub fn new(credentials: ProviderCredentials) -> Self {
        Self {
            credentials,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Install a client for `host`, replacing any memoized one.
    ///
    /// Used to route a host to an alternate backend, such as an in-memory
    /// fixture provider.
    pub fn register(&self, host: &str, client: Arc<dyn ProviderClient>) {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_host(host), client);
    }

    /// Get or create the client for `host`.
    pub fn get_client(&self, host: &str) -> Result<Arc<dyn ProviderClient>> {
        let host = normalize_host(host);

        // Check cache first
        {
            let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(client) = clients.get(&host) {
                return Ok(client.clone());
            }
        }

        let entry = lookup_host(&host).ok_or_else(|| PlughubError::UnsupportedHost { host: host.clone() })?;
        let client = self.build_client(entry)?;

        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have raced us here; keep whichever landed first.
        Ok(clients.entry(host).or_insert(client).clone())
    }

    /// Hosts with a client created so far.
    pub fn active_hosts(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut hosts: Vec<String> = clients.keys().cloned().collect();
        hosts.sort();
        hosts
    }

    fn build_client(&self, entry: &HostEntry) -> Result<Arc<dyn ProviderClient>> {
        let token = self.credentials.token_for(entry.host).map(str::to_string);
        debug!(
            "Creating {} client for {} ({})",
            entry.kind,
            entry.host,
            if token.is_some() { "authenticated" } else { "anonymous" }
        );

        let http = HttpClient::new(entry.host, token)?;
        Ok(match entry.kind {
            ProviderKind::GitHub => Arc::new(GitHubProvider::new(http, entry.api_base)),
            ProviderKind::Gitea => Arc::new(GiteaProvider::new(http, entry.api_base)),
        })
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(ProviderCredentials::default())
    }
}
