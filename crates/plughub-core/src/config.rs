//! Centralized configuration for plughub.
//!
//! Constants for network operations, the canonical registry layout, refresh
//! scheduling and request rate limiting, plus the static table of git hosts
//! the enrichment pipeline knows how to talk to.

use std::collections::HashMap;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str = concat!("plughub/", env!("CARGO_PKG_VERSION"));
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const CODEBERG_API_BASE: &'static str = "https://codeberg.org/api/v1";
    /// Maximum registry entries enriched concurrently within one run.
    pub const ENRICH_CONCURRENCY: usize = 8;
    /// Pause before a request once the upstream quota runs low.
    pub const THROTTLE_DELAY: Duration = Duration::from_millis(500);
}

/// Canonical registry layout and refresh scheduling.
pub struct RegistryConfig;

impl RegistryConfig {
    pub const CANONICAL_HOST: &'static str = "github.com";
    pub const CANONICAL_OWNER: &'static str = "AvengeMedia";
    pub const CANONICAL_REPO: &'static str = "dms-plugin-registry";
    pub const CANONICAL_BRANCH: &'static str = "main";
    pub const PLUGINS_DIR: &'static str = "plugins";
    pub const THEMES_DIR: &'static str = "themes";
    pub const MANIFEST_FILE: &'static str = "plugin.json";
    pub const THEME_FILE: &'static str = "theme.json";
    pub const PREVIEW_FILE: &'static str = "preview.svg";
    pub const RAW_CONTENT_BASE: &'static str = "https://raw.githubusercontent.com";
    pub const REFRESH_INTERVAL: Duration = Duration::from_secs(600);
}

/// Inbound request rate limiting.
pub struct RateLimitConfig;

impl RateLimitConfig {
    pub const REQUESTS_PER_SECOND: f64 = 10.0;
    pub const BURST: u32 = 20;
    /// Both the sweep period and the idle window after which an identity is forgotten.
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
    pub const RETRY_AFTER_SECS: u64 = 1;
}

/// Location of the canonical registry repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLocation {
    pub host: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl RegistryLocation {
    pub fn new(
        host: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// Human-readable `host/owner/repo` label used in logs and errors.
    pub fn label(&self) -> String {
        format!("{}/{}/{}", self.host, self.owner, self.repo)
    }
}

impl Default for RegistryLocation {
    fn default() -> Self {
        Self::new(
            RegistryConfig::CANONICAL_HOST,
            RegistryConfig::CANONICAL_OWNER,
            RegistryConfig::CANONICAL_REPO,
            RegistryConfig::CANONICAL_BRANCH,
        )
    }
}

/// REST dialect spoken by a git host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    GitHub,
    Gitea,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Gitea => "gitea",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Construction parameters for one allow-listed host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEntry {
    pub host: &'static str,
    pub kind: ProviderKind,
    pub api_base: &'static str,
}

/// Hosts a registry entry's repository may live on.
pub const KNOWN_HOSTS: &[HostEntry] = &[
    HostEntry {
        host: "github.com",
        kind: ProviderKind::GitHub,
        api_base: NetworkConfig::GITHUB_API_BASE,
    },
    HostEntry {
        host: "codeberg.org",
        kind: ProviderKind::Gitea,
        api_base: NetworkConfig::CODEBERG_API_BASE,
    },
];

/// Normalize a hostname for table lookups: lowercase, no `www.` prefix.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Look up a host in [`KNOWN_HOSTS`].
pub fn lookup_host(host: &str) -> Option<&'static HostEntry> {
    let host = normalize_host(host);
    KNOWN_HOSTS.iter().find(|entry| entry.host == host)
}

/// Bearer tokens for hosts that have one configured.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    tokens: HashMap<String, String>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a token to `host`. Empty tokens are ignored so unset env vars
    /// leave the host anonymous.
    pub fn with_token(mut self, host: &str, token: impl Into<String>) -> Self {
        let token = token.into();
        if !token.trim().is_empty() {
            self.tokens.insert(normalize_host(host), token.trim().to_string());
        }
        self
    }

    pub fn token_for(&self, host: &str) -> Option<&str> {
        self.tokens.get(&normalize_host(host)).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_hosts() {
        let github = lookup_host("github.com").expect("github should be known");
        assert_eq!(github.kind, ProviderKind::GitHub);
        assert_eq!(github.api_base, "https://api.github.com");

        let codeberg = lookup_host("WWW.Codeberg.org").expect("codeberg should be known");
        assert_eq!(codeberg.kind, ProviderKind::Gitea);

        assert!(lookup_host("gitlab.com").is_none());
    }

    #[test]
    fn test_credentials_skip_empty_tokens() {
        let creds = ProviderCredentials::new()
            .with_token("github.com", "ghp_abc")
            .with_token("codeberg.org", "  ");
        assert_eq!(creds.token_for("GitHub.com"), Some("ghp_abc"));
        assert_eq!(creds.token_for("codeberg.org"), None);
    }

    #[test]
    fn test_default_registry_location() {
        let location = RegistryLocation::default();
        assert_eq!(location.label(), "github.com/AvengeMedia/dms-plugin-registry");
        assert_eq!(location.branch, "main");
    }

    #[test]
    fn test_intervals_are_reasonable() {
        assert_eq!(RegistryConfig::REFRESH_INTERVAL, Duration::from_secs(600));
        assert_eq!(RateLimitConfig::SWEEP_INTERVAL, Duration::from_secs(300));
        assert!(NetworkConfig::REQUEST_TIMEOUT > Duration::ZERO);
    }
}
