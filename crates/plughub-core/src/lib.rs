//! Plughub Core - aggregation cache for community plugin and theme registries.
//!
//! Discovers entries in a canonical registry repository, enriches each one
//! with the manifest and last commit of its own repository, and keeps the
//! result as an in-memory snapshot that is rebuilt on a schedule. The crate
//! has no HTTP server of its own; see `plughub-server` for that.
//!
//! # Example
//!
//! ```rust,ignore
//! use plughub_core::{Catalog, CancellationToken, FilterOptions, SortBy};
//!
//! #[tokio::main]
//! async fn main() -> plughub_core::Result<()> {
//!     let catalog = Catalog::builder().build();
//!     let cancel = CancellationToken::new();
//!     catalog.initialize(&cancel).await?;
//!
//!     let options = FilterOptions {
//!         compositor: "niri".into(),
//!         ..Default::default()
//!     };
//!     let plugins = catalog.plugins().list_plugins(&options, SortBy::Name);
//!     println!("Found {} plugins", plugins.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod ratelimit;

// Re-export commonly used types
pub use cache::{PluginCache, RefreshScheduler, Refreshable, Snapshot, SnapshotCache, ThemeCache};
pub use cancel::{CancellationToken, CancelledError};
pub use catalog::{Catalog, CatalogBuilder};
pub use config::{ProviderCredentials, RegistryLocation};
pub use error::{EntryError, PlughubError, Result};
pub use models::{CatalogRecord, Plugin, Theme};
pub use pipeline::{EnrichmentPipeline, FetchReport, SkipNotice, SkippedEntry};
pub use provider::{ClientRegistry, ProviderClient, RepoRef};
pub use query::{FilterOptions, SortBy};
pub use ratelimit::RateLimiter;
