//! Snapshot caches and the scheduler that keeps them fresh.
//!
//! One [`SnapshotCache`] per entity kind holds the latest complete pipeline
//! result. Nothing is persisted; every process start rebuilds from upstream.

mod scheduler;
mod snapshot;

pub use scheduler::{RefreshScheduler, Refreshable};
pub use snapshot::{
    PluginCache, PluginSource, RecordSource, Snapshot, SnapshotCache, ThemeCache, ThemeSource,
};
