//! Data models for registry entries, fetched manifests and the enriched
//! records served to API consumers.

mod content;
mod plugin;
mod theme;

pub use content::*;
pub use plugin::*;
pub use theme::*;

use chrono::{DateTime, Utc};

/// Common view over enriched records, used by the query layer and the
/// mandatory-field check applied before a record enters a snapshot.
pub trait CatalogRecord: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn updated_at(&self) -> DateTime<Utc>;

    /// First mandatory field that is empty, if any.
    fn missing_field(&self) -> Option<&'static str> {
        if self.id().trim().is_empty() {
            Some("id")
        } else if self.name().trim().is_empty() {
            Some("name")
        } else if self.version().trim().is_empty() {
            Some("version")
        } else if self.updated_at() <= DateTime::<Utc>::UNIX_EPOCH {
            Some("updated_at")
        } else {
            None
        }
    }
}
