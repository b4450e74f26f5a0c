//! Filtering and sorting over snapshot records.

use crate::cache::{PluginCache, RecordSource, SnapshotCache};
use crate::models::{CatalogRecord, Plugin};
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::fmt;

/// Compositor tag that matches every compositor filter.
pub const ANY_COMPOSITOR: &str = "any";

/// Plugin filter. Empty fields do not filter; set fields are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    pub category: String,
    pub compositor: String,
    /// Only first-party plugins when set; `false` does not filter.
    pub first_party: bool,
    pub capability: String,
}

impl FilterOptions {
    pub fn is_empty(&self) -> bool {
        self.category.is_empty()
            && self.compositor.is_empty()
            && !self.first_party
            && self.capability.is_empty()
    }

    pub fn matches(&self, plugin: &Plugin) -> bool {
        if !self.category.is_empty() && plugin.category != self.category {
            return false;
        }

        if self.first_party && !plugin.first_party {
            return false;
        }

        if !self.compositor.is_empty()
            && !plugin
                .compositors
                .iter()
                .any(|c| *c == self.compositor || c == ANY_COMPOSITOR)
        {
            return false;
        }

        if !self.capability.is_empty() && !plugin.capabilities.iter().any(|c| *c == self.capability) {
            return false;
        }

        true
    }
}

/// Keep the plugins matching `options`, in their original order.
pub fn filter_plugins(plugins: &[Plugin], options: &FilterOptions) -> Vec<Plugin> {
    plugins
        .iter()
        .filter(|p| options.matches(p))
        .cloned()
        .collect()
}

/// Sort key for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// Most recently updated first.
    #[default]
    UpdatedAt,
    /// Ascending by name.
    Name,
    /// Fresh shuffle on every call.
    Random,
}

impl SortBy {
    /// Parse a `sortBy` query value. An empty value selects the default.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "updated_at" => Some(SortBy::UpdatedAt),
            "name" => Some(SortBy::Name),
            "random" => Some(SortBy::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::UpdatedAt => "updated_at",
            SortBy::Name => "name",
            SortBy::Random => "random",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort records in place. Ties in the deterministic orders fall back to id.
pub fn sort_records<T: CatalogRecord>(records: &mut [T], sort_by: SortBy) {
    match sort_by {
        SortBy::UpdatedAt => records.sort_by(|a, b| {
            b.updated_at()
                .cmp(&a.updated_at())
                .then_with(|| a.id().cmp(b.id()))
        }),
        SortBy::Name => records.sort_by(by_name),
        SortBy::Random => {
            let mut rng = rand::rng();
            records.shuffle(&mut rng);
        }
    }
}

fn by_name<T: CatalogRecord>(a: &T, b: &T) -> Ordering {
    a.name().cmp(b.name()).then_with(|| a.id().cmp(b.id()))
}

impl<S: RecordSource> SnapshotCache<S> {
    /// All records of the current snapshot, sorted.
    pub fn list_sorted(&self, sort_by: SortBy) -> Vec<S::Record> {
        let mut records = self.read().records().to_vec();
        sort_records(&mut records, sort_by);
        records
    }
}

impl PluginCache {
    /// Filtered and sorted plugins of the current snapshot.
    pub fn list_plugins(&self, options: &FilterOptions, sort_by: SortBy) -> Vec<Plugin> {
        let snapshot = self.read();
        let mut plugins = filter_plugins(snapshot.records(), options);
        sort_records(&mut plugins, sort_by);
        plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn plugin(id: &str, name: &str, compositors: &[&str], day: u32) -> Plugin {
        Plugin {
            id: id.into(),
            name: name.into(),
            capabilities: vec!["dankbar-widget".into()],
            category: "monitoring".into(),
            repo: format!("https://github.com/someone/{}", id),
            author: "someone".into(),
            first_party: false,
            featured: false,
            description: String::new(),
            dependencies: Vec::new(),
            compositors: compositors.iter().map(|c| c.to_string()).collect(),
            distro: Vec::new(),
            screenshot: String::new(),
            requires_dms: None,
            version: "1.0.0".into(),
            icon: None,
            permissions: Vec::new(),
            updated_at: day_at(day),
        }
    }

    fn day_at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap()
    }

    fn catalog() -> Vec<Plugin> {
        vec![
            plugin("niri-only", "Niri Only", &["niri"], 1),
            plugin("hypr", "Hypr", &["hyprland"], 3),
            plugin("anywhere", "Anywhere", &["any"], 2),
            plugin("both", "Both", &["niri", "hyprland"], 4),
        ]
    }

    fn ids(plugins: &[Plugin]) -> Vec<&str> {
        plugins.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_compositor_filter_includes_any() {
        let options = FilterOptions {
            compositor: "hyprland".into(),
            ..Default::default()
        };
        let result = filter_plugins(&catalog(), &options);
        assert_eq!(ids(&result), vec!["hypr", "anywhere", "both"]);
    }

    #[test]
    fn test_empty_filter_returns_all() {
        let options = FilterOptions::default();
        assert!(options.is_empty());
        assert_eq!(filter_plugins(&catalog(), &options).len(), 4);
    }

    #[test]
    fn test_filters_combine() {
        let mut plugins = catalog();
        plugins[3].first_party = true;
        plugins[3].capabilities.push("control-center".into());
        plugins[0].category = "appearance".into();

        let options = FilterOptions {
            category: "monitoring".into(),
            first_party: true,
            capability: "control-center".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_plugins(&plugins, &options)), vec!["both"]);

        let options = FilterOptions {
            category: "appearance".into(),
            ..Default::default()
        };
        assert_eq!(ids(&filter_plugins(&plugins, &options)), vec!["niri-only"]);
    }

    #[test]
    fn test_sort_by_updated_at_descending() {
        let mut plugins = catalog();
        sort_records(&mut plugins, SortBy::UpdatedAt);
        assert_eq!(ids(&plugins), vec!["both", "hypr", "anywhere", "niri-only"]);
        assert!(plugins
            .windows(2)
            .all(|w| w[0].updated_at >= w[1].updated_at));
    }

    #[test]
    fn test_sort_by_name_ascending_with_id_tiebreak() {
        let mut plugins = catalog();
        plugins.push(plugin("hypr-2", "Hypr", &["hyprland"], 9));
        sort_records(&mut plugins, SortBy::Name);
        assert_eq!(
            ids(&plugins),
            vec!["anywhere", "both", "hypr", "hypr-2", "niri-only"]
        );
    }

    #[test]
    fn test_random_sort_varies() {
        let base: Vec<Plugin> = (1..=20)
            .map(|i| plugin(&format!("p{:02}", i), &format!("P{:02}", i), &["niri"], i))
            .collect();
        let mut first = base.clone();
        sort_records(&mut first, SortBy::Random);
        let first_ids: Vec<String> = first.iter().map(|p| p.id.clone()).collect();

        let differs = (0..20).any(|_| {
            let mut again = base.clone();
            sort_records(&mut again, SortBy::Random);
            again.iter().map(|p| p.id.as_str()).ne(first_ids.iter().map(String::as_str))
        });
        assert!(differs);
        assert_eq!(first.len(), base.len());
    }

    #[test]
    fn test_sort_by_parse() {
        assert_eq!(SortBy::parse(""), Some(SortBy::UpdatedAt));
        assert_eq!(SortBy::parse("updated_at"), Some(SortBy::UpdatedAt));
        assert_eq!(SortBy::parse("name"), Some(SortBy::Name));
        assert_eq!(SortBy::parse("random"), Some(SortBy::Random));
        assert_eq!(SortBy::parse("stars"), None);
    }
}
