//! Plugin registry entry, plugin manifest and the merged plugin record.

use super::CatalogRecord;
use crate::error::EntryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A plugin as checked into the canonical registry (`plugins/<id>.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryPlugin {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
    pub category: String,
    /// URL of the plugin's own repository.
    pub repo: String,
    /// Sub-directory inside `repo` holding `plugin.json`; repository root when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub author: String,
    #[serde(rename = "firstParty")]
    pub first_party: bool,
    pub featured: bool,
    pub description: String,
    pub dependencies: Vec<String>,
    pub compositors: Vec<String>,
    pub distro: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_dms: Option<String>,
}

impl RegistryPlugin {
    /// Sub-path with surrounding slashes removed; empty for the repository root.
    pub fn sub_path(&self) -> &str {
        self.path.as_deref().unwrap_or("").trim_matches('/')
    }
}

/// `plugin.json` from the plugin's own repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub icon: String,
    pub permissions: Vec<String>,
}

/// Registry entry merged with its manifest and last-commit time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub capabilities: Vec<String>,
    pub category: String,
    pub repo: String,
    pub author: String,
    #[serde(rename = "firstParty")]
    pub first_party: bool,
    pub featured: bool,
    pub description: String,
    pub dependencies: Vec<String>,
    pub compositors: Vec<String>,
    pub distro: Vec<String>,
    pub screenshot: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_dms: Option<String>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl Plugin {
    /// Merge a registry entry with its manifest and commit time.
    ///
    /// The manifest's author wins over the registry's when it is non-empty.
    /// Records missing a mandatory field are rejected rather than emitted
    /// half-populated.
    pub fn merge(
        entry: RegistryPlugin,
        manifest: PluginManifest,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, EntryError> {
        let author = if manifest.author.trim().is_empty() {
            entry.author
        } else {
            manifest.author
        };

        let plugin = Plugin {
            id: entry.id,
            name: entry.name,
            capabilities: entry.capabilities,
            category: entry.category,
            repo: entry.repo,
            author,
            first_party: entry.first_party,
            featured: entry.featured,
            description: entry.description,
            dependencies: entry.dependencies,
            compositors: entry.compositors,
            distro: entry.distro,
            screenshot: entry.screenshot.unwrap_or_default(),
            requires_dms: entry.requires_dms.filter(|v| !v.is_empty()),
            version: manifest.version,
            icon: Some(manifest.icon).filter(|icon| !icon.is_empty()),
            permissions: manifest.permissions,
            updated_at,
        };

        match plugin.missing_field() {
            Some(field) => Err(EntryError::MissingField { field }),
            None => Ok(plugin),
        }
    }
}

impl CatalogRecord for Plugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
