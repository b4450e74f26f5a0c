//! Theme definitions from the canonical registry's `themes/` directory.

use super::CatalogRecord;
use crate::error::EntryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Color map keyed by palette slot name.
pub type ColorMap = Map<String, Value>;

/// A named palette used for both variant options and flavors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeVariantOption {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark: Option<ColorMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<ColorMap>,
}

/// Default flavor/accent pair for one color mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeModeDefaults {
    pub flavor: String,
    pub accent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeVariants {
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ThemeVariantOption>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub defaults: HashMap<String, ThemeModeDefaults>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flavors: Vec<ThemeVariantOption>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accents: Vec<ColorMap>,
}

/// `theme.json` as checked into the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeManifest {
    pub id: String,
    pub name: String,
    pub author: String,
    pub description: String,
    pub version: String,
    pub dark: ColorMap,
    pub light: ColorMap,
    pub variants: Option<ThemeVariants>,
}

/// Theme record served to API consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub author: String,
    pub description: String,
    pub version: String,
    pub dark: ColorMap,
    pub light: ColorMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<ThemeVariants>,
    #[serde(rename = "previewUrl")]
    pub preview_url: String,
    pub updated_at: DateTime<Utc>,
}

impl Theme {
    pub fn from_manifest(
        manifest: ThemeManifest,
        preview_url: String,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, EntryError> {
        let theme = Theme {
            id: manifest.id,
            name: manifest.name,
            author: manifest.author,
            description: manifest.description,
            version: manifest.version,
            dark: manifest.dark,
            light: manifest.light,
            variants: manifest.variants,
            preview_url,
            updated_at,
        };

        match theme.missing_field() {
            Some(field) => Err(EntryError::MissingField { field }),
            None => Ok(theme),
        }
    }
}

impl CatalogRecord for Theme {
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
