//! Repository contents listing types shared by every provider backend.

use serde::{Deserialize, Serialize};

/// Kind of a repository contents item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else we do not descend into.
    #[serde(other)]
    Other,
}

/// One item of a `GET /repos/{owner}/{repo}/contents/{path}` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoContent {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Raw file URL; null for directories.
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl RepoContent {
    pub fn is_file(&self) -> bool {
        self.kind == ContentKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ContentKind::Dir
    }
}

/// The contents endpoint answers with an array for directories and a
/// single object when the path names a file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsResponse {
    Listing(Vec<RepoContent>),
    Single(RepoContent),
}

impl ContentsResponse {
    pub(crate) fn into_vec(self) -> Vec<RepoContent> {
        match self {
            ContentsResponse::Listing(items) => items,
            ContentsResponse::Single(item) => vec![item],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_listing_decodes() {
        let body = r#"[
            {"name": "weather.json", "path": "plugins/weather.json", "type": "file",
             "download_url": "https://raw.githubusercontent.com/o/r/main/plugins/weather.json",
             "url": "https://api.github.com/repos/o/r/contents/plugins/weather.json"},
            {"name": "assets", "path": "plugins/assets", "type": "dir", "download_url": null},
            {"name": "vendored", "path": "plugins/vendored", "type": "submodule"}
        ]"#;
        let items = serde_json::from_str::<ContentsResponse>(body).unwrap().into_vec();
        assert_eq!(items.len(), 3);
        assert!(items[0].is_file());
        assert!(items[1].is_dir());
        assert!(items[1].download_url.is_none());
        assert_eq!(items[2].kind, ContentKind::Other);
    }

    #[test]
    fn test_contents_single_object_decodes() {
        let body = r#"{"name": "plugin.json", "path": "plugin.json", "type": "file",
                       "download_url": "https://raw.githubusercontent.com/o/r/main/plugin.json"}"#;
        let items = serde_json::from_str::<ContentsResponse>(body).unwrap().into_vec();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "plugin.json");
    }
}
