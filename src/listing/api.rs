//! JSON folder-listing API (`/api?path=/<folder>`).
//!
//! The API answers with `{"folder": {"value": [...]}}`. Items carrying a
//! `file` key are files with a direct download URL; items carrying a `folder`
//! key are subfolders, listed by name only.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{FileEntry, Listing, ListingError, ListingSource, SourceKind};
use crate::remote_path::RemotePath;

/// `Accept` header for API listings.
const ACCEPT_JSON: &str = "application/json, */*";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    folder: Option<ApiFolder>,
}

#[derive(Debug, Deserialize)]
struct ApiFolder {
    #[serde(default)]
    value: Option<Vec<ApiItem>>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    file: Option<serde_json::Value>,
    #[serde(default)]
    folder: Option<serde_json::Value>,
    #[serde(rename = "@microsoft.graph.downloadUrl", default)]
    download_url: Option<String>,
}

/// Listing source for the JSON folder API of a mirror host.
#[derive(Debug, Clone)]
pub struct ApiSource {
    origin: String,
}

impl ApiSource {
    /// Creates a source for the API served at the origin of `start_url`.
    #[must_use]
    pub fn new(start_url: &Url) -> Self {
        Self {
            origin: start_url.origin().ascii_serialization(),
        }
    }
}

#[async_trait]
impl ListingSource for ApiSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn listing_url(&self, path: &RemotePath) -> String {
        let encoded: Vec<_> = path
            .as_str()
            .split('/')
            .map(urlencoding::encode)
            .collect();
        format!("{}/api?path=/{}", self.origin, encoded.join("/"))
    }

    fn accept(&self) -> &'static str {
        ACCEPT_JSON
    }

    fn not_found_is_fatal(&self) -> bool {
        true
    }

    fn normalize(
        &self,
        body: &str,
        requested: &RemotePath,
        _page_url: &str,
    ) -> Result<Listing, ListingError> {
        let response: ApiResponse =
            serde_json::from_str(body).map_err(|source| ListingError::InvalidJson {
                path: requested.to_string(),
                source,
            })?;

        let folder = response.folder.ok_or_else(|| ListingError::NotAFolder {
            path: requested.to_string(),
        })?;

        let mut listing = Listing::empty(requested.clone());
        let Some(items) = folder.value else {
            debug!(path = %requested, "folder has no value list; nothing to mirror");
            return Ok(listing);
        };

        for item in items {
            if item.file.is_none() && item.folder.is_none() {
                debug!(name = ?item.name, "entry is neither file nor folder; skipping");
                continue;
            }
            let Some(name) = item.name else {
                warn!(path = %requested, "entry has no name; skipping");
                continue;
            };
            if item.file.is_some() {
                match item.download_url {
                    Some(url) => listing.files.push(FileEntry::new(name, url)),
                    None => warn!(
                        path = %requested,
                        name = %name,
                        "file entry has no download URL; skipping"
                    ),
                }
            } else {
                listing.subfolders.push(name);
            }
        }

        Ok(listing)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn source() -> ApiSource {
        ApiSource::new(&Url::parse("https://vc.mirror.example/Betm").unwrap())
    }

    fn normalize(body: &str) -> Result<Listing, ListingError> {
        source().normalize(body, &RemotePath::parse("Betm").unwrap(), "")
    }

    #[test]
    fn test_api_listing_url_percent_encodes_segments() {
        let path = RemotePath::parse("Betm/15007 宿X虎").unwrap();
        assert_eq!(
            source().listing_url(&path),
            "https://vc.mirror.example/api?path=/Betm/15007%20%E5%AE%BFX%E8%99%8E"
        );
        assert_eq!(
            source().listing_url(&RemotePath::root()),
            "https://vc.mirror.example/api?path=/"
        );
    }

    #[test]
    fn test_api_listing_url_keeps_port() {
        let source = ApiSource::new(&Url::parse("http://127.0.0.1:8080/a").unwrap());
        assert_eq!(
            source.listing_url(&RemotePath::parse("a").unwrap()),
            "http://127.0.0.1:8080/api?path=/a"
        );
    }

    #[test]
    fn test_api_normalize_partitions_files_and_folders() {
        let body = r#"{"folder": {"value": [
            {"name": "song1.mp3", "file": {"mimeType": "audio/mpeg"},
             "@microsoft.graph.downloadUrl": "https://cdn.example/1"},
            {"name": "Extras", "folder": {"childCount": 0}},
            {"name": "song2.flac", "file": {},
             "@microsoft.graph.downloadUrl": "https://cdn.example/2"},
            {"name": "weird"}
        ]}}"#;
        let listing = normalize(body).unwrap();
        assert_eq!(listing.canonical_path.as_str(), "Betm");
        assert_eq!(
            listing.files,
            vec![
                FileEntry::new("song1.mp3", "https://cdn.example/1"),
                FileEntry::new("song2.flac", "https://cdn.example/2"),
            ]
        );
        assert_eq!(listing.subfolders, vec!["Extras".to_string()]);
    }

    #[test]
    fn test_api_normalize_missing_value_is_empty_listing() {
        let listing = normalize(r#"{"folder": {"childCount": 0}}"#).unwrap();
        assert!(listing.files.is_empty());
        assert!(listing.subfolders.is_empty());
    }

    #[test]
    fn test_api_normalize_without_folder_is_not_a_folder() {
        let err = normalize(r#"{"file": {"name": "x.mp3"}}"#).unwrap_err();
        assert!(matches!(err, ListingError::NotAFolder { .. }));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_api_normalize_invalid_json_is_rejected() {
        let err = normalize("<html>oops</html>").unwrap_err();
        assert!(matches!(err, ListingError::InvalidJson { .. }));
    }

    #[test]
    fn test_api_normalize_skips_file_without_download_url() {
        let listing =
            normalize(r#"{"folder": {"value": [{"name": "a.mp3", "file": {}}]}}"#).unwrap();
        assert!(listing.files.is_empty());
    }

    #[test]
    fn test_api_normalize_skips_nameless_entries() {
        let body = r#"{"folder": {"value": [
            {"file": {}, "@microsoft.graph.downloadUrl": "https://cdn.example/0"},
            {"folder": {}},
            {"size": 3},
            {"name": "kept.mp3", "file": {},
             "@microsoft.graph.downloadUrl": "https://cdn.example/1"}
        ]}}"#;
        let listing = normalize(body).unwrap();
        assert_eq!(
            listing.files,
            vec![FileEntry::new("kept.mp3", "https://cdn.example/1")]
        );
        assert!(listing.subfolders.is_empty());
    }

    #[test]
    fn test_api_source_declares_404_fatal() {
        assert!(source().not_found_is_fatal());
    }
}
